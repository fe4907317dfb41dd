//! Message envelope and RPC decoding.
//!
//! Wire form of an envelope: `[1 byte kind][payload]`, the payload running to
//! the end of the frame.

use crate::core::block::Block;
use crate::core::transaction::Transaction;
use crate::network::transport::NetAddr;
use crate::types::bytes::Bytes;
use crate::types::encoding::{Decode, DecodeError, Encode, EncodeSink};
use minichain_derive::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("could not decode message: {0}")]
    Decode(DecodeError),
    #[error("unknown message kind {0:#04x}")]
    UnknownMessageKind(u8),
}

impl From<DecodeError> for RpcError {
    fn from(err: DecodeError) -> Self {
        RpcError::Decode(err)
    }
}

/// Envelope discriminator.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Transaction = 0x00,
    Block = 0x01,
}

impl TryFrom<u8> for MessageType {
    type Error = RpcError;

    fn try_from(kind: u8) -> Result<Self, RpcError> {
        match kind {
            0x00 => Ok(MessageType::Transaction),
            0x01 => Ok(MessageType::Block),
            other => Err(RpcError::UnknownMessageKind(other)),
        }
    }
}

/// Tagged envelope around an encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageType,
    pub data: Bytes,
}

impl Message {
    pub fn new(header: MessageType, data: impl Into<Bytes>) -> Self {
        Self {
            header,
            data: data.into(),
        }
    }

    pub fn transaction(tx: &Transaction) -> Self {
        Self::new(MessageType::Transaction, tx.to_bytes())
    }

    pub fn block(block: &Block) -> Self {
        Self::new(MessageType::Block, block.to_bytes())
    }

    /// Splits a raw frame into kind and payload.
    pub fn parse(frame: &[u8]) -> Result<Self, RpcError> {
        let (&kind, payload) = frame.split_first().ok_or(DecodeError::UnexpectedEof)?;
        Ok(Self::new(MessageType::try_from(kind)?, payload))
    }
}

impl Encode for Message {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&[self.header as u8]);
        out.write(&self.data);
    }
}

/// Raw frame as delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rpc {
    pub from: NetAddr,
    pub payload: Bytes,
}

impl Rpc {
    pub fn new(from: impl Into<NetAddr>, payload: impl Into<Bytes>) -> Self {
        Self {
            from: from.into(),
            payload: payload.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedPayload {
    Transaction(Transaction),
    Block(Block),
}

/// An RPC whose payload has been decoded into a typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub from: NetAddr,
    pub data: DecodedPayload,
}

/// Pluggable decoder turning raw frames into typed messages.
pub type DecodeRpcFn = fn(Rpc) -> Result<DecodedMessage, RpcError>;

pub fn default_rpc_decode(rpc: Rpc) -> Result<DecodedMessage, RpcError> {
    let message = Message::parse(&rpc.payload)?;

    let data = match message.header {
        MessageType::Transaction => DecodedPayload::Transaction(Transaction::from_bytes(&message.data)?),
        MessageType::Block => DecodedPayload::Block(Block::from_bytes(&message.data)?),
    };

    Ok(DecodedMessage {
        from: rpc.from,
        data,
    })
}
