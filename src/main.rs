//! In-process demo network.
//!
//! Wires a validator `LOCAL` and three plain nodes `REMOTE_A -> REMOTE_B -> REMOTE_C`
//! over local transports, with `REMOTE_A` also connected back to `LOCAL`.
//! `REMOTE_A` keeps sending freshly signed transactions to `LOCAL`.
//!
//! # Usage
//! ```text
//! minichain [--block-time <secs>] [--tx-interval <millis>] [--log-level <level>]
//! ```
//!
//! Log verbosity comes from `--log-level`, falling back to `MINICHAIN_LOG`
//! (`debug`, `info`, `warn`, `error`).

use minichain::core::blockchain::Blockchain;
use minichain::core::block::Block;
use minichain::core::transaction::Transaction;
use minichain::crypto::key_pair::{KeyError, PrivateKey};
use minichain::network::local_transport::LocalTransport;
use minichain::network::rpc::Message;
use minichain::network::server::{DEFAULT_BLOCK_TIME, Server, ServerError, ServerOps};
use minichain::network::transport::{NetAddr, Transport, TransportError};
use minichain::types::encoding::Encode;
use minichain::utils::log::{self, Level};
use minichain::{error, info};
use rand_core::{OsRng, RngCore};
use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;

const DEFAULT_TX_INTERVAL: Duration = Duration::from_secs(2);

struct Args {
    block_time: Duration,
    tx_interval: Duration,
    log_level: Option<Level>,
}

#[tokio::main]
async fn main() {
    let args = parse_args();
    if let Some(level) = args.log_level {
        log::set_min_level(level);
    }

    let tr_local = LocalTransport::new("LOCAL");
    let tr_remote_a = LocalTransport::new("REMOTE_A");
    let tr_remote_b = LocalTransport::new("REMOTE_B");
    let tr_remote_c = LocalTransport::new("REMOTE_C");

    let links: [(&Arc<LocalTransport>, &Arc<LocalTransport>); 4] = [
        (&tr_local, &tr_remote_a),
        (&tr_remote_a, &tr_remote_b),
        (&tr_remote_b, &tr_remote_c),
        (&tr_remote_a, &tr_local),
    ];
    for (from, to) in links {
        if let Err(e) = from.connect(to.clone()) {
            error!("could not connect {} to {}: {}", from.addr(), to.addr(), e);
            process::exit(1);
        }
    }

    let mut nodes = Vec::new();
    nodes.push(spawn_node(
        "LOCAL",
        tr_local.clone(),
        Some(PrivateKey::new()),
        args.block_time,
    ));
    for transport in [&tr_remote_a, &tr_remote_b, &tr_remote_c] {
        nodes.push(spawn_node(
            &transport.addr(),
            transport.clone(),
            None,
            args.block_time,
        ));
    }

    let sender = tr_remote_a.clone();
    let to = tr_local.addr();
    let tx_interval = args.tx_interval;
    tokio::spawn(async move {
        loop {
            if let Err(e) = send_transaction(&*sender, to.clone()).await {
                error!("could not send transaction: {}", e);
            }
            sleep(tx_interval).await;
        }
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Failed to set up Ctrl+C handler: {}", e);
        return;
    }
    info!("Ctrl+C received, shutting down...");

    for (stop, handle) in nodes {
        let _ = stop.send(());
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("server stopped with error: {}", e),
            Err(e) => error!("server task failed: {}", e),
        }
    }
}

fn spawn_node(
    id: &str,
    transport: Arc<LocalTransport>,
    key: Option<PrivateKey>,
    block_time: Duration,
) -> (oneshot::Sender<()>, JoinHandle<Result<(), ServerError>>) {
    let chain = match Blockchain::new(Block::genesis()) {
        Ok(chain) => chain,
        Err(e) => {
            error!("could not create chain for {}: {}", id, e);
            process::exit(1);
        }
    };

    let mut ops = ServerOps::new(id)
        .with_transport(transport)
        .with_block_time(block_time);
    if let Some(key) = key {
        ops = ops.with_private_key(key);
    }

    let (stop, shutdown) = oneshot::channel();
    let handle = tokio::spawn(Server::new(ops, chain).start(shutdown));
    (stop, handle)
}

#[derive(Debug, minichain_derive::Error)]
enum SendError {
    #[error("signing failed: {0}")]
    Key(KeyError),
    #[error(transparent)]
    Transport(TransportError),
}

/// Signs a random payload with a throwaway key and sends it to `to`.
async fn send_transaction(transport: &dyn Transport, to: NetAddr) -> Result<(), SendError> {
    let data = OsRng.next_u64().to_string();
    let mut tx = Transaction::new(data);
    tx.sign(&PrivateKey::new()).map_err(SendError::Key)?;

    let message = Message::transaction(&tx);
    transport
        .send_message(to, message.to_bytes())
        .await
        .map_err(SendError::Transport)
}

fn parse_args() -> Args {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("minichain");

    let mut parsed = Args {
        block_time: DEFAULT_BLOCK_TIME,
        tx_interval: DEFAULT_TX_INTERVAL,
        log_level: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage(program);
                process::exit(0);
            }
            "--block-time" => {
                let secs = flag_value(&args, i, "--block-time");
                parsed.block_time = Duration::from_secs(secs);
                i += 2;
            }
            "--tx-interval" => {
                let millis = flag_value(&args, i, "--tx-interval");
                parsed.tx_interval = Duration::from_millis(millis);
                i += 2;
            }
            "--log-level" => {
                let Some(level) = args.get(i + 1).and_then(|raw| Level::parse(raw)) else {
                    eprintln!("--log-level requires one of: debug, info, warn, error");
                    process::exit(1);
                };
                parsed.log_level = Some(level);
                i += 2;
            }
            other => {
                eprintln!("Unexpected argument: {}\n", other);
                print_usage(program);
                process::exit(1);
            }
        }
    }
    parsed
}

fn flag_value(args: &[String], i: usize, flag: &str) -> u64 {
    let Some(raw) = args.get(i + 1) else {
        eprintln!("{} requires an argument", flag);
        process::exit(1);
    };
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            eprintln!("Invalid value for {}: {}", flag, raw);
            process::exit(1);
        }
    }
}

const USAGE: &str = "\
Minichain demo network

USAGE:
    {program} [OPTIONS]

OPTIONS:
    --block-time <secs>      Block production interval of the validator (default 5)
    --tx-interval <millis>   Delay between demo transactions (default 2000)
    --log-level <level>      Minimum log level: debug, info, warn or error
    -h, --help               Print this help message

ENVIRONMENT:
    MINICHAIN_LOG    Minimum log level when --log-level is absent (default info)
";

fn print_usage(program: &str) {
    eprint!("{}", USAGE.replace("{program}", program));
}
