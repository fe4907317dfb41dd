//! Type aliases shared across modules.

use std::future::Future;
use std::pin::Pin;

/// Pinned, boxed, `Send` future.
///
/// Lets object-safe traits such as `Transport` expose async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
