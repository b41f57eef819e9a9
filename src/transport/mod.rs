//! Transport module - the message channel shared with the firmware agent.
//!
//! The transport itself (shared memory, mailbox doorbells, timeouts, polling)
//! lives outside this crate. This module defines the boundary:
//! - [`Transport`] - allocate, execute and release transfers
//! - [`Xfer`] - one request/response buffer pair
//! - [`XferGuard`] - releases the transfer on every exit path

mod xfer;

#[cfg(test)]
pub(crate) mod scripted;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

pub use xfer::{Xfer, XferGuard};

/// Boxed future returned by transport and strategy methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors produced by the transport layer.
///
/// These are forwarded to callers unchanged inside
/// [`ClockError::Transport`](crate::ClockError::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response within the transport's deadline.
    #[error("timed out waiting for firmware")]
    Timeout,

    /// Firmware answered with a non-success status code.
    #[error("firmware returned status {0}")]
    Status(i32),

    /// Underlying channel I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No free transfer slot or buffer.
    #[error("no transfer available: {0}")]
    Busy(String),
}

/// Consumed transport interface.
///
/// Implementations must be shareable across tasks; the clock client holds an
/// `Arc<dyn Transport>` and may issue calls concurrently.
pub trait Transport: Send + Sync {
    /// Negotiated protocol version (major in bits 16..31, minor in bits 0..15).
    fn negotiated_version(&self) -> u32;

    /// Allocate a transfer for `msg_id` with room for the given payload sizes.
    ///
    /// A `rx_size` of 0 asks for the transport's maximum message size.
    fn init_request(
        &self,
        msg_id: u8,
        tx_size: usize,
        rx_size: usize,
    ) -> std::result::Result<Xfer, TransportError>;

    /// Send the request and wait for its response, filling `xfer.rx`.
    fn execute<'a>(
        &'a self,
        xfer: &'a mut Xfer,
    ) -> BoxFuture<'a, std::result::Result<(), TransportError>>;

    /// Send the request and wait for the delayed response that confirms it.
    fn execute_with_confirmation<'a>(
        &'a self,
        xfer: &'a mut Xfer,
    ) -> BoxFuture<'a, std::result::Result<(), TransportError>>;

    /// Return the transfer's buffers to the transport.
    fn release(&self, xfer: Xfer);
}
