//! Transfer buffers and the release-on-drop guard.

use std::ops::{Deref, DerefMut};

use bytes::{Bytes, BytesMut};

use super::{Transport, TransportError};

/// One request/response exchange with the firmware.
#[derive(Debug)]
pub struct Xfer {
    /// Command identifier.
    pub msg_id: u8,
    /// Request payload; encoders append to it.
    pub tx: BytesMut,
    /// Response payload as received (its length is the received length).
    pub rx: Bytes,
    /// Maximum response size the caller expects (0 = transport maximum).
    pub rx_max: usize,
    /// Poll for completion instead of sleeping (atomic callers).
    pub poll_completion: bool,
}

impl Xfer {
    /// Create a transfer with an empty request buffer of `tx_size` capacity.
    pub fn new(msg_id: u8, tx_size: usize, rx_max: usize) -> Self {
        Self {
            msg_id,
            tx: BytesMut::with_capacity(tx_size),
            rx: Bytes::new(),
            rx_max,
            poll_completion: false,
        }
    }

    /// Received response length.
    #[inline]
    pub fn rx_len(&self) -> usize {
        self.rx.len()
    }
}

/// Guard that hands the transfer back to the transport on drop.
///
/// Every command path allocates through [`XferGuard::init`], so buffers are
/// released on success, on decode failure and on transport errors alike.
pub struct XferGuard<'t> {
    transport: &'t dyn Transport,
    xfer: Option<Xfer>,
}

impl<'t> XferGuard<'t> {
    /// Allocate a transfer from `transport`.
    pub fn init(
        transport: &'t dyn Transport,
        msg_id: u8,
        tx_size: usize,
        rx_size: usize,
    ) -> Result<Self, TransportError> {
        let xfer = transport.init_request(msg_id, tx_size, rx_size)?;
        Ok(Self {
            transport,
            xfer: Some(xfer),
        })
    }

    /// Execute and wait for the response.
    pub async fn execute(&mut self) -> Result<(), TransportError> {
        let transport = self.transport;
        transport.execute(self).await
    }

    /// Execute and wait for the delayed confirmation.
    pub async fn execute_with_confirmation(&mut self) -> Result<(), TransportError> {
        let transport = self.transport;
        transport.execute_with_confirmation(self).await
    }
}

impl Deref for XferGuard<'_> {
    type Target = Xfer;

    fn deref(&self) -> &Xfer {
        // Only taken in Drop.
        match &self.xfer {
            Some(xfer) => xfer,
            None => unreachable!("transfer already released"),
        }
    }
}

impl DerefMut for XferGuard<'_> {
    fn deref_mut(&mut self) -> &mut Xfer {
        match &mut self.xfer {
            Some(xfer) => xfer,
            None => unreachable!("transfer already released"),
        }
    }
}

impl Drop for XferGuard<'_> {
    fn drop(&mut self) {
        if let Some(xfer) = self.xfer.take() {
            self.transport.release(xfer);
        }
    }
}
