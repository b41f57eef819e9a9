//! Scripted transport for unit tests: replays queued replies in order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use bytes::Bytes;

use super::{BoxFuture, Transport, TransportError, Xfer};

/// A request as observed by the transport.
#[derive(Debug, Clone)]
pub(crate) struct Sent {
    pub msg_id: u8,
    pub tx: Bytes,
    pub poll_completion: bool,
    pub confirmed: bool,
}

pub(crate) struct ScriptedTransport {
    version: u32,
    replies: Mutex<VecDeque<Result<Bytes, TransportError>>>,
    sent: Mutex<Vec<Sent>>,
    inits: AtomicUsize,
    released: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            replies: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            inits: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    pub fn push_reply(&self, rx: impl Into<Bytes>) {
        self.replies.lock().unwrap().push_back(Ok(rx.into()));
    }

    pub fn push_error(&self, err: TransportError) {
        self.replies.lock().unwrap().push_back(Err(err));
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    fn reply(&self, xfer: &mut Xfer, confirmed: bool) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Sent {
            msg_id: xfer.msg_id,
            tx: xfer.tx.clone().freeze(),
            poll_completion: xfer.poll_completion,
            confirmed,
        });
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Bytes::new()));
        xfer.rx = next?;
        Ok(())
    }
}

impl Transport for ScriptedTransport {
    fn negotiated_version(&self) -> u32 {
        self.version
    }

    fn init_request(&self, msg_id: u8, tx_size: usize, rx_size: usize) -> Result<Xfer, TransportError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(Xfer::new(msg_id, tx_size, rx_size))
    }

    fn execute<'a>(&'a self, xfer: &'a mut Xfer) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move { self.reply(xfer, false) })
    }

    fn execute_with_confirmation<'a>(
        &'a self,
        xfer: &'a mut Xfer,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move { self.reply(xfer, true) })
    }

    fn release(&self, _xfer: Xfer) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
