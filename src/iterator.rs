//! Paginated query engine.
//!
//! Several clock queries (possible parents, rate lists) return more entries
//! than fit in one message. The engine repeats the command, each time telling
//! firmware how many entries to skip, until a page reports nothing remaining.
//!
//! Per-command behavior plugs in through [`IterOps`]:
//!
//! ```text
//!  prepare_message(desc_index) ─► execute ─► update_state(page)
//!         ▲                                       │
//!         │                                       ▼
//!   desc_index += returned ◄── process_response(loop_idx) × returned
//! ```

use bytes::BytesMut;

use crate::error::{ClockError, Result};
use crate::transport::{Transport, XferGuard};

/// Iteration cursor shared with the [`IterOps`] callbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterState {
    /// Entries already consumed (the skip count of the next request).
    pub desc_index: u32,
    /// Entries carried by the current page.
    pub num_returned: u32,
    /// Entries still to come after the current page.
    pub num_remaining: u32,
    /// Upper bound on the total; 0 until known.
    pub max_resources: u32,
    /// Index of the entry being processed within the current page.
    pub loop_idx: u32,
    /// Byte length of the current page.
    pub rx_len: usize,
}

/// Command-specific callbacks driven by [`PagedQuery`].
pub trait IterOps: Send {
    /// Encode the request for the page starting at `desc_index`.
    fn prepare_message(&self, tx: &mut BytesMut, desc_index: u32);

    /// Read the page header and fill `num_returned`/`num_remaining`.
    ///
    /// On the first page this is also where `max_resources` and the
    /// destination buffer get sized when the total was not known up front.
    fn update_state(&mut self, st: &mut IterState, response: &[u8]) -> Result<()>;

    /// Store entry `st.loop_idx` of the current page.
    fn process_response(&mut self, st: &IterState, response: &[u8]) -> Result<()>;
}

/// One paginated query in progress.
pub struct PagedQuery<'t, O> {
    transport: &'t dyn Transport,
    ops: O,
    msg_id: u8,
    tx_size: usize,
    state: IterState,
}

impl<'t, O: IterOps> PagedQuery<'t, O> {
    /// Prepare a query for `msg_id`.
    ///
    /// `max_resources` is the known upper bound on the total entry count, or 0
    /// when the first page will provide it.
    pub fn new(
        transport: &'t dyn Transport,
        ops: O,
        max_resources: u32,
        msg_id: u8,
        tx_size: usize,
    ) -> Self {
        Self {
            transport,
            ops,
            msg_id,
            tx_size,
            state: IterState {
                max_resources,
                ..IterState::default()
            },
        }
    }

    /// Run the query to completion and hand back the callbacks with what
    /// they accumulated.
    ///
    /// Any callback error or transport error aborts the loop.
    pub async fn run(mut self) -> Result<O> {
        loop {
            let mut xfer = XferGuard::init(self.transport, self.msg_id, self.tx_size, 0)?;
            self.ops.prepare_message(&mut xfer.tx, self.state.desc_index);

            xfer.execute().await?;

            let rx = xfer.rx.clone();
            self.state.rx_len = rx.len();
            self.ops.update_state(&mut self.state, &rx)?;

            let room = self
                .state
                .max_resources
                .saturating_sub(self.state.desc_index);
            if self.state.num_returned > room {
                tracing::error!(
                    "Msg {:#x}: page returned {} entries, only {} expected",
                    self.msg_id,
                    self.state.num_returned,
                    room
                );
                return Err(ClockError::Protocol(format!(
                    "page returned {} entries but only {} remain",
                    self.state.num_returned, room
                )));
            }

            for loop_idx in 0..self.state.num_returned {
                self.state.loop_idx = loop_idx;
                self.ops.process_response(&self.state, &rx)?;
            }

            self.state.desc_index += self.state.num_returned;

            if self.state.num_returned == 0 || self.state.num_remaining == 0 {
                break;
            }
        }

        Ok(self.ops)
    }
}
