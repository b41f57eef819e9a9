//! Rate notifications.
//!
//! Firmware can report two kinds of clock events: a rate actually changed,
//! and some agent requested a rate change. Subscriptions are switched on and
//! off per clock with one command per event kind; delivered payloads are
//! turned into [`RateNotifReport`]s.
//!
//! Queueing and fan-out of events belong to the notification core that
//! drives [`ProtocolEvents`]; this module only speaks the clock-specific parts.

use std::time::Instant;

use crate::error::{ClockError, Result};
use crate::protocol::{cmd, RateNotifyPayload, RateNotifyRequest};
use crate::transport::{BoxFuture, Transport, XferGuard};

/// Clock event kinds, by ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClockEvent {
    RateChanged = 0,
    RateChangeRequested = 1,
}

impl TryFrom<u8> for ClockEvent {
    type Error = ClockError;

    fn try_from(evt_id: u8) -> Result<Self> {
        match evt_id {
            0 => Ok(ClockEvent::RateChanged),
            1 => Ok(ClockEvent::RateChangeRequested),
            _ => Err(ClockError::InvalidArgument(format!(
                "unknown clock event {}",
                evt_id
            ))),
        }
    }
}

/// Event ordinal to enable/disable command.
static EVENT_TO_COMMAND: [u8; 2] = [cmd::RATE_NOTIFY, cmd::RATE_CHANGE_REQUESTED_NOTIFY];

/// Static description of an event for the notification core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventDesc {
    pub event: ClockEvent,
    pub max_payload_size: usize,
}

/// Events this protocol can emit.
pub static CLOCK_EVENTS: [EventDesc; 2] = [
    EventDesc {
        event: ClockEvent::RateChanged,
        max_payload_size: RateNotifyPayload::SIZE,
    },
    EventDesc {
        event: ClockEvent::RateChangeRequested,
        max_payload_size: RateNotifyPayload::SIZE,
    },
];

/// Decoded rate notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateNotifReport {
    /// When the notification core received the event.
    pub timestamp: Instant,
    pub agent_id: u32,
    /// Originating clock; also the event source id.
    pub clock_id: u32,
    pub rate: u64,
}

/// Hooks the notification core calls into.
pub trait ProtocolEvents {
    /// Number of event sources (one per clock).
    fn num_sources(&self) -> usize;

    /// Turn delivery of `evt_id` for source `src_id` on or off.
    fn set_notify_enabled<'a>(
        &'a self,
        evt_id: u8,
        src_id: u32,
        enable: bool,
    ) -> BoxFuture<'a, Result<()>>;

    /// Decode a delivered payload; `None` if it is not a clock rate event.
    fn fill_custom_report(
        &self,
        evt_id: u8,
        timestamp: Instant,
        payload: &[u8],
    ) -> Option<RateNotifReport>;
}

/// Command id that toggles notifications for `evt_id`.
pub fn command_for(evt_id: u8) -> Result<u8> {
    EVENT_TO_COMMAND
        .get(usize::from(evt_id))
        .copied()
        .ok_or_else(|| ClockError::InvalidArgument(format!("unknown clock event {}", evt_id)))
}

/// Send a notify enable/disable command.
pub(crate) async fn rate_notify(
    transport: &dyn Transport,
    clk_id: u32,
    msg_id: u8,
    enable: bool,
) -> Result<()> {
    let mut xfer = XferGuard::init(transport, msg_id, RateNotifyRequest::SIZE, 0)?;
    RateNotifyRequest { id: clk_id, enable }.encode_into(&mut xfer.tx);

    xfer.execute().await?;
    Ok(())
}

/// Build a report from a rate event payload.
///
/// The payload must be exactly one [`RateNotifyPayload`] and the event one
/// of the two clock rate events; anything else is left to other handlers.
pub fn fill_report(evt_id: u8, timestamp: Instant, payload: &[u8]) -> Option<RateNotifReport> {
    if payload.len() != RateNotifyPayload::SIZE || ClockEvent::try_from(evt_id).is_err() {
        return None;
    }

    let p = RateNotifyPayload::decode(payload)?;
    Some(RateNotifReport {
        timestamp,
        agent_id: p.agent_id,
        clock_id: p.clock_id,
        rate: p.rate,
    })
}
