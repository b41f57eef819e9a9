//! Fixed-layout request and response payloads.
//!
//! Requests expose `SIZE` and `encode_into`; responses expose `decode`, which
//! returns `None` when the buffer is shorter than the fixed layout. Decoding
//! never fails otherwise; interpreting the values is up to the caller.

use bytes::{Buf, BufMut};

use super::wire_format::{
    decode_name, join_rate, split_rate, EXTENDED_NAME_SIZE, RATE_ENTRY_SIZE, SHORT_NAME_SIZE,
};

/// Request carrying only a clock id (attributes, rate get, parent get, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockIdRequest {
    pub id: u32,
}

impl ClockIdRequest {
    pub const SIZE: usize = 4;

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.id);
    }
}

/// PROTOCOL_ATTRIBUTES response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolAttributes {
    pub num_clocks: u16,
    pub max_async_req: u8,
}

impl ProtocolAttributes {
    pub const SIZE: usize = 4;

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }
        let mut b = buf;
        let num_clocks = b.get_u16_le();
        let max_async_req = b.get_u8();
        Some(Self {
            num_clocks,
            max_async_req,
        })
    }
}

/// CLOCK_ATTRIBUTES response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockAttributes {
    pub attributes: u32,
    pub name: String,
    /// Raw latency word; `None` when the firmware sent the short (pre-latency) layout.
    pub enable_latency: Option<u32>,
}

impl ClockAttributes {
    /// Layout without the trailing latency word.
    pub const MIN_SIZE: usize = 4 + SHORT_NAME_SIZE;
    pub const SIZE: usize = Self::MIN_SIZE + 4;

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::MIN_SIZE {
            return None;
        }
        let mut b = buf;
        let attributes = b.get_u32_le();
        let name = decode_name(&b[..SHORT_NAME_SIZE]);
        b.advance(SHORT_NAME_SIZE);
        let enable_latency = (b.remaining() >= 4).then(|| b.get_u32_le());
        Some(Self {
            attributes,
            name,
            enable_latency,
        })
    }
}

/// CLOCK_NAME_GET response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedName {
    pub flags: u32,
    pub name: String,
}

impl ExtendedName {
    pub const SIZE: usize = 4 + EXTENDED_NAME_SIZE;

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }
        let mut b = buf;
        let flags = b.get_u32_le();
        Some(Self {
            flags,
            name: decode_name(&b[..EXTENDED_NAME_SIZE]),
        })
    }
}

/// CLOCK_DESCRIBE_RATES request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescribeRatesRequest {
    pub id: u32,
    /// Number of rates already read (to be skipped).
    pub rate_index: u32,
}

impl DescribeRatesRequest {
    pub const SIZE: usize = 8;

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.id);
        buf.put_u32_le(self.rate_index);
    }
}

/// Accessors over a CLOCK_DESCRIBE_RATES response page.
pub struct DescribeRatesResponse;

impl DescribeRatesResponse {
    /// Size of the `num_rates_flags` header word.
    pub const HEADER_SIZE: usize = 4;

    pub fn flags(buf: &[u8]) -> Option<u32> {
        (buf.len() >= Self::HEADER_SIZE).then(|| (&buf[..4]).get_u32_le())
    }

    /// Rate entry `idx` of this page.
    pub fn rate(buf: &[u8], idx: usize) -> Option<u64> {
        let start = Self::HEADER_SIZE + idx * RATE_ENTRY_SIZE;
        let mut entry = buf.get(start..start + RATE_ENTRY_SIZE)?;
        let low = entry.get_u32_le();
        let high = entry.get_u32_le();
        Some(join_rate(low, high))
    }

    /// Total response length for a page carrying `count` rate entries.
    pub const fn len_for(count: usize) -> usize {
        Self::HEADER_SIZE + count * RATE_ENTRY_SIZE
    }
}

/// CLOCK_POSSIBLE_PARENTS_GET request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PossibleParentsRequest {
    pub id: u32,
    pub skip_parents: u32,
}

impl PossibleParentsRequest {
    pub const SIZE: usize = 8;

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.id);
        buf.put_u32_le(self.skip_parents);
    }
}

/// Accessors over a CLOCK_POSSIBLE_PARENTS_GET response page.
pub struct PossibleParentsResponse;

impl PossibleParentsResponse {
    pub const HEADER_SIZE: usize = 4;

    pub fn flags(buf: &[u8]) -> Option<u32> {
        (buf.len() >= Self::HEADER_SIZE).then(|| (&buf[..4]).get_u32_le())
    }

    pub fn parent(buf: &[u8], idx: usize) -> Option<u32> {
        let start = Self::HEADER_SIZE + idx * 4;
        buf.get(start..start + 4).map(|mut b| b.get_u32_le())
    }
}

/// CLOCK_RATE_SET request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSetRequest {
    pub flags: u32,
    pub id: u32,
    pub rate: u64,
}

impl RateSetRequest {
    pub const SIZE: usize = 16;

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        let (low, high) = split_rate(self.rate);
        buf.put_u32_le(self.flags);
        buf.put_u32_le(self.id);
        buf.put_u32_le(low);
        buf.put_u32_le(high);
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }
        let mut b = buf;
        let flags = b.get_u32_le();
        let id = b.get_u32_le();
        let low = b.get_u32_le();
        let high = b.get_u32_le();
        Some(Self {
            flags,
            id,
            rate: join_rate(low, high),
        })
    }
}

/// Delayed response to an asynchronous CLOCK_RATE_SET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSetComplete {
    pub id: u32,
    pub rate: u64,
}

impl RateSetComplete {
    pub const SIZE: usize = 12;

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        let (low, high) = split_rate(self.rate);
        buf.put_u32_le(self.id);
        buf.put_u32_le(low);
        buf.put_u32_le(high);
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }
        let mut b = buf;
        let id = b.get_u32_le();
        let low = b.get_u32_le();
        let high = b.get_u32_le();
        Some(Self {
            id,
            rate: join_rate(low, high),
        })
    }
}

/// A bare 64-bit rate (CLOCK_RATE_GET response).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateValue(pub u64);

impl RateValue {
    pub const SIZE: usize = RATE_ENTRY_SIZE;

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        let (low, high) = split_rate(self.0);
        buf.put_u32_le(low);
        buf.put_u32_le(high);
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }
        let mut b = buf;
        let low = b.get_u32_le();
        let high = b.get_u32_le();
        Some(Self(join_rate(low, high)))
    }
}

/// Legacy CLOCK_CONFIG_SET request: the state is the whole attributes word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigSetRequest {
    pub id: u32,
    pub attributes: u32,
}

impl ConfigSetRequest {
    pub const SIZE: usize = 8;

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.id);
        buf.put_u32_le(self.attributes);
    }
}

/// CLOCK_CONFIG_SET request from protocol 2.1 onwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigSetV2Request {
    pub id: u32,
    /// Extension type in bits 16..23, state in bits 0..1.
    pub attributes: u32,
    pub ext_value: u32,
}

impl ConfigSetV2Request {
    pub const SIZE: usize = 12;

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.id);
        buf.put_u32_le(self.attributes);
        buf.put_u32_le(self.ext_value);
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }
        let mut b = buf;
        Some(Self {
            id: b.get_u32_le(),
            attributes: b.get_u32_le(),
            ext_value: b.get_u32_le(),
        })
    }
}

/// CLOCK_CONFIG_GET request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigGetRequest {
    pub id: u32,
    pub flags: u32,
}

impl ConfigGetRequest {
    pub const SIZE: usize = 8;

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.id);
        buf.put_u32_le(self.flags);
    }
}

/// CLOCK_CONFIG_GET response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigGetResponse {
    pub attributes: u32,
    pub config: u32,
    pub ext_value: u32,
}

impl ConfigGetResponse {
    pub const SIZE: usize = 12;

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.attributes);
        buf.put_u32_le(self.config);
        buf.put_u32_le(self.ext_value);
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }
        let mut b = buf;
        Some(Self {
            attributes: b.get_u32_le(),
            config: b.get_u32_le(),
            ext_value: b.get_u32_le(),
        })
    }
}

/// CLOCK_PARENT_SET request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentSetRequest {
    pub id: u32,
    pub parent_id: u32,
}

impl ParentSetRequest {
    pub const SIZE: usize = 8;

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.id);
        buf.put_u32_le(self.parent_id);
    }
}

/// CLOCK_RATE_NOTIFY / CLOCK_RATE_CHANGE_REQUESTED_NOTIFY request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateNotifyRequest {
    pub id: u32,
    pub enable: bool,
}

impl RateNotifyRequest {
    pub const SIZE: usize = 8;

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.id);
        buf.put_u32_le(u32::from(self.enable));
    }
}

/// Rate notification payload delivered by firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateNotifyPayload {
    pub agent_id: u32,
    pub clock_id: u32,
    pub rate: u64,
}

impl RateNotifyPayload {
    pub const SIZE: usize = 16;

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        let (low, high) = split_rate(self.rate);
        buf.put_u32_le(self.agent_id);
        buf.put_u32_le(self.clock_id);
        buf.put_u32_le(low);
        buf.put_u32_le(high);
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }
        let mut b = buf;
        let agent_id = b.get_u32_le();
        let clock_id = b.get_u32_le();
        let low = b.get_u32_le();
        let high = b.get_u32_le();
        Some(Self {
            agent_id,
            clock_id,
            rate: join_rate(low, high),
        })
    }
}

/// Read a single little-endian `u32` response (parent get, permissions).
pub fn decode_u32(buf: &[u8]) -> Option<u32> {
    (buf.len() >= 4).then(|| (&buf[..4]).get_u32_le())
}
