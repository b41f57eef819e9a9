//! Protocol module - wire format and message layouts.
//!
//! This module implements the little-endian clock protocol payloads:
//! - Command identifiers and flag-word bit fields
//! - Fixed-layout request encoders and response decoders
//! - 64-bit rate split/join helpers

mod messages;
mod wire_format;

pub use messages::{
    decode_u32, ClockAttributes, ClockIdRequest, ConfigGetRequest, ConfigGetResponse,
    ConfigSetRequest, ConfigSetV2Request, DescribeRatesRequest, DescribeRatesResponse,
    ExtendedName, ParentSetRequest, PossibleParentsRequest, PossibleParentsResponse,
    ProtocolAttributes, RateNotifyPayload, RateNotifyRequest, RateSetComplete, RateSetRequest,
    RateValue,
};
pub use wire_format::{
    attr, cmd, config, decode_name, join_rate, parents, perm, rate_set, rates, split_rate,
    version_major, version_minor, DEFAULT_MAX_NUM_RATES, EXTENDED_NAME_SIZE, RATE_ENTRY_SIZE,
    SHORT_NAME_SIZE,
};
