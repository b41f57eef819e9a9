//! Wire format constants and field helpers.
//!
//! Every multi-byte field on the wire is a little-endian `u32` (or `u16` for
//! the clock count). Rates are 64-bit values carried as two 32-bit halves:
//! ```text
//! ┌───────────┬───────────┐
//! │ value_low │ value_high│
//! │ u32 LE    │ u32 LE    │
//! └───────────┴───────────┘
//! ```
//!
//! Flag words pack several fields; always test individual bits through the
//! helpers in the sub-modules below, never compare whole words.

/// Size of the short, fixed name field in CLOCK_ATTRIBUTES responses.
pub const SHORT_NAME_SIZE: usize = 16;

/// Size of the extended name field in CLOCK_NAME_GET responses.
pub const EXTENDED_NAME_SIZE: usize = 64;

/// Default platform cap on the number of discrete rates per clock.
pub const DEFAULT_MAX_NUM_RATES: usize = 16;

/// Size of one rate entry (`value_low`, `value_high`).
pub const RATE_ENTRY_SIZE: usize = 8;

/// Command identifiers understood by the clock protocol.
pub mod cmd {
    pub const PROTOCOL_VERSION: u8 = 0x0;
    pub const PROTOCOL_ATTRIBUTES: u8 = 0x1;
    pub const CLOCK_ATTRIBUTES: u8 = 0x3;
    pub const DESCRIBE_RATES: u8 = 0x4;
    pub const RATE_SET: u8 = 0x5;
    pub const RATE_GET: u8 = 0x6;
    pub const CONFIG_SET: u8 = 0x7;
    pub const NAME_GET: u8 = 0x8;
    pub const RATE_NOTIFY: u8 = 0x9;
    pub const RATE_CHANGE_REQUESTED_NOTIFY: u8 = 0xA;
    pub const CONFIG_GET: u8 = 0xB;
    pub const POSSIBLE_PARENTS_GET: u8 = 0xC;
    pub const PARENT_SET: u8 = 0xD;
    pub const PARENT_GET: u8 = 0xE;
    pub const GET_PERMISSIONS: u8 = 0xF;
}

/// Bits of the CLOCK_ATTRIBUTES `attributes` word.
pub mod attr {
    pub const RATE_CHANGED_NOTIFY: u32 = 1 << 31;
    pub const RATE_CHANGE_REQUESTED_NOTIFY: u32 = 1 << 30;
    pub const EXTENDED_NAME: u32 = 1 << 29;
    pub const PARENT_CLOCK: u32 = 1 << 28;
    pub const GET_PERMISSIONS: u32 = 1 << 1;
    /// Clock enabled (legacy state read through CLOCK_ATTRIBUTES).
    pub const ENABLED: u32 = 1 << 0;

    /// Check if a specific attribute bit is set.
    #[inline]
    pub fn has(attributes: u32, bit: u32) -> bool {
        attributes & bit != 0
    }
}

/// Bits of the CLOCK_GET_PERMISSIONS response.
pub mod perm {
    pub const STATE_CONTROL_ALLOWED: u32 = 1 << 31;
    pub const PARENT_CONTROL_ALLOWED: u32 = 1 << 30;
    pub const RATE_CONTROL_ALLOWED: u32 = 1 << 29;
}

/// CLOCK_DESCRIBE_RATES `num_rates_flags` fields.
pub mod rates {
    const RETURNED_MASK: u32 = 0xfff;
    const CONTINUOUS: u32 = 1 << 12;
    const REMAINING_SHIFT: u32 = 16;

    #[inline]
    pub fn num_returned(flags: u32) -> u32 {
        flags & RETURNED_MASK
    }

    #[inline]
    pub fn num_remaining(flags: u32) -> u32 {
        flags >> REMAINING_SHIFT
    }

    /// Discrete list when bit 12 is clear, continuous range otherwise.
    #[inline]
    pub fn is_discrete(flags: u32) -> bool {
        flags & CONTINUOUS == 0
    }

    /// Build a flags word (used by firmware simulators in tests).
    pub fn pack(returned: u32, remaining: u32, discrete: bool) -> u32 {
        let mut flags = (returned & RETURNED_MASK) | (remaining << REMAINING_SHIFT);
        if !discrete {
            flags |= CONTINUOUS;
        }
        flags
    }
}

/// CLOCK_POSSIBLE_PARENTS_GET `num_parent_flags` fields.
pub mod parents {
    const RETURNED_MASK: u32 = 0xff;
    const REMAINING_SHIFT: u32 = 24;

    #[inline]
    pub fn num_returned(flags: u32) -> u32 {
        flags & RETURNED_MASK
    }

    #[inline]
    pub fn num_remaining(flags: u32) -> u32 {
        flags >> REMAINING_SHIFT
    }

    pub fn pack(returned: u32, remaining: u32) -> u32 {
        (returned & RETURNED_MASK) | (remaining << REMAINING_SHIFT)
    }
}

/// CLOCK_RATE_SET `flags` bits.
pub mod rate_set {
    pub const ASYNC: u32 = 1 << 0;
    pub const IGNORE_DELAYED_RESP: u32 = 1 << 1;
    pub const ROUND_UP: u32 = 1 << 2;
    pub const ROUND_AUTO: u32 = 1 << 3;
}

/// CLOCK_CONFIG_SET / CLOCK_CONFIG_GET field layout.
pub mod config {
    /// Extension type tag meaning "no extension".
    pub const NO_EXT_TYPE: u8 = 0;

    const EXT_TYPE_SET_SHIFT: u32 = 16;
    const EXT_TYPE_SET_MASK: u32 = 0xff << EXT_TYPE_SET_SHIFT;
    const STATE_MASK: u32 = 0x3;
    const EXT_TYPE_GET_MASK: u32 = 0xff;
    /// Bit 0 of the CONFIG_GET `config` word.
    pub const ENABLED: u32 = 1 << 0;

    /// Pack extension type (bits 16..23) and state (bits 0..1) for CONFIG_SET v2.
    #[inline]
    pub fn set_attributes(ext_type: u8, state: u32) -> u32 {
        ((u32::from(ext_type) << EXT_TYPE_SET_SHIFT) & EXT_TYPE_SET_MASK) | (state & STATE_MASK)
    }

    #[inline]
    pub fn ext_type_of(attributes: u32) -> u8 {
        ((attributes & EXT_TYPE_SET_MASK) >> EXT_TYPE_SET_SHIFT) as u8
    }

    #[inline]
    pub fn state_of(attributes: u32) -> u32 {
        attributes & STATE_MASK
    }

    /// Pack extension type (bits 0..7) for CONFIG_GET.
    #[inline]
    pub fn get_flags(ext_type: u8) -> u32 {
        u32::from(ext_type) & EXT_TYPE_GET_MASK
    }
}

/// Split a 64-bit rate into its (low, high) wire halves.
#[inline]
pub fn split_rate(rate: u64) -> (u32, u32) {
    ((rate & 0xffff_ffff) as u32, (rate >> 32) as u32)
}

/// Reassemble a 64-bit rate from its (low, high) wire halves.
#[inline]
pub fn join_rate(low: u32, high: u32) -> u64 {
    u64::from(low) | (u64::from(high) << 32)
}

/// Extract the major revision from a negotiated protocol version.
#[inline]
pub fn version_major(version: u32) -> u16 {
    (version >> 16) as u16
}

/// Extract the minor revision from a negotiated protocol version.
#[inline]
pub fn version_minor(version: u32) -> u16 {
    (version & 0xffff) as u16
}

/// Decode a fixed-size NUL-padded name field.
///
/// Stops at the first NUL and never keeps more than `field.len() - 1` bytes,
/// so an unterminated field is truncated the same way firmware-side copies are.
pub fn decode_name(field: &[u8]) -> String {
    let limit = field.len().saturating_sub(1);
    let bytes = &field[..limit];
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
