//! Clock registry - descriptors of every clock discovered at initialization.
//!
//! The table is sized once from the protocol attributes and filled in index
//! order. A slot whose attributes query failed keeps an empty name; lookups
//! treat such slots as absent while the slot itself stays in place, so
//! indices remain stable.

use serde::Serialize;

use crate::error::{ClockError, Result};

/// Continuous rate range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RateRange {
    pub min_rate: u64,
    pub max_rate: u64,
    pub step_size: u64,
}

/// How a clock describes the rates it supports.
///
/// Chosen by the first rates page and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum Rates {
    /// Exact achievable rates, sorted ascending.
    Discrete(Vec<u64>),
    /// Any rate in `min..=max` reachable in `step` increments.
    Continuous(RateRange),
}

impl Rates {
    #[inline]
    pub fn is_discrete(&self) -> bool {
        matches!(self, Rates::Discrete(_))
    }
}

/// Client-side record of one clock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClockInfo {
    /// Short or extended name; empty when the clock could not be described.
    pub name: String,
    /// Enable latency hint in microseconds, if firmware reported one.
    pub enable_latency: Option<u32>,
    /// Supported rates; `None` when the rates query failed.
    pub rates: Option<Rates>,
    /// Possible parent clock ids; only queried when firmware advertises parents.
    pub parents: Option<Vec<u32>>,
    pub rate_changed_notifications: bool,
    pub rate_change_requested_notifications: bool,
    pub state_ctrl_forbidden: bool,
    pub rate_ctrl_forbidden: bool,
    pub parent_ctrl_forbidden: bool,
}

impl ClockInfo {
    /// Whether initialization described this clock.
    #[inline]
    pub fn is_usable(&self) -> bool {
        !self.name.is_empty()
    }

    /// Number of possible parents (0 when not supported).
    #[inline]
    pub fn num_parents(&self) -> usize {
        self.parents.as_ref().map_or(0, Vec::len)
    }
}

/// Fixed-size table of clock descriptors indexed by clock id.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct ClockRegistry {
    clocks: Vec<ClockInfo>,
}

impl ClockRegistry {
    /// Allocate `count` empty slots.
    pub fn with_slots(count: usize) -> Result<Self> {
        let mut clocks = Vec::new();
        clocks.try_reserve_exact(count)?;
        clocks.resize_with(count, ClockInfo::default);
        Ok(Self { clocks })
    }

    /// Number of slots (the advertised clock count).
    #[inline]
    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }

    /// Bounds-checked slot access for command validation.
    ///
    /// Unlike [`get`](Self::get) this accepts slots that were never described.
    pub fn domain(&self, id: u32) -> Result<&ClockInfo> {
        self.clocks
            .get(id as usize)
            .ok_or_else(|| ClockError::InvalidArgument(format!("clock id {} out of range", id)))
    }

    /// Look up a described clock.
    pub fn get(&self, id: u32) -> Result<&ClockInfo> {
        self.clocks
            .get(id as usize)
            .filter(|clk| clk.is_usable())
            .ok_or(ClockError::NotFound(id))
    }

    /// Mutable slot access, used only while initializing.
    pub(crate) fn slot_mut(&mut self, id: u32) -> Option<&mut ClockInfo> {
        self.clocks.get_mut(id as usize)
    }

    /// Iterate over all slots, described or not.
    pub fn iter(&self) -> impl Iterator<Item = &ClockInfo> {
        self.clocks.iter()
    }
}
