//! Protocol client: initialization and clock operations.
//!
//! The [`ClockProtocolBuilder`] collects configuration and runs the one-time
//! discovery pass. The resulting [`ClockProtocol`] owns the session:
//! 1. Read the negotiated version and protocol attributes
//! 2. Describe every clock (attributes, optional follow-ups, rates)
//! 3. Pick the config get/set variant for the version
//! 4. Serve per-clock commands, validated against the registry
//!
//! # Example
//!
//! ```ignore
//! use scmi_clock::ClockProtocol;
//!
//! let clocks = ClockProtocol::builder()
//!     .max_num_rates(32)
//!     .init(transport)
//!     .await?;
//!
//! let info = clocks.info(0)?;
//! clocks.rate_set(0, 800_000_000).await?;
//! clocks.enable(0, false).await?;
//! ```

use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;
use serde::Serialize;

use crate::budget::AsyncBudget;
use crate::clock_config::{self, ClockConfig, ClockState, ConfigOps};
use crate::error::{ClockError, Result};
use crate::iterator::{IterOps, IterState, PagedQuery};
use crate::notify::{self, ClockEvent, ProtocolEvents, RateNotifReport};
use crate::protocol::{
    attr, cmd, config, decode_u32, parents, perm, rate_set, rates, version_major, version_minor,
    ClockAttributes, ClockIdRequest, DescribeRatesRequest, DescribeRatesResponse, ExtendedName,
    ParentSetRequest, PossibleParentsRequest, PossibleParentsResponse, ProtocolAttributes,
    RateSetComplete, RateSetRequest, RateValue, DEFAULT_MAX_NUM_RATES,
};
use crate::registry::{ClockInfo, ClockRegistry, RateRange, Rates};
use crate::transport::{BoxFuture, Transport, XferGuard};

/// Entries in a continuous range reply (min, max, step).
const RANGE_ENTRIES: u32 = 3;

/// Tunables for the discovery pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Platform cap on discrete rates kept per clock.
    pub max_num_rates: usize,
    /// Replace short names with extended ones when firmware offers them.
    pub extended_names: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_num_rates: DEFAULT_MAX_NUM_RATES,
            extended_names: true,
        }
    }
}

/// Builder for configuring and initializing a clock protocol session.
pub struct ClockProtocolBuilder {
    config: ProtocolConfig,
}

impl ClockProtocolBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: ProtocolConfig::default(),
        }
    }

    /// Set the maximum number of discrete rates kept per clock.
    ///
    /// Never lower than 3, the size of a continuous range reply.
    /// Default: 16
    pub fn max_num_rates(mut self, limit: usize) -> Self {
        self.config.max_num_rates = limit.max(RANGE_ENTRIES as usize);
        self
    }

    /// Enable or disable extended name queries.
    ///
    /// Default: enabled
    pub fn extended_names(mut self, enabled: bool) -> Self {
        self.config.extended_names = enabled;
        self
    }

    /// Run discovery over `transport` and return the ready session.
    pub async fn init(self, transport: Arc<dyn Transport>) -> Result<ClockProtocol> {
        ClockProtocol::start(transport, self.config).await
    }
}

impl Default for ClockProtocolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An initialized clock protocol session.
///
/// The registry is fixed after initialization; the only state mutated by
/// operations is the asynchronous request counter.
pub struct ClockProtocol {
    transport: Arc<dyn Transport>,
    version: u32,
    registry: ClockRegistry,
    budget: AsyncBudget,
    config_ops: &'static dyn ConfigOps,
}

impl ClockProtocol {
    /// Create a new builder.
    pub fn builder() -> ClockProtocolBuilder {
        ClockProtocolBuilder::new()
    }

    /// Initialize with default configuration.
    pub async fn init(transport: Arc<dyn Transport>) -> Result<Self> {
        Self::start(transport, ProtocolConfig::default()).await
    }

    async fn start(transport: Arc<dyn Transport>, config: ProtocolConfig) -> Result<Self> {
        let version = transport.negotiated_version();
        tracing::debug!(
            "Clock Version {}.{}",
            version_major(version),
            version_minor(version)
        );

        let attrs = protocol_attributes_get(&*transport).await?;
        let mut registry = ClockRegistry::with_slots(usize::from(attrs.num_clocks))?;

        for id in 0..u32::from(attrs.num_clocks) {
            let Some(clk) = registry.slot_mut(id) else {
                continue;
            };

            if let Err(e) = attributes_get(&*transport, id, clk, version, &config).await {
                tracing::warn!("Clock {}: attributes query failed: {}", id, e);
                continue;
            }

            match describe_rates_get(&*transport, id, &clk.name, config.max_num_rates).await {
                Ok(rates) => clk.rates = Some(rates),
                Err(e) => tracing::warn!("Clock {} ({}): rates query failed: {}", id, clk.name, e),
            }
        }

        let config_ops = clock_config::select(version);
        tracing::debug!(
            "{} clocks, {} async requests, {} config",
            registry.len(),
            attrs.max_async_req,
            config_ops.name()
        );

        Ok(Self {
            transport,
            version,
            registry,
            budget: AsyncBudget::new(usize::from(attrs.max_async_req)),
            config_ops,
        })
    }

    /// Negotiated protocol version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Number of clocks advertised by firmware (including unusable slots).
    pub fn count(&self) -> usize {
        self.registry.len()
    }

    /// Maximum concurrent asynchronous requests firmware accepts.
    pub fn max_async_requests(&self) -> usize {
        self.budget.max_async()
    }

    /// Asynchronous requests currently in flight.
    pub fn async_in_flight(&self) -> usize {
        self.budget.in_flight()
    }

    /// Descriptor of a described clock.
    pub fn info(&self, id: u32) -> Result<&ClockInfo> {
        self.registry.get(id)
    }

    /// Possible parents of a clock, empty when it has none.
    pub fn possible_parents(&self, id: u32) -> Result<&[u32]> {
        let clk = self.registry.domain(id)?;
        Ok(clk.parents.as_deref().unwrap_or(&[]))
    }

    /// Current clock rate in Hz.
    pub async fn rate_get(&self, id: u32) -> Result<u64> {
        self.registry.domain(id)?;

        let mut xfer = XferGuard::init(
            &*self.transport,
            cmd::RATE_GET,
            ClockIdRequest::SIZE,
            RateValue::SIZE,
        )?;
        ClockIdRequest { id }.encode_into(&mut xfer.tx);

        xfer.execute().await?;

        RateValue::decode(&xfer.rx)
            .map(|v| v.0)
            .ok_or_else(|| ClockError::Protocol("short CLOCK_RATE_GET response".to_string()))
    }

    /// Set the clock rate in Hz.
    ///
    /// Uses asynchronous completion while the firmware's async budget has
    /// room, synchronous completion otherwise.
    pub async fn rate_set(&self, id: u32, rate: u64) -> Result<()> {
        let clk = self.registry.domain(id)?;
        if clk.rate_ctrl_forbidden {
            return Err(ClockError::PermissionDenied(format!(
                "rate control of clock {}",
                id
            )));
        }

        let mut xfer = XferGuard::init(
            &*self.transport,
            cmd::RATE_SET,
            RateSetRequest::SIZE,
            RateSetComplete::SIZE,
        )?;

        let slot = self.budget.acquire();
        let flags = if slot.is_async() { rate_set::ASYNC } else { 0 };
        RateSetRequest { flags, id, rate }.encode_into(&mut xfer.tx);

        if slot.is_async() {
            xfer.execute_with_confirmation().await?;

            let resp = RateSetComplete::decode(&xfer.rx).ok_or_else(|| {
                ClockError::Protocol("short delayed CLOCK_RATE_SET response".to_string())
            })?;
            if resp.id != id {
                return Err(ClockError::Protocol(format!(
                    "delayed rate response for clock {} while setting clock {}",
                    resp.id, id
                )));
            }
            tracing::debug!("Clock {} set async to {}", id, resp.rate);
        } else {
            xfer.execute().await?;
        }

        Ok(())
    }

    /// Enable a clock.
    pub async fn enable(&self, id: u32, atomic: bool) -> Result<()> {
        self.state_set(id, ClockState::Enable, atomic).await
    }

    /// Disable a clock.
    pub async fn disable(&self, id: u32, atomic: bool) -> Result<()> {
        self.state_set(id, ClockState::Disable, atomic).await
    }

    async fn state_set(&self, id: u32, state: ClockState, atomic: bool) -> Result<()> {
        let clk = self.registry.domain(id)?;
        if clk.state_ctrl_forbidden {
            return Err(ClockError::PermissionDenied(format!(
                "state control of clock {}",
                id
            )));
        }

        self.config_ops
            .config_set(&*self.transport, id, state, config::NO_EXT_TYPE, 0, atomic)
            .await
    }

    /// Whether the clock is currently enabled.
    pub async fn state_get(&self, id: u32, atomic: bool) -> Result<bool> {
        self.registry.domain(id)?;

        let cfg = self
            .config_ops
            .config_get(&*self.transport, id, config::NO_EXT_TYPE, atomic)
            .await?;
        Ok(cfg.enabled)
    }

    /// Read a vendor extension value (protocol 2.1+).
    pub async fn config_ext_get(&self, id: u32, ext_type: u8, atomic: bool) -> Result<ClockConfig> {
        self.registry.domain(id)?;

        self.config_ops
            .config_get(&*self.transport, id, ext_type, atomic)
            .await
    }

    /// Write a vendor extension value, leaving the enable state unchanged.
    pub async fn config_ext_set(
        &self,
        id: u32,
        ext_type: u8,
        ext_value: u32,
        atomic: bool,
    ) -> Result<()> {
        self.registry.domain(id)?;

        self.config_ops
            .config_set(
                &*self.transport,
                id,
                ClockState::Unchanged,
                ext_type,
                ext_value,
                atomic,
            )
            .await
    }

    /// Switch to the parent at `parent_index` in the clock's possible parents.
    pub async fn parent_set(&self, id: u32, parent_index: u32) -> Result<()> {
        let clk = self.registry.domain(id)?;

        let parent_id = clk
            .parents
            .as_deref()
            .and_then(|p| p.get(parent_index as usize))
            .copied()
            .ok_or_else(|| {
                ClockError::InvalidArgument(format!(
                    "parent index {} out of range for clock {}",
                    parent_index, id
                ))
            })?;

        if clk.parent_ctrl_forbidden {
            return Err(ClockError::PermissionDenied(format!(
                "parent control of clock {}",
                id
            )));
        }

        let mut xfer = XferGuard::init(&*self.transport, cmd::PARENT_SET, ParentSetRequest::SIZE, 0)?;
        xfer.poll_completion = false;
        ParentSetRequest { id, parent_id }.encode_into(&mut xfer.tx);

        xfer.execute().await?;
        Ok(())
    }

    /// Current parent clock id.
    pub async fn parent_get(&self, id: u32) -> Result<u32> {
        self.registry.domain(id)?;

        let mut xfer = XferGuard::init(&*self.transport, cmd::PARENT_GET, ClockIdRequest::SIZE, 4)?;
        ClockIdRequest { id }.encode_into(&mut xfer.tx);

        xfer.execute().await?;

        decode_u32(&xfer.rx)
            .ok_or_else(|| ClockError::Protocol("short CLOCK_PARENT_GET response".to_string()))
    }

    /// Subscribe to (or unsubscribe from) `event` on clock `id`.
    pub async fn rate_notify(&self, id: u32, event: ClockEvent, enable: bool) -> Result<()> {
        self.set_notify_enabled(event as u8, id, enable).await
    }

    /// JSON dump of the session and every clock descriptor.
    pub fn summary_json(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Summary<'a> {
            version: String,
            max_async_requests: usize,
            config: &'static str,
            clocks: &'a ClockRegistry,
        }

        let summary = Summary {
            version: format!(
                "{}.{}",
                version_major(self.version),
                version_minor(self.version)
            ),
            max_async_requests: self.budget.max_async(),
            config: self.config_ops.name(),
            clocks: &self.registry,
        };
        Ok(serde_json::to_string_pretty(&summary)?)
    }
}

impl ProtocolEvents for ClockProtocol {
    fn num_sources(&self) -> usize {
        self.registry.len()
    }

    fn set_notify_enabled<'a>(
        &'a self,
        evt_id: u8,
        src_id: u32,
        enable: bool,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let msg_id = notify::command_for(evt_id)?;
            self.registry.domain(src_id)?;

            let result = notify::rate_notify(&*self.transport, src_id, msg_id, enable).await;
            if let Err(e) = &result {
                tracing::debug!(
                    "FAIL_ENABLED - evt[{:X}] dom[{}] - {}",
                    evt_id,
                    src_id,
                    e
                );
            }
            result
        })
    }

    fn fill_custom_report(
        &self,
        evt_id: u8,
        timestamp: Instant,
        payload: &[u8],
    ) -> Option<RateNotifReport> {
        notify::fill_report(evt_id, timestamp, payload)
    }
}

async fn protocol_attributes_get(transport: &dyn Transport) -> Result<ProtocolAttributes> {
    let mut xfer = XferGuard::init(
        transport,
        cmd::PROTOCOL_ATTRIBUTES,
        0,
        ProtocolAttributes::SIZE,
    )?;

    xfer.execute().await?;

    ProtocolAttributes::decode(&xfer.rx)
        .ok_or_else(|| ClockError::Protocol("short PROTOCOL_ATTRIBUTES response".to_string()))
}

/// Fill `clk` from CLOCK_ATTRIBUTES and the follow-ups it advertises.
///
/// Only the attributes query itself can fail; follow-up failures are logged
/// and leave the corresponding fields at their defaults.
async fn attributes_get(
    transport: &dyn Transport,
    id: u32,
    clk: &mut ClockInfo,
    version: u32,
    config: &ProtocolConfig,
) -> Result<()> {
    let attrs = {
        let mut xfer = XferGuard::init(
            transport,
            cmd::CLOCK_ATTRIBUTES,
            ClockIdRequest::SIZE,
            ClockAttributes::SIZE,
        )?;
        ClockIdRequest { id }.encode_into(&mut xfer.tx);

        xfer.execute().await?;

        ClockAttributes::decode(&xfer.rx)
            .ok_or_else(|| ClockError::Protocol("short CLOCK_ATTRIBUTES response".to_string()))?
    };

    clk.name = attrs.name;

    // Everything below is only defined from protocol 2.0 on.
    if version_major(version) < 2 {
        return Ok(());
    }

    clk.enable_latency = attrs.enable_latency.filter(|&latency| latency != 0);

    if config.extended_names && attr::has(attrs.attributes, attr::EXTENDED_NAME) {
        match extended_name_get(transport, id).await {
            Ok(name) if !name.is_empty() => clk.name = name,
            Ok(_) => {}
            Err(e) => tracing::debug!("Clock {}: keeping short name: {}", id, e),
        }
    }

    clk.rate_changed_notifications = attr::has(attrs.attributes, attr::RATE_CHANGED_NOTIFY);
    clk.rate_change_requested_notifications =
        attr::has(attrs.attributes, attr::RATE_CHANGE_REQUESTED_NOTIFY);

    if attr::has(attrs.attributes, attr::PARENT_CLOCK) {
        match possible_parents_get(transport, id).await {
            Ok(parents) => clk.parents = Some(parents),
            Err(e) => tracing::warn!("Clock {}: possible parents query failed: {}", id, e),
        }
    }

    if attr::has(attrs.attributes, attr::GET_PERMISSIONS) {
        match permissions_get(transport, id).await {
            Ok(perms) => {
                clk.state_ctrl_forbidden = perms & perm::STATE_CONTROL_ALLOWED == 0;
                clk.rate_ctrl_forbidden = perms & perm::RATE_CONTROL_ALLOWED == 0;
                clk.parent_ctrl_forbidden = perms & perm::PARENT_CONTROL_ALLOWED == 0;
            }
            Err(e) => tracing::warn!("Clock {}: permissions query failed: {}", id, e),
        }
    }

    Ok(())
}

async fn extended_name_get(transport: &dyn Transport, id: u32) -> Result<String> {
    let mut xfer = XferGuard::init(
        transport,
        cmd::NAME_GET,
        ClockIdRequest::SIZE,
        ExtendedName::SIZE,
    )?;
    ClockIdRequest { id }.encode_into(&mut xfer.tx);

    xfer.execute().await?;

    ExtendedName::decode(&xfer.rx)
        .map(|n| n.name)
        .ok_or_else(|| ClockError::Protocol("short CLOCK_NAME_GET response".to_string()))
}

async fn permissions_get(transport: &dyn Transport, id: u32) -> Result<u32> {
    let mut xfer = XferGuard::init(
        transport,
        cmd::GET_PERMISSIONS,
        ClockIdRequest::SIZE,
        4,
    )?;
    ClockIdRequest { id }.encode_into(&mut xfer.tx);

    xfer.execute().await?;

    decode_u32(&xfer.rx)
        .ok_or_else(|| ClockError::Protocol("short CLOCK_GET_PERMISSIONS response".to_string()))
}

/// Possible parents pages: the total is only known from the first page.
struct ParentsQuery {
    clk_id: u32,
    parents: Vec<u32>,
}

impl IterOps for ParentsQuery {
    fn prepare_message(&self, tx: &mut BytesMut, desc_index: u32) {
        PossibleParentsRequest {
            id: self.clk_id,
            skip_parents: desc_index,
        }
        .encode_into(tx);
    }

    fn update_state(&mut self, st: &mut IterState, response: &[u8]) -> Result<()> {
        let flags = PossibleParentsResponse::flags(response).ok_or_else(|| {
            ClockError::Protocol("short CLOCK_POSSIBLE_PARENTS_GET response".to_string())
        })?;
        st.num_returned = parents::num_returned(flags);
        st.num_remaining = parents::num_remaining(flags);

        if st.max_resources == 0 {
            let total = st.num_returned + st.num_remaining;
            self.parents.try_reserve_exact(total as usize)?;
            self.parents.resize(total as usize, 0);
            st.max_resources = total;
        }

        Ok(())
    }

    fn process_response(&mut self, st: &IterState, response: &[u8]) -> Result<()> {
        let parent = PossibleParentsResponse::parent(response, st.loop_idx as usize)
            .ok_or_else(|| ClockError::Protocol("truncated possible parents page".to_string()))?;

        let slot = self
            .parents
            .get_mut((st.desc_index + st.loop_idx) as usize)
            .ok_or_else(|| ClockError::Protocol("parent index past announced total".to_string()))?;
        *slot = parent;
        Ok(())
    }
}

async fn possible_parents_get(transport: &dyn Transport, id: u32) -> Result<Vec<u32>> {
    let query = ParentsQuery {
        clk_id: id,
        parents: Vec::new(),
    };

    let query = PagedQuery::new(
        transport,
        query,
        0,
        cmd::POSSIBLE_PARENTS_GET,
        PossibleParentsRequest::SIZE,
    )
    .run()
    .await?;

    Ok(query.parents)
}

/// Describe-rates pages: a discrete list or a single (min, max, step) triplet.
struct RatesQuery<'n> {
    clk_id: u32,
    name: &'n str,
    discrete: Option<bool>,
    list: Vec<u64>,
    range: RateRange,
}

impl RatesQuery<'_> {
    fn into_rates(self) -> Rates {
        match self.discrete {
            Some(false) => {
                tracing::debug!(
                    "Min {} Max {} Step {} Hz",
                    self.range.min_rate,
                    self.range.max_rate,
                    self.range.step_size
                );
                Rates::Continuous(self.range)
            }
            _ => {
                let mut list = self.list;
                list.sort_unstable();
                Rates::Discrete(list)
            }
        }
    }
}

impl IterOps for RatesQuery<'_> {
    fn prepare_message(&self, tx: &mut BytesMut, desc_index: u32) {
        DescribeRatesRequest {
            id: self.clk_id,
            rate_index: desc_index,
        }
        .encode_into(tx);
    }

    fn update_state(&mut self, st: &mut IterState, response: &[u8]) -> Result<()> {
        let flags = DescribeRatesResponse::flags(response).ok_or_else(|| {
            ClockError::Protocol("short CLOCK_DESCRIBE_RATES response".to_string())
        })?;
        st.num_returned = rates::num_returned(flags);
        st.num_remaining = rates::num_remaining(flags);
        let discrete = rates::is_discrete(flags);

        match self.discrete {
            None => {
                self.discrete = Some(discrete);
                if discrete {
                    self.list.try_reserve_exact(st.max_resources as usize)?;
                }
            }
            Some(known) if known != discrete => {
                return Err(ClockError::Protocol(format!(
                    "clock {} switched rate representation mid-query",
                    self.clk_id
                )));
            }
            Some(_) => {}
        }

        if !discrete && (st.num_returned != RANGE_ENTRIES || st.num_remaining != 0) {
            tracing::warn!(
                "Unexpected CLOCK_DESCRIBE_RATES reply for {} - returned:{} remaining:{} rx_len:{}",
                self.name,
                st.num_returned,
                st.num_remaining,
                st.rx_len
            );

            // Known quirk: a full triplet arrives with a wrong returned count.
            if st.num_returned != RANGE_ENTRIES
                && st.num_remaining == 0
                && st.rx_len == DescribeRatesResponse::len_for(RANGE_ENTRIES as usize)
            {
                st.num_returned = RANGE_ENTRIES;
                st.num_remaining = 0;
            } else {
                tracing::error!("Cannot repair rates reply for {}", self.name);
                return Err(ClockError::Protocol(format!(
                    "malformed continuous rate reply for clock {}",
                    self.clk_id
                )));
            }
        }

        Ok(())
    }

    fn process_response(&mut self, st: &IterState, response: &[u8]) -> Result<()> {
        let rate = DescribeRatesResponse::rate(response, st.loop_idx as usize)
            .ok_or_else(|| ClockError::Protocol("truncated rates page".to_string()))?;

        if self.discrete == Some(false) {
            match st.desc_index + st.loop_idx {
                0 => self.range.min_rate = rate,
                1 => self.range.max_rate = rate,
                2 => self.range.step_size = rate,
                idx => {
                    return Err(ClockError::InvalidArgument(format!(
                        "continuous range entry {} out of range",
                        idx
                    )))
                }
            }
        } else {
            self.list.push(rate);
        }

        Ok(())
    }
}

async fn describe_rates_get(
    transport: &dyn Transport,
    id: u32,
    name: &str,
    max_num_rates: usize,
) -> Result<Rates> {
    let query = RatesQuery {
        clk_id: id,
        name,
        discrete: None,
        list: Vec::new(),
        range: RateRange::default(),
    };

    let max = u32::try_from(max_num_rates).unwrap_or(u32::MAX);
    let query = PagedQuery::new(
        transport,
        query,
        max,
        cmd::DESCRIBE_RATES,
        DescribeRatesRequest::SIZE,
    )
    .run()
    .await?;

    Ok(query.into_rates())
}
