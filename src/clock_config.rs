//! Clock configuration get/set strategies.
//!
//! Firmware older than protocol 2.1 only knows the legacy layout, where the
//! CONFIG_SET attributes word is the clock state and the state is read back
//! through CLOCK_ATTRIBUTES. From 2.1 on, CONFIG_SET packs a vendor extension
//! type next to the state and carries an extension value, and CONFIG_GET is a
//! dedicated command.
//!
//! The variant is picked once at initialization with [`select`] and stored
//! as a `&'static dyn ConfigOps` in the session.

use std::fmt::Debug;

use crate::error::{ClockError, Result};
use crate::protocol::{
    attr, cmd, config, decode_u32, version_major, version_minor, ClockAttributes, ClockIdRequest,
    ConfigGetRequest, ConfigGetResponse, ConfigSetRequest, ConfigSetV2Request,
};
use crate::transport::{BoxFuture, Transport, XferGuard};

/// Target state in a CONFIG_SET request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ClockState {
    Disable = 0,
    Enable = 1,
    /// Never valid on the wire.
    Reserved = 2,
    /// Leave the state alone (only meaningful with an extension type).
    Unchanged = 3,
}

/// Result of a config get.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockConfig {
    /// Raw attributes word (v2 only).
    pub attributes: Option<u32>,
    pub enabled: bool,
    /// Extension value, present only when a nonzero extension type was asked for.
    pub ext_value: Option<u32>,
}

/// Config get/set wire format.
pub trait ConfigOps: Send + Sync + Debug {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Apply `state` and, when `ext_type` is nonzero, the extension value.
    fn config_set<'a>(
        &'a self,
        transport: &'a dyn Transport,
        clk_id: u32,
        state: ClockState,
        ext_type: u8,
        ext_value: u32,
        atomic: bool,
    ) -> BoxFuture<'a, Result<()>>;

    /// Read the enable state and, when `ext_type` is nonzero, the extension value.
    fn config_get<'a>(
        &'a self,
        transport: &'a dyn Transport,
        clk_id: u32,
        ext_type: u8,
        atomic: bool,
    ) -> BoxFuture<'a, Result<ClockConfig>>;
}

/// Pre-2.1 config layout.
#[derive(Debug)]
pub struct LegacyConfig;

/// Protocol 2.1+ config layout.
#[derive(Debug)]
pub struct ConfigV2;

static LEGACY_CONFIG: LegacyConfig = LegacyConfig;
static CONFIG_V2: ConfigV2 = ConfigV2;

/// Pick the config strategy for a negotiated protocol version.
pub fn select(version: u32) -> &'static dyn ConfigOps {
    if (version_major(version), version_minor(version)) >= (2, 1) {
        &CONFIG_V2
    } else {
        &LEGACY_CONFIG
    }
}

impl ConfigOps for LegacyConfig {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn config_set<'a>(
        &'a self,
        transport: &'a dyn Transport,
        clk_id: u32,
        state: ClockState,
        _ext_type: u8,
        _ext_value: u32,
        atomic: bool,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if matches!(state, ClockState::Reserved | ClockState::Unchanged) {
                return Err(ClockError::InvalidArgument(format!(
                    "state {:?} not supported by legacy config",
                    state
                )));
            }

            let mut xfer = XferGuard::init(transport, cmd::CONFIG_SET, ConfigSetRequest::SIZE, 0)?;
            xfer.poll_completion = atomic;
            ConfigSetRequest {
                id: clk_id,
                attributes: state as u32,
            }
            .encode_into(&mut xfer.tx);

            xfer.execute().await?;
            Ok(())
        })
    }

    fn config_get<'a>(
        &'a self,
        transport: &'a dyn Transport,
        clk_id: u32,
        ext_type: u8,
        atomic: bool,
    ) -> BoxFuture<'a, Result<ClockConfig>> {
        Box::pin(async move {
            if ext_type != config::NO_EXT_TYPE {
                return Err(ClockError::InvalidArgument(
                    "extension values require protocol 2.1".to_string(),
                ));
            }

            let mut xfer = XferGuard::init(
                transport,
                cmd::CLOCK_ATTRIBUTES,
                ClockIdRequest::SIZE,
                ClockAttributes::SIZE,
            )?;
            xfer.poll_completion = atomic;
            ClockIdRequest { id: clk_id }.encode_into(&mut xfer.tx);

            xfer.execute().await?;

            let attributes = decode_u32(&xfer.rx).ok_or_else(|| {
                ClockError::Protocol("short CLOCK_ATTRIBUTES response".to_string())
            })?;

            Ok(ClockConfig {
                attributes: None,
                enabled: attr::has(attributes, attr::ENABLED),
                ext_value: None,
            })
        })
    }
}

impl ConfigOps for ConfigV2 {
    fn name(&self) -> &'static str {
        "v2"
    }

    fn config_set<'a>(
        &'a self,
        transport: &'a dyn Transport,
        clk_id: u32,
        state: ClockState,
        ext_type: u8,
        ext_value: u32,
        atomic: bool,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if state == ClockState::Reserved
                || (ext_type == config::NO_EXT_TYPE && state == ClockState::Unchanged)
            {
                return Err(ClockError::InvalidArgument(format!(
                    "state {:?} with extension type {} is not a valid request",
                    state, ext_type
                )));
            }

            let mut xfer =
                XferGuard::init(transport, cmd::CONFIG_SET, ConfigSetV2Request::SIZE, 0)?;
            xfer.poll_completion = atomic;

            // The value field is always written so nothing stale goes out.
            let ext_value = if ext_type != config::NO_EXT_TYPE {
                ext_value
            } else {
                0
            };
            ConfigSetV2Request {
                id: clk_id,
                attributes: config::set_attributes(ext_type, state as u32),
                ext_value,
            }
            .encode_into(&mut xfer.tx);

            xfer.execute().await?;
            Ok(())
        })
    }

    fn config_get<'a>(
        &'a self,
        transport: &'a dyn Transport,
        clk_id: u32,
        ext_type: u8,
        atomic: bool,
    ) -> BoxFuture<'a, Result<ClockConfig>> {
        Box::pin(async move {
            let mut xfer = XferGuard::init(
                transport,
                cmd::CONFIG_GET,
                ConfigGetRequest::SIZE,
                ConfigGetResponse::SIZE,
            )?;
            xfer.poll_completion = atomic;
            ConfigGetRequest {
                id: clk_id,
                flags: config::get_flags(ext_type),
            }
            .encode_into(&mut xfer.tx);

            xfer.execute().await?;

            let resp = ConfigGetResponse::decode(&xfer.rx).ok_or_else(|| {
                ClockError::Protocol("short CLOCK_CONFIG_GET response".to_string())
            })?;

            Ok(ClockConfig {
                attributes: Some(resp.attributes),
                enabled: resp.config & config::ENABLED != 0,
                ext_value: (ext_type != config::NO_EXT_TYPE).then_some(resp.ext_value),
            })
        })
    }
}
