//! # scmi-clock
//!
//! Client for the firmware clock management protocol.
//!
//! A privileged firmware agent owns the platform's clock domains; this crate
//! discovers them over a message transport shared with that agent, then
//! queries and controls them: rates, enable state, parents, vendor extension
//! values and rate-change notifications.
//!
//! ## Architecture
//!
//! - **Wire codec** ([`protocol`]): little-endian fixed-layout payloads
//! - **Paginated queries** ([`iterator`]): multi-page parent and rate lists
//! - **Registry** ([`registry`]): clock descriptors built once at init
//! - **Dispatcher** ([`ClockProtocol`]): validated per-clock commands
//! - **Notifications** ([`notify`]): subscription commands and event reports
//!
//! The transport is supplied by the caller through [`transport::Transport`].
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use scmi_clock::ClockProtocol;
//!
//! let clocks = ClockProtocol::init(Arc::new(mailbox)).await?;
//!
//! for id in 0..clocks.count() as u32 {
//!     if let Ok(info) = clocks.info(id) {
//!         println!("{}: {:?}", info.name, info.rates);
//!     }
//! }
//! ```

pub mod budget;
pub mod clock_config;
pub mod error;
pub mod iterator;
pub mod notify;
pub mod protocol;
pub mod registry;
pub mod transport;

mod client;

pub use client::{ClockProtocol, ClockProtocolBuilder, ProtocolConfig};
pub use clock_config::{ClockConfig, ClockState};
pub use error::{ClockError, Result};
pub use notify::{ClockEvent, ProtocolEvents, RateNotifReport};
pub use registry::{ClockInfo, RateRange, Rates};
