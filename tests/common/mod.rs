//! In-memory firmware simulator shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::sync::Barrier;

use scmi_clock::protocol::{
    attr, cmd, config, parents, perm, rate_set, rates, ConfigSetV2Request, EXTENDED_NAME_SIZE,
    SHORT_NAME_SIZE,
};
use scmi_clock::transport::{BoxFuture, Transport, TransportError, Xfer};
use scmi_clock::{ClockProtocol, Result};

/// Status returned for unknown clocks or commands.
pub const STATUS_NOT_FOUND: i32 = -4;
pub const STATUS_GENERIC_ERROR: i32 = -8;

/// How a simulated clock answers DESCRIBE_RATES.
#[derive(Debug, Clone)]
pub enum MockRates {
    Discrete(Vec<u64>),
    Continuous { min: u64, max: u64, step: u64 },
    /// A single raw response page, sent as-is.
    Raw(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct MockClock {
    pub name: String,
    pub attributes: u32,
    pub latency: u32,
    pub ext_name: Option<String>,
    pub rates: MockRates,
    pub parents: Vec<u32>,
    pub perms: u32,
    pub fail_attributes: bool,
    pub fail_parents: bool,
}

impl MockClock {
    pub fn discrete(name: &str, list: Vec<u64>) -> Self {
        Self {
            name: name.to_string(),
            attributes: 0,
            latency: 0,
            ext_name: None,
            rates: MockRates::Discrete(list),
            parents: Vec::new(),
            perms: perm::STATE_CONTROL_ALLOWED
                | perm::PARENT_CONTROL_ALLOWED
                | perm::RATE_CONTROL_ALLOWED,
            fail_attributes: false,
            fail_parents: false,
        }
    }

    pub fn continuous(name: &str, min: u64, max: u64, step: u64) -> Self {
        Self {
            rates: MockRates::Continuous { min, max, step },
            ..Self::discrete(name, Vec::new())
        }
    }

    pub fn raw_rates(mut self, page: Vec<u8>) -> Self {
        self.rates = MockRates::Raw(page);
        self
    }

    pub fn latency(mut self, latency: u32) -> Self {
        self.latency = latency;
        self
    }

    pub fn extended_name(mut self, name: &str) -> Self {
        self.attributes |= attr::EXTENDED_NAME;
        self.ext_name = Some(name.to_string());
        self
    }

    pub fn parents(mut self, parents: Vec<u32>) -> Self {
        self.attributes |= attr::PARENT_CLOCK;
        self.parents = parents;
        self
    }

    pub fn permissions(mut self, perms: u32) -> Self {
        self.attributes |= attr::GET_PERMISSIONS;
        self.perms = perms;
        self
    }

    pub fn notifications(mut self) -> Self {
        self.attributes |= attr::RATE_CHANGED_NOTIFY | attr::RATE_CHANGE_REQUESTED_NOTIFY;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_attributes = true;
        self
    }

    pub fn failing_parents(mut self) -> Self {
        self.fail_parents = true;
        self
    }
}

/// A request as seen by the simulated firmware.
#[derive(Debug, Clone)]
pub struct Request {
    pub msg_id: u8,
    pub tx: Bytes,
    pub poll_completion: bool,
    pub confirmed: bool,
}

impl Request {
    /// First `u32` of the request (the clock id for most commands).
    pub fn word(&self, idx: usize) -> u32 {
        (&self.tx[idx * 4..idx * 4 + 4]).get_u32_le()
    }
}

#[derive(Debug, Default)]
struct ClockRuntime {
    rate: u64,
    enabled: bool,
    parent: u32,
    ext: HashMap<u8, u32>,
}

pub struct MockFirmware {
    version: u32,
    max_async: u8,
    clocks: Vec<MockClock>,
    rates_page: usize,
    parents_page: usize,
    fail_protocol_attributes: bool,
    rate_set_barrier: Option<Barrier>,
    echo_wrong_id: AtomicBool,
    offline: AtomicBool,
    runtime: Mutex<HashMap<u32, ClockRuntime>>,
    log: Mutex<Vec<Request>>,
    inits: AtomicUsize,
    released: AtomicUsize,
}

impl MockFirmware {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            max_async: 0,
            clocks: Vec::new(),
            rates_page: 4,
            parents_page: 2,
            fail_protocol_attributes: false,
            rate_set_barrier: None,
            echo_wrong_id: AtomicBool::new(false),
            offline: AtomicBool::new(false),
            runtime: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
            inits: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    pub fn clock(mut self, clock: MockClock) -> Self {
        self.clocks.push(clock);
        self
    }

    pub fn max_async(mut self, max_async: u8) -> Self {
        self.max_async = max_async;
        self
    }

    pub fn rates_page(mut self, size: usize) -> Self {
        self.rates_page = size;
        self
    }

    pub fn parents_page(mut self, size: usize) -> Self {
        self.parents_page = size;
        self
    }

    pub fn fail_protocol_attributes(mut self) -> Self {
        self.fail_protocol_attributes = true;
        self
    }

    /// Hold every RATE_SET until `parties` of them are in flight.
    pub fn rate_set_barrier(mut self, parties: usize) -> Self {
        self.rate_set_barrier = Some(Barrier::new(parties));
        self
    }

    pub fn echo_wrong_id(&self, wrong: bool) {
        self.echo_wrong_id.store(wrong, Ordering::SeqCst);
    }

    /// Answer every further command with a generic error status.
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn requests(&self) -> Vec<Request> {
        self.log.lock().unwrap().clone()
    }

    pub fn requests_for(&self, msg_id: u8) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| r.msg_id == msg_id)
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn set_rate(&self, id: u32, rate: u64) {
        self.runtime.lock().unwrap().entry(id).or_default().rate = rate;
    }

    pub fn set_enabled(&self, id: u32, enabled: bool) {
        self.runtime.lock().unwrap().entry(id).or_default().enabled = enabled;
    }

    pub fn rate(&self, id: u32) -> u64 {
        self.runtime
            .lock()
            .unwrap()
            .get(&id)
            .map_or(0, |c| c.rate)
    }

    pub fn enabled(&self, id: u32) -> bool {
        self.runtime
            .lock()
            .unwrap()
            .get(&id)
            .map_or(false, |c| c.enabled)
    }

    pub fn parent(&self, id: u32) -> u32 {
        self.runtime
            .lock()
            .unwrap()
            .get(&id)
            .map_or(0, |c| c.parent)
    }

    fn clock_at(&self, id: u32) -> std::result::Result<&MockClock, TransportError> {
        self.clocks
            .get(id as usize)
            .ok_or(TransportError::Status(STATUS_NOT_FOUND))
    }

    async fn handle(
        &self,
        xfer: &mut Xfer,
        confirmed: bool,
    ) -> std::result::Result<(), TransportError> {
        self.log.lock().unwrap().push(Request {
            msg_id: xfer.msg_id,
            tx: xfer.tx.clone().freeze(),
            poll_completion: xfer.poll_completion,
            confirmed,
        });

        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Status(STATUS_GENERIC_ERROR));
        }

        let mut tx = xfer.tx.clone().freeze();
        let mut rx = BytesMut::new();

        match xfer.msg_id {
            cmd::PROTOCOL_ATTRIBUTES => {
                if self.fail_protocol_attributes {
                    return Err(TransportError::Status(STATUS_GENERIC_ERROR));
                }
                rx.put_u16_le(self.clocks.len() as u16);
                rx.put_u8(self.max_async);
                rx.put_u8(0);
            }
            cmd::CLOCK_ATTRIBUTES => {
                let id = tx.get_u32_le();
                let clock = self.clock_at(id)?;
                if clock.fail_attributes {
                    return Err(TransportError::Status(STATUS_GENERIC_ERROR));
                }
                let mut attributes = clock.attributes;
                if self.enabled(id) {
                    attributes |= attr::ENABLED;
                }
                rx.put_u32_le(attributes);
                put_name(&mut rx, &clock.name, SHORT_NAME_SIZE);
                rx.put_u32_le(clock.latency);
            }
            cmd::NAME_GET => {
                let id = tx.get_u32_le();
                let clock = self.clock_at(id)?;
                let name = clock
                    .ext_name
                    .as_deref()
                    .ok_or(TransportError::Status(STATUS_NOT_FOUND))?;
                rx.put_u32_le(0);
                put_name(&mut rx, name, EXTENDED_NAME_SIZE);
            }
            cmd::DESCRIBE_RATES => {
                let id = tx.get_u32_le();
                let index = tx.get_u32_le() as usize;
                match &self.clock_at(id)?.rates {
                    MockRates::Discrete(list) => {
                        let page: Vec<u64> = list
                            .iter()
                            .skip(index)
                            .take(self.rates_page)
                            .copied()
                            .collect();
                        let remaining = list.len().saturating_sub(index + page.len());
                        rx.put_u32_le(rates::pack(page.len() as u32, remaining as u32, true));
                        for rate in page {
                            put_rate(&mut rx, rate);
                        }
                    }
                    MockRates::Continuous { min, max, step } => {
                        rx.put_u32_le(rates::pack(3, 0, false));
                        put_rate(&mut rx, *min);
                        put_rate(&mut rx, *max);
                        put_rate(&mut rx, *step);
                    }
                    MockRates::Raw(page) => rx.put_slice(page),
                }
            }
            cmd::POSSIBLE_PARENTS_GET => {
                let id = tx.get_u32_le();
                let skip = tx.get_u32_le() as usize;
                let clock = self.clock_at(id)?;
                if clock.fail_parents {
                    return Err(TransportError::Status(STATUS_GENERIC_ERROR));
                }
                let page: Vec<u32> = clock
                    .parents
                    .iter()
                    .skip(skip)
                    .take(self.parents_page)
                    .copied()
                    .collect();
                let remaining = clock.parents.len().saturating_sub(skip + page.len());
                rx.put_u32_le(parents::pack(page.len() as u32, remaining as u32));
                for parent in page {
                    rx.put_u32_le(parent);
                }
            }
            cmd::GET_PERMISSIONS => {
                let id = tx.get_u32_le();
                rx.put_u32_le(self.clock_at(id)?.perms);
            }
            cmd::RATE_GET => {
                let id = tx.get_u32_le();
                self.clock_at(id)?;
                put_rate(&mut rx, self.rate(id));
            }
            cmd::RATE_SET => {
                let flags = tx.get_u32_le();
                let id = tx.get_u32_le();
                let low = tx.get_u32_le();
                let high = tx.get_u32_le();
                let rate = u64::from(low) | (u64::from(high) << 32);
                self.clock_at(id)?;

                if let Some(barrier) = &self.rate_set_barrier {
                    barrier.wait().await;
                }

                self.set_rate(id, rate);
                if confirmed {
                    assert_ne!(flags & rate_set::ASYNC, 0);
                    let echoed = if self.echo_wrong_id.load(Ordering::SeqCst) {
                        id + 1
                    } else {
                        id
                    };
                    rx.put_u32_le(echoed);
                    put_rate(&mut rx, rate);
                }
            }
            cmd::CONFIG_SET => {
                if xfer.tx.len() == ConfigSetV2Request::SIZE {
                    let req = ConfigSetV2Request::decode(&xfer.tx)
                        .ok_or(TransportError::Status(STATUS_GENERIC_ERROR))?;
                    self.clock_at(req.id)?;
                    let mut runtime = self.runtime.lock().unwrap();
                    let clock = runtime.entry(req.id).or_default();
                    match config::state_of(req.attributes) {
                        0 => clock.enabled = false,
                        1 => clock.enabled = true,
                        _ => {}
                    }
                    let ext_type = config::ext_type_of(req.attributes);
                    if ext_type != config::NO_EXT_TYPE {
                        clock.ext.insert(ext_type, req.ext_value);
                    }
                } else {
                    let id = tx.get_u32_le();
                    let state = tx.get_u32_le();
                    self.clock_at(id)?;
                    self.set_enabled(id, state == 1);
                }
            }
            cmd::CONFIG_GET => {
                let id = tx.get_u32_le();
                let ext_type = (tx.get_u32_le() & 0xff) as u8;
                self.clock_at(id)?;
                let runtime = self.runtime.lock().unwrap();
                let clock = runtime.get(&id);
                rx.put_u32_le(0);
                rx.put_u32_le(u32::from(clock.map_or(false, |c| c.enabled)));
                rx.put_u32_le(
                    clock
                        .and_then(|c| c.ext.get(&ext_type).copied())
                        .unwrap_or(0),
                );
            }
            cmd::PARENT_SET => {
                let id = tx.get_u32_le();
                let parent = tx.get_u32_le();
                self.clock_at(id)?;
                self.runtime.lock().unwrap().entry(id).or_default().parent = parent;
            }
            cmd::PARENT_GET => {
                let id = tx.get_u32_le();
                self.clock_at(id)?;
                rx.put_u32_le(self.parent(id));
            }
            cmd::RATE_NOTIFY | cmd::RATE_CHANGE_REQUESTED_NOTIFY => {
                let id = tx.get_u32_le();
                self.clock_at(id)?;
            }
            _ => return Err(TransportError::Status(STATUS_NOT_FOUND)),
        }

        xfer.rx = rx.freeze();
        Ok(())
    }
}

impl Transport for MockFirmware {
    fn negotiated_version(&self) -> u32 {
        self.version
    }

    fn init_request(
        &self,
        msg_id: u8,
        tx_size: usize,
        rx_size: usize,
    ) -> std::result::Result<Xfer, TransportError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(Xfer::new(msg_id, tx_size, rx_size))
    }

    fn execute<'a>(
        &'a self,
        xfer: &'a mut Xfer,
    ) -> BoxFuture<'a, std::result::Result<(), TransportError>> {
        Box::pin(self.handle(xfer, false))
    }

    fn execute_with_confirmation<'a>(
        &'a self,
        xfer: &'a mut Xfer,
    ) -> BoxFuture<'a, std::result::Result<(), TransportError>> {
        Box::pin(self.handle(xfer, true))
    }

    fn release(&self, _xfer: Xfer) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

fn put_name(buf: &mut BytesMut, name: &str, size: usize) {
    let mut field = vec![0u8; size];
    let len = name.len().min(size);
    field[..len].copy_from_slice(&name.as_bytes()[..len]);
    buf.put_slice(&field);
}

pub fn put_rate(buf: &mut impl BufMut, rate: u64) {
    buf.put_u32_le((rate & 0xffff_ffff) as u32);
    buf.put_u32_le((rate >> 32) as u32);
}

/// Build a raw DESCRIBE_RATES page.
pub fn rates_page(returned: u32, remaining: u32, discrete: bool, entries: &[u64]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.put_u32_le(rates::pack(returned, remaining, discrete));
    for rate in entries {
        put_rate(&mut buf, *rate);
    }
    buf
}

/// Initialize a protocol session over `firmware`.
pub async fn init(firmware: &Arc<MockFirmware>) -> Result<ClockProtocol> {
    ClockProtocol::init(firmware.clone()).await
}
