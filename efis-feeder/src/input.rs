//! Input modules: one per physical data source.
//!
//! Each input owns a transport, a frame synchronizer, and the telemetry
//! records it writes. Records are handed in at construction ([`Shared`]
//! handles) so readers hold the same instances the input updates.
//!
//! Error handling per tick:
//! - no data: silent no-op
//! - bad frame (length, field, checksum): logged, counted, skipped
//! - unknown message or sub-type: trace log only
//! - transport failure: the input marks itself fatal and closes; other
//!   inputs keep running

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, error, info, trace, warn};

use efis_core::ahrs::{FOREFLIGHT_ID, LEVIL_ID};
use efis_core::gdl90::{self, Gdl90Frame, Gdl90Message, HEARTBEAT, OWNSHIP_GEO_ALT, TRAFFIC};
use efis_core::records::*;
use efis_core::skyview::{self, SkyviewMessage};
use efis_core::sync::{split_delimited, DelimitedSync, SkyviewSync};
use efis_core::targets::{TargetEvent, TargetTable};
use efis_core::types::hex_encode;
use efis_core::EfisError;

use crate::transport::ByteSource;

/// Replay delay per SkyView frame.
pub const SKYVIEW_PACING: Duration = Duration::from_millis(50);
/// Replay delay per GDL-90 frame.
pub const GDL90_PACING: Duration = Duration::from_millis(20);

pub trait Input {
    fn name(&self) -> &str;

    /// Read whatever the transport has and decode it. Returns the number of
    /// frames decoded this tick.
    fn read_tick(&mut self, exit: &AtomicBool) -> usize;

    fn close(&mut self);

    fn is_closed(&self) -> bool;

    /// True when the input closed because its transport failed.
    fn is_fatal(&self) -> bool;
}

/// Wall-clock seconds since the Unix epoch.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Transport wrapper shared by the inputs
// ---------------------------------------------------------------------------

struct Feed {
    source: Box<dyn ByteSource>,
    raw_log: Option<Box<dyn Write>>,
    pacing: Option<Duration>,
    closed: bool,
    fatal: bool,
}

impl Feed {
    fn new(source: Box<dyn ByteSource>) -> Self {
        Feed {
            source,
            raw_log: None,
            pacing: None,
            closed: false,
            fatal: false,
        }
    }

    /// Next chunk, or `None` when the input must stop this tick.
    fn next_chunk(&mut self, name: &str, exit: &AtomicBool) -> Option<Vec<u8>> {
        if self.closed {
            return None;
        }
        if exit.load(Ordering::Relaxed) {
            info!("{name}: exit requested, closing");
            self.closed = true;
            return None;
        }
        match self.source.read_chunk() {
            Ok(chunk) => {
                if chunk.is_empty() && self.source.is_exhausted() {
                    info!("{name}: {} exhausted", self.source.describe());
                    self.closed = true;
                }
                Some(chunk)
            }
            Err(e) => {
                error!("{name}: {} failed: {e}", self.source.describe());
                self.fatal = true;
                self.closed = true;
                None
            }
        }
    }

    fn log_frame(&mut self, name: &str, frame: &[u8]) {
        if let Some(w) = self.raw_log.as_mut() {
            if let Err(e) = w.write_all(frame) {
                warn!("{name}: raw log write failed, disabling: {e}");
                self.raw_log = None;
            }
        }
    }

    fn pace(&self) {
        if let Some(d) = self.pacing {
            std::thread::sleep(d);
        }
    }

    fn close(&mut self) {
        if let Some(mut w) = self.raw_log.take() {
            let _ = w.flush();
        }
        self.closed = true;
    }
}

fn open_raw_log(path: &Path) -> io::Result<Box<dyn Write>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    info!("logging raw frames to {}", path.display());
    Ok(Box::new(io::BufWriter::new(file)))
}

// ---------------------------------------------------------------------------
// SkyView
// ---------------------------------------------------------------------------

/// Records written by a SkyView input.
#[derive(Clone, Default)]
pub struct SkyviewRecords {
    pub attitude: Shared<AttitudeRecord>,
    pub air: Shared<AirDataRecord>,
    pub nav: Shared<NavRecord>,
    pub engine: Shared<EngineRecord>,
    pub fuel: Shared<FuelRecord>,
    pub gps: Shared<GpsRecord>,
}

/// Dynon SkyView ADAHRS / SYSTEM / EMS frames over serial, UDP, or replay.
pub struct SkyviewInput {
    name: String,
    feed: Feed,
    sync: SkyviewSync,
    use_ahrs: bool,
    pub records: SkyviewRecords,
    pub frames: u64,
    pub checksum_errors: u64,
}

impl SkyviewInput {
    pub fn new(name: &str, source: Box<dyn ByteSource>, records: SkyviewRecords) -> Self {
        SkyviewInput {
            name: name.to_string(),
            feed: Feed::new(source),
            sync: SkyviewSync::new(),
            use_ahrs: true,
            records,
            frames: 0,
            checksum_errors: 0,
        }
    }

    /// When false, ADAHRS frames leave the attitude and air-data records alone.
    pub fn with_ahrs(mut self, use_ahrs: bool) -> Self {
        if !use_ahrs {
            info!("{}: skipping AHRS data", self.name);
        }
        self.use_ahrs = use_ahrs;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.feed.pacing = Some(pacing);
        self
    }

    pub fn with_raw_log(mut self, path: &Path) -> io::Result<Self> {
        self.feed.raw_log = Some(open_raw_log(path)?);
        Ok(self)
    }

    pub fn dropped(&self) -> u64 {
        self.sync.dropped
    }

    /// Decode one synchronized frame into the records.
    pub fn process_frame(&mut self, frame: &[u8]) -> Option<SkyviewMessage> {
        if !skyview::checksum_ok(frame) {
            self.checksum_errors += 1;
            debug!(
                "{}: checksum mismatch on type {} frame",
                self.name,
                frame.get(1).map_or('?', |&b| b as char)
            );
        }

        let msg = match skyview::decode(frame) {
            Ok(m) => m,
            Err(e) => {
                warn!("{}: dropping frame: {e}", self.name);
                self.count_bad(frame.get(1).copied());
                return None;
            }
        };

        self.frames += 1;
        msg.apply_time(&mut self.records.gps.borrow_mut());
        match &msg {
            SkyviewMessage::Adahrs(m) => {
                if self.use_ahrs {
                    let mut att = self.records.attitude.borrow_mut();
                    let mut air = self.records.air.borrow_mut();
                    m.apply(&mut att, &mut air);
                    att.msg_count += 1;
                    air.msg_count += 1;
                }
            }
            SkyviewMessage::System(m) => {
                let mut nav = self.records.nav.borrow_mut();
                m.apply(&mut nav);
                nav.msg_count += 1;
            }
            SkyviewMessage::Ems(m) => {
                let mut engine = self.records.engine.borrow_mut();
                let mut fuel = self.records.fuel.borrow_mut();
                m.apply(&mut engine, &mut fuel);
                engine.msg_count += 1;
                fuel.msg_count += 1;
            }
        }
        Some(msg)
    }

    fn count_bad(&self, msg_type: Option<u8>) {
        match msg_type {
            Some(skyview::ADAHRS) => self.records.air.borrow_mut().msg_bad += 1,
            Some(skyview::SYSTEM) => self.records.nav.borrow_mut().msg_bad += 1,
            Some(skyview::EMS) => self.records.engine.borrow_mut().msg_bad += 1,
            _ => {}
        }
    }
}

impl Input for SkyviewInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_tick(&mut self, exit: &AtomicBool) -> usize {
        let Some(chunk) = self.feed.next_chunk(&self.name, exit) else {
            return 0;
        };
        if self.feed.source.is_datagram() {
            self.sync.reset();
        }

        let mut decoded = 0;
        for frame in self.sync.feed(&chunk) {
            self.feed.log_frame(&self.name, &frame);
            if self.process_frame(&frame).is_some() {
                decoded += 1;
            }
            self.feed.pace();
        }
        decoded
    }

    fn close(&mut self) {
        self.feed.close();
    }

    fn is_closed(&self) -> bool {
        self.feed.closed
    }

    fn is_fatal(&self) -> bool {
        self.feed.fatal
    }
}

// ---------------------------------------------------------------------------
// GDL-90 (SkyView ADS-B, Stratux)
// ---------------------------------------------------------------------------

/// Records written by a GDL-90 input.
#[derive(Clone)]
pub struct Gdl90Records {
    pub gps: Shared<GpsRecord>,
    pub attitude: Shared<AttitudeRecord>,
    pub air: Shared<AirDataRecord>,
    pub device: Shared<DeviceRecord>,
    pub targets: Shared<TargetTable>,
}

impl Default for Gdl90Records {
    fn default() -> Self {
        Gdl90Records {
            gps: Shared::default(),
            attitude: Shared::default(),
            air: Shared::default(),
            device: Shared::default(),
            targets: shared(TargetTable::default()),
        }
    }
}

/// Called with every event the target table emits.
pub type EventHandler = Box<dyn FnMut(&TargetEvent)>;

/// GDL-90 traffic, ownship and AHRS extensions.
pub struct Gdl90Input {
    name: String,
    feed: Feed,
    sync: DelimitedSync,
    use_ahrs: bool,
    clock: fn() -> f64,
    on_event: Option<EventHandler>,
    pub records: Gdl90Records,
    pub frames: u64,
    pub fcs_errors: u64,
    pub unknown: u64,
}

impl Gdl90Input {
    pub fn new(name: &str, source: Box<dyn ByteSource>, records: Gdl90Records) -> Self {
        Gdl90Input {
            name: name.to_string(),
            feed: Feed::new(source),
            sync: DelimitedSync::new(),
            use_ahrs: true,
            clock: now_secs,
            on_event: None,
            records,
            frames: 0,
            fcs_errors: 0,
            unknown: 0,
        }
    }

    /// When false, only ownship and traffic are used: Levil and ForeFlight
    /// AHRS frames, heartbeats and ownship geometric altitude are ignored.
    pub fn with_ahrs(mut self, use_ahrs: bool) -> Self {
        if !use_ahrs {
            info!("{}: skipping AHRS data", self.name);
        }
        self.use_ahrs = use_ahrs;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.feed.pacing = Some(pacing);
        self
    }

    pub fn with_raw_log(mut self, path: &Path) -> io::Result<Self> {
        self.feed.raw_log = Some(open_raw_log(path)?);
        Ok(self)
    }

    /// Time source for target timestamps.
    pub fn with_clock(mut self, clock: fn() -> f64) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_handler(mut self, handler: EventHandler) -> Self {
        self.on_event = Some(handler);
        self
    }

    pub fn dropped(&self) -> u64 {
        self.sync.dropped
    }

    /// Decode one `~...~` wire frame into the records.
    pub fn process_frame(&mut self, wire: &[u8]) -> Option<Gdl90Message> {
        let frame = Gdl90Frame::from_wire(wire);
        trace!("{}: rx {}", self.name, hex_encode(&frame.data));
        if !frame.fcs_ok {
            self.fcs_errors += 1;
            debug!("{}: FCS mismatch on id {:?}", self.name, frame.id());
        }

        if !self.use_ahrs
            && matches!(
                frame.id(),
                Some(LEVIL_ID | FOREFLIGHT_ID | HEARTBEAT | OWNSHIP_GEO_ALT)
            )
        {
            return None;
        }

        let msg = match gdl90::decode(&frame) {
            Ok(m) => m,
            Err(EfisError::UnknownMessage(_)) => {
                self.unknown += 1;
                return None;
            }
            Err(EfisError::UnknownSubtype { id, sub }) => {
                trace!("{}: id {id:#04x} sub-id {sub} skipped", self.name);
                self.unknown += 1;
                return None;
            }
            Err(e) => {
                warn!("{}: dropping frame: {e}", self.name);
                if frame.id() == Some(TRAFFIC) {
                    self.records.targets.borrow_mut().msg_bad += 1;
                } else {
                    self.records.gps.borrow_mut().msg_bad += 1;
                }
                return None;
            }
        };

        self.frames += 1;
        let now = (self.clock)();
        match &msg {
            Gdl90Message::Heartbeat(h) => {
                let mut gps = self.records.gps.borrow_mut();
                h.apply(&mut gps);
                gps.msg_count += 1;
            }
            Gdl90Message::Ownship(r) => {
                let mut gps = self.records.gps.borrow_mut();
                r.apply_ownship(&mut gps);
                gps.msg_count += 1;
                self.records
                    .targets
                    .borrow_mut()
                    .set_own_position(r.lat, r.lon, r.altitude);
            }
            Gdl90Message::OwnshipGeoAltitude(g) => {
                let mut gps = self.records.gps.borrow_mut();
                g.apply(&mut gps);
                gps.msg_count += 1;
            }
            Gdl90Message::Traffic(r) => {
                let events = self.records.targets.borrow_mut().upsert(r, now);
                for event in events {
                    log_event(&self.name, &event);
                    if let Some(handler) = self.on_event.as_mut() {
                        handler(&event);
                    }
                }
            }
            Gdl90Message::Levil(m) => {
                let mut att = self.records.attitude.borrow_mut();
                let mut air = self.records.air.borrow_mut();
                let mut gps = self.records.gps.borrow_mut();
                let mut device = self.records.device.borrow_mut();
                m.apply(&mut att, &mut air, &mut gps, &mut device);
                att.msg_count += 1;
                device.msg_count += 1;
            }
            Gdl90Message::ForeFlight(m) => {
                let mut att = self.records.attitude.borrow_mut();
                let mut air = self.records.air.borrow_mut();
                m.apply(&mut att, &mut air);
                att.msg_count += 1;
                air.msg_count += 1;
            }
        }
        Some(msg)
    }
}

fn log_event(name: &str, event: &TargetEvent) {
    match event {
        TargetEvent::NewTarget {
            address,
            n_number,
            aircraft,
            ..
        } => info!(
            "{name}: new target {:06X} {} {}",
            address,
            n_number.as_deref().unwrap_or("-"),
            aircraft
                .as_ref()
                .and_then(|a| a.description())
                .unwrap_or_default()
        ),
        TargetEvent::FlightNumber {
            address,
            flight_number,
            airline,
            ..
        } => info!(
            "{name}: {:06X} flying as {flight_number} {}",
            address,
            airline.as_deref().unwrap_or("")
        ),
        TargetEvent::Updated { .. } => {}
    }
}

impl Input for Gdl90Input {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_tick(&mut self, exit: &AtomicBool) -> usize {
        let Some(chunk) = self.feed.next_chunk(&self.name, exit) else {
            return 0;
        };

        let frames = if self.feed.source.is_datagram() {
            split_delimited(&chunk)
        } else {
            self.sync.feed(&chunk)
        };

        let mut decoded = 0;
        for frame in frames {
            self.feed.log_frame(&self.name, &frame);
            if self.process_frame(&frame).is_some() {
                decoded += 1;
            }
            self.feed.pace();
        }

        let now = (self.clock)();
        let pruned = self.records.targets.borrow_mut().prune_stale(now);
        if pruned > 0 {
            debug!("{}: pruned {pruned} stale targets", self.name);
        }
        decoded
    }

    fn close(&mut self) {
        self.feed.close();
    }

    fn is_closed(&self) -> bool {
        self.feed.closed
    }

    fn is_fatal(&self) -> bool {
        self.feed.fatal
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
