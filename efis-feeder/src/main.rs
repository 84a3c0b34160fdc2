//! efis-feeder: Reads EFIS and ADS-B sources and decodes them.
//!
//! Supports:
//! - Decoding a SkyView or GDL-90 capture file once
//! - Running live inputs (UDP, serial) or looping replays under the scheduler

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use efis_core::config::{self, Config};
use efis_core::sync::{DelimitedSync, SkyviewSync};
use efis_core::{gdl90, skyview, Gdl90Frame};
use efis_feeder::input::{GDL90_PACING, SKYVIEW_PACING};
use efis_feeder::{
    ByteSource, Gdl90Input, Gdl90Records, Input, ReplaySource, Scheduler, SerialSource,
    SkyviewInput, SkyviewRecords, UdpSource,
};

#[derive(Parser)]
#[command(
    name = "efis-feeder",
    version,
    about = "EFIS / ADS-B input decoding"
)]
struct Cli {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Protocol {
    Skyview,
    Gdl90,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a capture file once and print every message
    Decode {
        /// Capture file (raw SkyView serial bytes or GDL-90 frames)
        file: PathBuf,

        #[arg(long, value_enum)]
        protocol: Protocol,

        /// Print messages as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Run inputs under the poll scheduler
    Run {
        /// SkyView serial-over-UDP port
        #[arg(long)]
        skyview_udp: Option<u16>,

        /// SkyView ADS-B (GDL-90) UDP port
        #[arg(long)]
        adsb_udp: Option<u16>,

        /// Stratux (GDL-90 + AHRS) UDP port
        #[arg(long)]
        stratux_udp: Option<u16>,

        /// SkyView serial device
        #[arg(long)]
        serial: Option<String>,

        #[arg(long)]
        baud: Option<u32>,

        /// Loop a capture file instead of live input
        #[arg(long, requires = "protocol")]
        replay: Option<PathBuf>,

        #[arg(long, value_enum)]
        protocol: Option<Protocol>,

        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<f64>,

        /// Ignore AHRS data from every source
        #[arg(long)]
        no_ahrs: bool,

        /// Append each input's accepted frames to `<DIR>/<input>.bin` (replay format)
        #[arg(long, value_name = "DIR")]
        raw_log: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Decode {
            file,
            protocol,
            json,
        } => cmd_decode(&file, protocol, json),
        Commands::Run {
            skyview_udp,
            adsb_udp,
            stratux_udp,
            serial,
            baud,
            replay,
            protocol,
            seconds,
            no_ahrs,
            raw_log,
        } => {
            let sources = RunSources {
                skyview_udp,
                adsb_udp,
                stratux_udp,
                serial,
                baud,
                replay: replay.zip(protocol),
            };
            cmd_run(
                sources,
                seconds.map(|s| Duration::from_secs_f64(s.max(0.0))),
                no_ahrs,
                raw_log,
            )
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

// ---------------------------------------------------------------------------
// decode
// ---------------------------------------------------------------------------

fn cmd_decode(file: &Path, protocol: Protocol, json: bool) {
    let mut source = match ReplaySource::once(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: cannot open {}: {e}", file.display());
            std::process::exit(1);
        }
    };

    let mut skyview_sync = SkyviewSync::new();
    let mut gdl90_sync = DelimitedSync::new();
    let (mut frames, mut decoded, mut bad) = (0u64, 0u64, 0u64);

    while !source.is_exhausted() {
        let chunk = match source.read_chunk() {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        };
        match protocol {
            Protocol::Skyview => {
                for frame in skyview_sync.feed(&chunk) {
                    frames += 1;
                    match skyview::decode(&frame) {
                        Ok(msg) => {
                            decoded += 1;
                            print_message(&msg, json);
                        }
                        Err(e) => {
                            bad += 1;
                            eprintln!("  bad frame: {e}");
                        }
                    }
                }
            }
            Protocol::Gdl90 => {
                for wire in gdl90_sync.feed(&chunk) {
                    frames += 1;
                    let frame = Gdl90Frame::from_wire(&wire);
                    match gdl90::decode(&frame) {
                        Ok(msg) => {
                            decoded += 1;
                            print_message(&msg, json);
                        }
                        Err(efis_core::EfisError::UnknownMessage(_)) => {}
                        Err(e) => {
                            bad += 1;
                            eprintln!("  bad frame: {e}");
                        }
                    }
                }
            }
        }
    }

    let dropped = match protocol {
        Protocol::Skyview => skyview_sync.dropped,
        Protocol::Gdl90 => gdl90_sync.dropped,
    };
    eprintln!("{frames} frames, {decoded} decoded, {bad} bad, {dropped} dropped by sync");
}

fn print_message<T: serde::Serialize + std::fmt::Debug>(msg: &T, json: bool) {
    if json {
        match serde_json::to_string(msg) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("  cannot serialize: {e}"),
        }
    } else {
        println!("{msg:?}");
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

struct RunSources {
    skyview_udp: Option<u16>,
    adsb_udp: Option<u16>,
    stratux_udp: Option<u16>,
    serial: Option<String>,
    baud: Option<u32>,
    replay: Option<(PathBuf, Protocol)>,
}

impl RunSources {
    fn is_empty(&self) -> bool {
        self.skyview_udp.is_none()
            && self.adsb_udp.is_none()
            && self.stratux_udp.is_none()
            && self.serial.is_none()
            && self.replay.is_none()
    }
}

fn open_or_exit<T>(what: &str, result: std::io::Result<T>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: cannot open {what}: {e}");
            std::process::exit(1);
        }
    }
}

/// Records owned by one input, kept for the end-of-run summary.
enum InputRecords {
    Skyview(SkyviewRecords),
    Gdl90(Gdl90Records),
}

/// Settings shared by every input of a run.
struct InputOptions<'a> {
    cfg: &'a Config,
    no_ahrs: bool,
    raw_log: Option<&'a Path>,
}

impl InputOptions<'_> {
    fn raw_log_path(&self, name: &str) -> Option<PathBuf> {
        self.raw_log.map(|dir| dir.join(format!("{name}.bin")))
    }
}

/// SkyView input with a record set of its own.
fn skyview_input(
    name: &str,
    source: Box<dyn ByteSource>,
    pacing: Option<Duration>,
    opts: &InputOptions,
) -> (Box<dyn Input>, InputRecords) {
    let records = SkyviewRecords::default();
    let mut input = SkyviewInput::new(name, source, records.clone())
        .with_ahrs(opts.cfg.skyview.use_ahrs && !opts.no_ahrs);
    if let Some(p) = pacing {
        input = input.with_pacing(p);
    }
    if let Some(path) = opts.raw_log_path(name) {
        input = open_or_exit("raw log", input.with_raw_log(&path));
    }
    (Box::new(input), InputRecords::Skyview(records))
}

/// GDL-90 input with a record set and target table of its own.
fn gdl90_input(
    name: &str,
    source: Box<dyn ByteSource>,
    use_ahrs: bool,
    pacing: Option<Duration>,
    opts: &InputOptions,
) -> (Box<dyn Input>, InputRecords) {
    let records = Gdl90Records::default();
    {
        let mut targets = records.targets.borrow_mut();
        targets.timeout = opts.cfg.traffic.timeout_secs;
        targets.identity_retention = opts.cfg.traffic.identity_retention;
    }
    let mut input = Gdl90Input::new(name, source, records.clone())
        .with_ahrs(use_ahrs && !opts.no_ahrs);
    if let Some(p) = pacing {
        input = input.with_pacing(p);
    }
    if let Some(path) = opts.raw_log_path(name) {
        input = open_or_exit("raw log", input.with_raw_log(&path));
    }
    (Box::new(input), InputRecords::Gdl90(records))
}

fn cmd_run(
    mut sources: RunSources,
    limit: Option<Duration>,
    no_ahrs: bool,
    raw_log: Option<PathBuf>,
) {
    let cfg = config::load_config();
    if let Some(dir) = &raw_log {
        open_or_exit("raw log directory", std::fs::create_dir_all(dir));
    }
    if sources.is_empty() {
        apply_config_defaults(&mut sources, &cfg);
    }

    let opts = InputOptions {
        cfg: &cfg,
        no_ahrs,
        raw_log: raw_log.as_deref(),
    };
    let mut inputs = Vec::new();

    if let Some(port) = sources.skyview_udp {
        let src = Box::new(open_or_exit("skyview udp", UdpSource::bind(port)));
        inputs.push(skyview_input("skyview", src, None, &opts));
    }
    if let Some(dev) = &sources.serial {
        let baud = sources.baud.unwrap_or(cfg.serial.baudrate);
        let src = Box::new(open_or_exit(dev, SerialSource::open(dev, baud)));
        inputs.push(skyview_input("serial_skyview", src, None, &opts));
    }
    if let Some((path, Protocol::Skyview)) = &sources.replay {
        let src = Box::new(open_or_exit("replay", ReplaySource::looping(path)));
        inputs.push(skyview_input("skyview_replay", src, Some(SKYVIEW_PACING), &opts));
    }
    if let Some(port) = sources.adsb_udp {
        let src = Box::new(open_or_exit("adsb udp", UdpSource::bind(port)));
        inputs.push(gdl90_input("skyview_adsb", src, false, None, &opts));
    }
    if let Some(port) = sources.stratux_udp {
        let src = Box::new(open_or_exit("stratux udp", UdpSource::bind(port)));
        inputs.push(gdl90_input("stratux", src, cfg.stratux.use_ahrs, None, &opts));
    }
    if let Some((path, Protocol::Gdl90)) = &sources.replay {
        let src = Box::new(open_or_exit("replay", ReplaySource::looping(path)));
        let use_ahrs = cfg.stratux.use_ahrs;
        inputs.push(gdl90_input("gdl90_replay", src, use_ahrs, Some(GDL90_PACING), &opts));
    }

    let mut scheduler = Scheduler::new();
    let mut summaries = Vec::new();
    for (input, records) in inputs {
        summaries.push((input.name().to_string(), records));
        scheduler.add(input);
    }
    let total = scheduler.run(limit);
    info!("{total} frames decoded in {} passes", scheduler.passes);

    for (name, records) in &summaries {
        eprintln!("{}", summarize(name, records));
    }
}

/// One summary line per input.
fn summarize(name: &str, records: &InputRecords) -> String {
    match records {
        InputRecords::Skyview(r) => format!(
            "{name}: attitude msgs {}, nav msgs {}, engine msgs {}, bad {}",
            r.attitude.borrow().msg_count,
            r.nav.borrow().msg_count,
            r.engine.borrow().msg_count,
            r.air.borrow().msg_bad + r.nav.borrow().msg_bad + r.engine.borrow().msg_bad,
        ),
        InputRecords::Gdl90(r) => {
            let targets = r.targets.borrow();
            format!(
                "{name}: gps msgs {}, attitude msgs {}, targets {} ({} reports, {} bad)",
                r.gps.borrow().msg_count,
                r.attitude.borrow().msg_count,
                targets.len(),
                targets.msg_count,
                targets.msg_bad,
            )
        }
    }
}

/// No source flags: fall back to the config file.
fn apply_config_defaults(sources: &mut RunSources, cfg: &Config) {
    if let Some(path) = &cfg.skyview.playback_file {
        sources.replay = Some((PathBuf::from(path), Protocol::Skyview));
    } else if let Some(path) = cfg
        .skyview_adsb
        .playback_file
        .as_ref()
        .or(cfg.stratux.playback_file.as_ref())
    {
        sources.replay = Some((PathBuf::from(path), Protocol::Gdl90));
    } else {
        sources.skyview_udp = Some(cfg.skyview.udp_port);
        sources.adsb_udp = Some(cfg.skyview_adsb.udp_port);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use efis_core::crc::append_fcs;
    use efis_core::sync::{stuff, FLAG};
    use std::io::Write;
    use std::rc::Rc;

    const TRAFFIC_BODY: [u8; 28] = [
        0x14, 0x00, 0xAB, 0x45, 0x49, 0x1F, 0xEF, 0x15, 0xA8, 0x89, 0x78, 0x0F, 0x09, 0xA9,
        0x07, 0xB0, 0x01, 0x20, 0x01, 0x4E, 0x38, 0x32, 0x35, 0x56, 0x20, 0x20, 0x20, 0x00,
    ];

    fn capture(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    fn traffic_wire() -> Vec<u8> {
        let mut body = TRAFFIC_BODY.to_vec();
        append_fcs(&mut body);
        let mut out = vec![FLAG];
        out.extend(stuff(&body));
        out.push(FLAG);
        out
    }

    fn gdl90_records(records: &InputRecords) -> &Gdl90Records {
        match records {
            InputRecords::Gdl90(r) => r,
            InputRecords::Skyview(_) => panic!("expected GDL-90 records"),
        }
    }

    #[test]
    fn test_each_gdl90_input_owns_its_records() {
        let cfg = Config::default();
        let opts = InputOptions {
            cfg: &cfg,
            no_ahrs: false,
            raw_log: None,
        };
        let busy = capture(&traffic_wire());
        let quiet = capture(&[]);

        let (a, a_records) = gdl90_input(
            "skyview_adsb",
            Box::new(ReplaySource::once(busy.path()).unwrap()),
            false,
            None,
            &opts,
        );
        let (b, b_records) = gdl90_input(
            "stratux",
            Box::new(ReplaySource::once(quiet.path()).unwrap()),
            true,
            None,
            &opts,
        );

        let mut scheduler = Scheduler::new();
        scheduler.add(a);
        scheduler.add(b);
        assert_eq!(scheduler.run(Some(Duration::from_secs(5))), 1);

        let (a_records, b_records) = (gdl90_records(&a_records), gdl90_records(&b_records));
        assert!(!Rc::ptr_eq(&a_records.targets, &b_records.targets));
        assert!(!Rc::ptr_eq(&a_records.gps, &b_records.gps));
        assert_eq!(a_records.targets.borrow().len(), 1);
        assert_eq!(b_records.targets.borrow().len(), 0);
        assert_eq!(b_records.targets.borrow().msg_count, 0);
    }

    #[test]
    fn test_gdl90_input_uses_traffic_config() {
        let mut cfg = Config::default();
        cfg.traffic.timeout_secs = 30.0;
        cfg.traffic.identity_retention = 3.0;
        let opts = InputOptions {
            cfg: &cfg,
            no_ahrs: false,
            raw_log: None,
        };
        let quiet = capture(&[]);
        let (_, records) = gdl90_input(
            "stratux",
            Box::new(ReplaySource::once(quiet.path()).unwrap()),
            true,
            None,
            &opts,
        );
        let targets = gdl90_records(&records).targets.borrow();
        assert_eq!(targets.timeout, 30.0);
        assert_eq!(targets.identity_retention, 3.0);
    }

    #[test]
    fn test_summary_per_input() {
        let records = InputRecords::Skyview(SkyviewRecords::default());
        records_attitude(&records).borrow_mut().msg_count = 4;
        let line = summarize("serial_skyview", &records);
        assert!(line.starts_with("serial_skyview: attitude msgs 4,"), "{line}");
    }

    fn records_attitude(records: &InputRecords) -> &efis_core::Shared<efis_core::AttitudeRecord> {
        match records {
            InputRecords::Skyview(r) => &r.attitude,
            InputRecords::Gdl90(r) => &r.attitude,
        }
    }
}
