//! efis-hud: Operator CLI for the EFIS data layer.
//!
//! - `traffic`:  live or replayed GDL-90 traffic as a table
//! - `registry`: manage the SQLite aircraft / airline registry
//! - `snapshot`: JSON dump of telemetry records after replaying a capture

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{Cell, Table};
use log::warn;

use efis_core::config::{self, TrafficConfig};
use efis_core::identity::AircraftRecord;
use efis_core::records::shared;
use efis_core::targets::{Target, TargetTable};
use efis_core::types::address_to_string;
use efis_feeder::input::now_secs;
use efis_feeder::{
    ByteSource, Gdl90Input, Gdl90Records, ReplaySource, Scheduler, SkyviewInput, SkyviewRecords,
    UdpSource,
};

mod registry;

use registry::Registry;

#[derive(Parser)]
#[command(name = "efis-hud", version, about = "EFIS traffic, registry, and telemetry tools")]
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
    /// Show traffic targets from a GDL-90 capture or UDP port
    Traffic {
        /// GDL-90 capture file, decoded once
        #[arg(long, conflicts_with = "udp", required_unless_present = "udp")]
        file: Option<PathBuf>,

        /// Listen for GDL-90 on this UDP port
        #[arg(long)]
        udp: Option<u16>,

        /// How long to listen (UDP only)
        #[arg(long, default_value = "10")]
        seconds: f64,

        /// SQLite registry path
        #[arg(long, env = "EFIS_REGISTRY")]
        registry: Option<String>,
    },

    /// Manage the aircraft registry
    Registry {
        /// SQLite registry path
        #[arg(long, env = "EFIS_REGISTRY")]
        registry: Option<String>,

        #[command(subcommand)]
        action: RegistryAction,
    },

    /// Replay a capture once and print the resulting records as JSON
    Snapshot {
        #[arg(long)]
        file: PathBuf,

        #[arg(long, value_enum)]
        protocol: Protocol,
    },
}

#[derive(Subcommand)]
enum RegistryAction {
    /// Add or replace an aircraft
    Add {
        n_number: String,

        #[arg(long)]
        manufacturer: Option<String>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        year: Option<u16>,

        #[arg(long)]
        owner: Option<String>,
    },
    /// Look up an aircraft by N-number
    Lookup { n_number: String },
    /// Look up a flight number's operator, or store a prefix with --name
    Airline {
        /// Flight number (`DAL123`) or three-letter prefix when adding
        callsign: String,

        #[arg(long)]
        name: Option<String>,
    },
    /// Show what was recorded for a transponder address
    Sighting {
        /// 6-digit hex address
        address: String,
    },
    /// Show registry statistics
    Stats,
}

fn main() {
    let cli = Cli::parse();
    let default = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();

    let cfg = config::load_config();

    match cli.command {
        Commands::Traffic {
            file,
            udp,
            seconds,
            registry,
        } => {
            let db_path = registry.unwrap_or(cfg.registry.path);
            cmd_traffic(file, udp, seconds, &db_path, &cfg.traffic)
        }
        Commands::Registry { registry, action } => {
            let db_path = registry.unwrap_or(cfg.registry.path);
            cmd_registry(&db_path, action)
        }
        Commands::Snapshot { file, protocol } => cmd_snapshot(&file, protocol),
    }
}

fn open_registry(db_path: &str) -> Registry {
    Registry::open(db_path).unwrap_or_else(|e| {
        eprintln!("Error opening registry {db_path}: {e}");
        std::process::exit(1);
    })
}

fn open_source<T>(what: &str, result: std::io::Result<T>) -> T {
    result.unwrap_or_else(|e| {
        eprintln!("Error opening {what}: {e}");
        std::process::exit(1);
    })
}

// ---------------------------------------------------------------------------
// traffic
// ---------------------------------------------------------------------------

fn cmd_traffic(
    file: Option<PathBuf>,
    udp: Option<u16>,
    seconds: f64,
    db_path: &str,
    traffic: &TrafficConfig,
) {
    let reg = Rc::new(open_registry(db_path));

    let (source, limit): (Box<dyn ByteSource>, Option<Duration>) = match (file, udp) {
        (Some(path), _) => (
            Box::new(open_source("capture", ReplaySource::once(&path))),
            None,
        ),
        (None, Some(port)) => (
            Box::new(open_source("udp socket", UdpSource::bind(port))),
            Some(Duration::from_secs_f64(seconds.max(0.0))),
        ),
        (None, None) => {
            eprintln!("Error: give --file or --udp");
            std::process::exit(2);
        }
    };

    let mut table = TargetTable::new(Box::new(Rc::clone(&reg)), traffic.timeout_secs);
    table.identity_retention = traffic.identity_retention;
    let records = Gdl90Records {
        targets: shared(table),
        ..Default::default()
    };
    let sink = Rc::clone(&reg);
    let input = Gdl90Input::new("traffic", source, records.clone()).with_event_handler(Box::new(
        move |event| {
            if let Err(e) = sink.record_events(std::slice::from_ref(event)) {
                warn!("cannot record sighting: {e}");
            }
        },
    ));

    let mut scheduler = Scheduler::new();
    scheduler.add(Box::new(input));
    let frames = scheduler.run(limit);

    let table = records.targets.borrow();
    let active = table.get_active(now_secs());
    println!();
    println!(
        "Frames: {frames} decoded, {} traffic reports, {} bad, {} targets",
        table.msg_count,
        table.msg_bad,
        active.len()
    );
    if let (Some(lat), Some(lon)) = (table.src_lat, table.src_lon) {
        println!("Ownship: {lat:.4}, {lon:.4}");
    }
    println!();

    if !active.is_empty() {
        println!("{}", traffic_table(&active));
    }
}

fn dash<T>(value: Option<T>, fmt: impl Fn(T) -> String) -> String {
    value.map(fmt).unwrap_or("-".into())
}

fn traffic_table(active: &[&Target]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Address", "N-Number", "Flight", "Airline", "Aircraft", "Alt (ft)", "Speed (mph)", "Trk",
        "VS (fpm)", "Dist (mi)", "Brg", "Msgs",
    ]);

    for t in active {
        let id = &t.identity;
        table.add_row(vec![
            Cell::new(address_to_string(t.address)),
            Cell::new(id.n_number.as_deref().unwrap_or("-")),
            Cell::new(id.flight_number.as_deref().unwrap_or("-")),
            Cell::new(id.airline.as_deref().unwrap_or("-")),
            Cell::new(dash(
                id.aircraft.as_ref().and_then(|a| a.description()),
                |d| d,
            )),
            Cell::new(dash(t.altitude, |a| a.to_string())),
            Cell::new(dash(t.speed_mph(), |s| format!("{s:.0}"))),
            Cell::new(dash(t.track, |h| format!("{h:.0}"))),
            Cell::new(dash(t.vspeed, |v| format!("{v:+}"))),
            Cell::new(dash(t.dist, |d| format!("{d:.1}"))),
            Cell::new(dash(t.bearing, |b| format!("{b:.0}"))),
            Cell::new(t.msg_count),
        ]);
    }

    table
}

// ---------------------------------------------------------------------------
// registry
// ---------------------------------------------------------------------------

fn cmd_registry(db_path: &str, action: RegistryAction) {
    let reg = open_registry(db_path);

    let result = match action {
        RegistryAction::Add {
            n_number,
            manufacturer,
            model,
            year,
            owner,
        } => {
            let rec = AircraftRecord {
                n_number,
                manufacturer,
                model,
                year,
                owner,
            };
            reg.add_aircraft(&rec)
                .map(|_| println!("Added {}", rec.n_number.to_ascii_uppercase()))
        }
        RegistryAction::Lookup { n_number } => reg.get_aircraft(&n_number).map(|rec| match rec {
            Some(rec) => {
                println!("{}", rec.n_number);
                println!("  Aircraft: {}", rec.description().unwrap_or("-".into()));
                println!("  Year:     {}", dash(rec.year, |y| y.to_string()));
                println!("  Owner:    {}", rec.owner.as_deref().unwrap_or("-"));
            }
            None => println!("{n_number}: not in registry"),
        }),
        RegistryAction::Airline { callsign, name } => match name {
            Some(name) => reg
                .add_airline(&callsign, &name)
                .map(|_| println!("Added {} = {name}", callsign.to_ascii_uppercase())),
            None => reg.airline_name(&callsign).map(|found| {
                println!("{callsign}: {}", found.as_deref().unwrap_or("unknown operator"))
            }),
        },
        RegistryAction::Sighting { address } => reg.get_sighting(&address).map(|row| match row {
            Some(row) => {
                println!("{}", row.address);
                println!("  N-number: {}", row.n_number.as_deref().unwrap_or("-"));
                println!(
                    "  Flight:   {} {}",
                    row.flight_number.as_deref().unwrap_or("-"),
                    row.airline.as_deref().unwrap_or("")
                );
                println!("  Seen:     {:.0} .. {:.0}", row.first_seen, row.last_seen);
            }
            None => println!("{address}: never seen"),
        }),
        RegistryAction::Stats => {
            let stats = reg.stats();
            println!();
            println!("Registry: {db_path}");
            println!();
            println!("  Aircraft:   {}", stats.aircraft);
            println!("  Airlines:   {}", stats.airlines);
            println!("  Sightings:  {}", stats.sightings);
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// snapshot
// ---------------------------------------------------------------------------

fn cmd_snapshot(file: &Path, protocol: Protocol) {
    let source = Box::new(open_source("capture", ReplaySource::once(file)));
    let mut scheduler = Scheduler::new();

    let snapshot = match protocol {
        Protocol::Skyview => {
            let records = SkyviewRecords::default();
            scheduler.add(Box::new(SkyviewInput::new("skyview", source, records.clone())));
            scheduler.run(None);
            let value = serde_json::json!({
                "attitude": &*records.attitude.borrow(),
                "air": &*records.air.borrow(),
                "nav": &*records.nav.borrow(),
                "engine": &*records.engine.borrow(),
                "fuel": &*records.fuel.borrow(),
                "gps": &*records.gps.borrow(),
            });
            value
        }
        Protocol::Gdl90 => {
            let records = Gdl90Records::default();
            scheduler.add(Box::new(Gdl90Input::new("gdl90", source, records.clone())));
            scheduler.run(None);
            let targets = records.targets.borrow();
            let value = serde_json::json!({
                "attitude": &*records.attitude.borrow(),
                "air": &*records.air.borrow(),
                "gps": &*records.gps.borrow(),
                "device": &*records.device.borrow(),
                "targets": targets.get_active(now_secs()),
            });
            value
        }
    };

    match serde_json::to_string_pretty(&snapshot) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
