//! efis-core: Pure decode + tracking library for EFIS and ADS-B data sources.
//!
//! No sockets or devices, just algorithms and the config file. Shared by
//! `efis-feeder` (transports, input modules, scheduler) and `efis-hud`
//! (registry, traffic table, snapshots).

pub mod ahrs;
pub mod codec;
pub mod config;
pub mod crc;
pub mod gdl90;
pub mod identity;
pub mod records;
pub mod schema;
pub mod skyview;
pub mod sync;
pub mod targets;
pub mod types;

// Re-export commonly used types at crate root
pub use gdl90::{Gdl90Frame, Gdl90Message, TrafficReport};
pub use identity::{AircraftRecord, AirlineTable, IdentityLookup};
pub use records::*;
pub use skyview::SkyviewMessage;
pub use sync::{DelimitedSync, SkyviewSync};
pub use targets::{Target, TargetEvent, TargetTable};
pub use types::*;
