//! efis-feeder: I/O layer for the EFIS inputs.
//!
//! Transports (UDP, serial, file replay), the per-source input modules that
//! own their telemetry records, and the poll scheduler that drives them.

pub mod input;
pub mod scheduler;
pub mod transport;

pub use input::{EventHandler, Gdl90Input, Gdl90Records, Input, SkyviewInput, SkyviewRecords};
pub use scheduler::Scheduler;
pub use transport::{ByteSource, ReplaySource, SerialSource, UdpSource};
