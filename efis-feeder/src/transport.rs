//! Byte transports feeding the input modules.
//!
//! Sources:
//! - `UdpSource`:    one datagram per read, short receive timeout
//! - `SerialSource`: POSIX serial device, 8N1, bounded blocking read
//! - `ReplaySource`: capture file read in chunks, rewinds on EOF
//!
//! "No data this tick" is an empty chunk, never an error. An `Err` from
//! `read_chunk` means the source is unusable.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::net::UdpSocket;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};

/// Largest datagram a source is expected to send.
pub const DATAGRAM_LEN: usize = 1024;

/// Receive timeout for UDP sockets.
pub const UDP_TIMEOUT: Duration = Duration::from_millis(10);

/// Per-call timeout for serial reads.
pub const SERIAL_TIMEOUT: Duration = Duration::from_secs(1);

/// Bytes read from a capture file per tick.
pub const REPLAY_CHUNK: usize = 800;

pub trait ByteSource {
    /// Next chunk of bytes. Empty when nothing arrived before the timeout.
    fn read_chunk(&mut self) -> io::Result<Vec<u8>>;

    /// Human-readable origin for log lines.
    fn describe(&self) -> String;

    /// True when each chunk is a self-contained datagram.
    fn is_datagram(&self) -> bool {
        false
    }

    /// True when the source will never produce more bytes.
    fn is_exhausted(&self) -> bool {
        false
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

// ---------------------------------------------------------------------------
// UDP
// ---------------------------------------------------------------------------

pub struct UdpSource {
    socket: UdpSocket,
    port: u16,
    buf: Vec<u8>,
}

impl UdpSource {
    /// Bind `0.0.0.0:port`.
    pub fn bind(port: u16) -> io::Result<Self> {
        Self::bind_addr(&format!("0.0.0.0:{port}"))
    }

    pub fn bind_addr(addr: &str) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(UDP_TIMEOUT))?;
        let port = socket.local_addr()?.port();
        info!("listening for UDP on port {port}");
        Ok(UdpSource {
            socket,
            port,
            buf: vec![0u8; DATAGRAM_LEN],
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl ByteSource for UdpSource {
    fn read_chunk(&mut self) -> io::Result<Vec<u8>> {
        match self.socket.recv_from(&mut self.buf) {
            Ok((n, _)) => Ok(self.buf[..n].to_vec()),
            Err(e) if is_transient(&e) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn describe(&self) -> String {
        format!("udp:{}", self.port)
    }

    fn is_datagram(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Serial
// ---------------------------------------------------------------------------

pub struct SerialSource {
    port: Box<dyn serialport::SerialPort>,
    path: String,
    buf: Vec<u8>,
}

impl SerialSource {
    pub fn open(path: &str, baud: u32) -> io::Result<Self> {
        let port = serialport::new(path, baud)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(SERIAL_TIMEOUT)
            .open()?;
        info!("opened serial port {path} at {baud} baud");
        Ok(SerialSource {
            port,
            path: path.to_string(),
            buf: vec![0u8; 256],
        })
    }
}

impl ByteSource for SerialSource {
    fn read_chunk(&mut self) -> io::Result<Vec<u8>> {
        match self.port.read(&mut self.buf) {
            Ok(n) => Ok(self.buf[..n].to_vec()),
            Err(e) if is_transient(&e) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn describe(&self) -> String {
        format!("serial:{}", self.path)
    }
}

// ---------------------------------------------------------------------------
// File replay
// ---------------------------------------------------------------------------

/// Plays a capture file back in fixed-size chunks.
///
/// In looping mode, EOF seeks back to offset 0 and the same call returns the
/// first chunk of the file again.
pub struct ReplaySource {
    file: File,
    path: PathBuf,
    chunk: usize,
    looping: bool,
    exhausted: bool,
    pub rewinds: u64,
}

impl ReplaySource {
    /// Open for continuous looping playback.
    pub fn looping(path: &Path) -> io::Result<Self> {
        Self::open(path, true)
    }

    /// Open for a single pass; `is_exhausted` turns true at EOF.
    pub fn once(path: &Path) -> io::Result<Self> {
        Self::open(path, false)
    }

    fn open(path: &Path, looping: bool) -> io::Result<Self> {
        let file = File::open(path)?;
        info!("replaying {}", path.display());
        Ok(ReplaySource {
            file,
            path: path.to_path_buf(),
            chunk: REPLAY_CHUNK,
            looping,
            exhausted: false,
            rewinds: 0,
        })
    }

    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }

    fn read_some(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; self.chunk];
        let n = self.file.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }
}

impl ByteSource for ReplaySource {
    fn read_chunk(&mut self) -> io::Result<Vec<u8>> {
        if self.exhausted {
            return Ok(Vec::new());
        }
        let data = self.read_some()?;
        if !data.is_empty() {
            return Ok(data);
        }
        if !self.looping {
            self.exhausted = true;
            return Ok(data);
        }
        self.file.seek(SeekFrom::Start(0))?;
        self.rewinds += 1;
        debug!("rewinding {} (pass {})", self.path.display(), self.rewinds + 1);
        // Empty file stays empty.
        self.read_some()
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
