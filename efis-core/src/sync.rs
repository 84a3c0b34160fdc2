//! Frame synchronization for streaming avionics data.
//!
//! Two framing styles:
//! - Delimited (GDL-90 and its Stratux/ForeFlight extensions): frames are
//!   bounded by `0x7E` flag bytes. Datagrams are split on the `~~` separator;
//!   byte streams go through the push-based [`DelimitedSync`].
//! - Typed fixed-length (Dynon SkyView): `'!'`, then a type byte that selects
//!   the total frame length, handled by [`SkyviewSync`].
//!
//! Both synchronizers hold partial frames across calls, so a frame split over
//! two reads is reassembled. Nothing here blocks or does I/O.

use std::mem;

use crate::skyview;

/// GDL-90 flag byte (`'~'`).
pub const FLAG: u8 = 0x7E;

/// GDL-90 control-escape byte.
pub const ESCAPE: u8 = 0x7D;

/// SkyView start-of-frame byte.
pub const SKYVIEW_START: u8 = b'!';

/// Longest delimited frame accepted before the accumulator is discarded.
pub const MAX_FRAME_LEN: usize = 1024;

/// Segments of this length or shorter carry no message.
const MIN_SEGMENT_LEN: usize = 3;

// ---------------------------------------------------------------------------
// Datagram splitting
// ---------------------------------------------------------------------------

/// Split one datagram into self-delimited GDL-90 frames.
///
/// A datagram carries one or more `~...~` frames back to back, so frames are
/// separated by `~~`. Each segment gets its missing leading/trailing flag
/// restored; degenerate segments (3 bytes or fewer) are dropped.
pub fn split_delimited(datagram: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i + 1 < datagram.len() {
        if datagram[i] == FLAG && datagram[i + 1] == FLAG {
            push_segment(&datagram[start..i], &mut frames);
            i += 2;
            start = i;
        } else {
            i += 1;
        }
    }
    push_segment(&datagram[start..], &mut frames);

    frames
}

fn push_segment(segment: &[u8], frames: &mut Vec<Vec<u8>>) {
    if segment.len() <= MIN_SEGMENT_LEN {
        return;
    }
    let mut frame = Vec::with_capacity(segment.len() + 2);
    if segment[0] != FLAG {
        frame.push(FLAG);
    }
    frame.extend_from_slice(segment);
    if segment[segment.len() - 1] != FLAG {
        frame.push(FLAG);
    }
    frames.push(frame);
}

/// Undo GDL-90 byte stuffing: `0x7D x` becomes `x ^ 0x20`.
///
/// Flag bytes pass through untouched. A trailing lone escape is dropped.
pub fn unstuff(frame: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.len());
    let mut escaped = false;
    for &b in frame {
        if escaped {
            out.push(b ^ 0x20);
            escaped = false;
        } else if b == ESCAPE {
            escaped = true;
        } else {
            out.push(b);
        }
    }
    out
}

/// Apply GDL-90 byte stuffing to a message body (no flags).
pub fn stuff(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 4);
    for &b in body {
        if b == FLAG || b == ESCAPE {
            out.push(ESCAPE);
            out.push(b ^ 0x20);
        } else {
            out.push(b);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Delimited stream synchronizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DelimitedState {
    SeekingMarker,
    Accumulating,
}

/// Push-based GDL-90 synchronizer for byte streams (serial, replay files).
///
/// A closing flag also opens the next frame, so both `~A~~B~` and the
/// shared-flag form `~A~B~` yield two frames.
#[derive(Debug)]
pub struct DelimitedSync {
    state: DelimitedState,
    buf: Vec<u8>,
    /// Partial or oversized frames thrown away.
    pub dropped: u64,
}

impl DelimitedSync {
    pub fn new() -> Self {
        DelimitedSync {
            state: DelimitedState::SeekingMarker,
            buf: Vec::with_capacity(64),
            dropped: 0,
        }
    }

    /// Feed one byte. Returns a complete `~...~` frame when one closes.
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8>> {
        match self.state {
            DelimitedState::SeekingMarker => {
                if byte == FLAG {
                    self.buf.clear();
                    self.buf.push(FLAG);
                    self.state = DelimitedState::Accumulating;
                }
                None
            }
            DelimitedState::Accumulating => {
                if byte != FLAG {
                    self.buf.push(byte);
                    if self.buf.len() > MAX_FRAME_LEN {
                        self.dropped += 1;
                        self.reset();
                    }
                    return None;
                }
                // Back-to-back flags: the second one opens the frame.
                if self.buf.len() == 1 {
                    return None;
                }
                self.buf.push(FLAG);
                let frame = mem::replace(&mut self.buf, vec![FLAG]);
                if frame.len() - 2 > MIN_SEGMENT_LEN {
                    Some(frame)
                } else {
                    self.dropped += 1;
                    None
                }
            }
        }
    }

    /// Feed a chunk, returning every frame it completes.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }

    /// Forget any partial frame.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = DelimitedState::SeekingMarker;
    }
}

impl Default for DelimitedSync {
    fn default() -> Self {
        DelimitedSync::new()
    }
}

// ---------------------------------------------------------------------------
// SkyView typed fixed-length synchronizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkyviewState {
    SeekingMarker,
    AwaitingType,
    Accumulating { total: usize },
}

/// Push-based synchronizer for Dynon SkyView `!` frames.
///
/// An unknown type byte drops the candidate and resumes the marker search.
/// A `'!'` seen mid-frame means bytes were lost: the partial frame is dropped
/// and the new marker starts the next one.
#[derive(Debug)]
pub struct SkyviewSync {
    state: SkyviewState,
    buf: Vec<u8>,
    /// Frames abandoned (unknown type or interrupted by a new marker).
    pub dropped: u64,
}

impl SkyviewSync {
    pub fn new() -> Self {
        SkyviewSync {
            state: SkyviewState::SeekingMarker,
            buf: Vec::with_capacity(skyview::MAX_FRAME_LEN),
            dropped: 0,
        }
    }

    /// Feed one byte. Returns a complete frame once its length is satisfied.
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8>> {
        match self.state {
            SkyviewState::SeekingMarker => {
                if byte == SKYVIEW_START {
                    self.start_frame();
                }
                None
            }
            SkyviewState::AwaitingType => {
                match skyview::frame_len(byte) {
                    Some(total) => {
                        self.buf.push(byte);
                        self.state = SkyviewState::Accumulating { total };
                    }
                    None => {
                        self.dropped += 1;
                        if byte == SKYVIEW_START {
                            self.start_frame();
                        } else {
                            self.reset();
                        }
                    }
                }
                None
            }
            SkyviewState::Accumulating { total } => {
                if byte == SKYVIEW_START {
                    self.dropped += 1;
                    self.start_frame();
                    return None;
                }
                self.buf.push(byte);
                if self.buf.len() < total {
                    return None;
                }
                self.state = SkyviewState::SeekingMarker;
                Some(mem::take(&mut self.buf))
            }
        }
    }

    /// Feed a chunk, returning every frame it completes.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }

    /// Forget any partial frame.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = SkyviewState::SeekingMarker;
    }

    fn start_frame(&mut self) {
        self.buf.clear();
        self.buf.push(SKYVIEW_START);
        self.state = SkyviewState::AwaitingType;
    }
}

impl Default for SkyviewSync {
    fn default() -> Self {
        SkyviewSync::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
