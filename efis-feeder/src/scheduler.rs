//! Single-threaded poll loop over the input modules.
//!
//! One `read_tick` per open input per pass. The exit flag is shared with
//! every input and checked at the top of each tick, so setting it from
//! another thread (or a signal handler) winds everything down within one
//! pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::input::Input;

/// Sleep between passes when no input produced a frame.
pub const IDLE_SLEEP: Duration = Duration::from_millis(5);

pub struct Scheduler {
    inputs: Vec<Box<dyn Input>>,
    exit: Arc<AtomicBool>,
    pub passes: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            inputs: Vec::new(),
            exit: Arc::new(AtomicBool::new(false)),
            passes: 0,
        }
    }

    pub fn add(&mut self, input: Box<dyn Input>) {
        info!("input {} registered", input.name());
        self.inputs.push(input);
    }

    /// Handle for requesting shutdown.
    pub fn exit_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.exit)
    }

    pub fn inputs(&self) -> &[Box<dyn Input>] {
        &self.inputs
    }

    /// True while at least one input is still open.
    pub fn any_open(&self) -> bool {
        self.inputs.iter().any(|i| !i.is_closed())
    }

    /// Tick every open input once. Returns frames decoded this pass.
    pub fn run_pass(&mut self) -> usize {
        self.passes += 1;
        let mut decoded = 0;
        for input in self.inputs.iter_mut().filter(|i| !i.is_closed()) {
            decoded += input.read_tick(&self.exit);
            if input.is_fatal() {
                warn!("input {} closed after a fatal error", input.name());
            }
        }
        decoded
    }

    /// Poll until the exit flag is set, every input has closed, or the
    /// optional time limit runs out.
    pub fn run(&mut self, limit: Option<Duration>) -> u64 {
        let start = Instant::now();
        let mut total = 0u64;
        while !self.exit.load(Ordering::Relaxed) && self.any_open() {
            if limit.is_some_and(|l| start.elapsed() >= l) {
                info!("time limit reached");
                self.exit.store(true, Ordering::Relaxed);
                break;
            }
            let decoded = self.run_pass();
            total += decoded as u64;
            if decoded == 0 {
                std::thread::sleep(IDLE_SLEEP);
            }
        }
        self.close_all();
        total
    }

    /// Close every input. Inputs that already closed themselves still get
    /// the call so their raw logs are flushed.
    pub fn close_all(&mut self) {
        for input in self.inputs.iter_mut() {
            input.close();
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
