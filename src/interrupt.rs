//! Polling interrupt controller
//!
//! Nothing is delivered asynchronously: the CPU calls [`InterruptController::poll`]
//! once per cycle while interrupts are enabled. Two sources are checked,
//! the timer first:
//!
//! 1. Timer: fires once the quantum has elapsed since the last epoch, then
//!    stays disarmed until [`InterruptController::rearm_timer`] (issued by `mret`).
//! 2. Keyboard: each key event queued on the channel fires one interrupt.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;
use std::sync::mpsc::TryRecvError;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tracing::debug;

/// Millisecond time source
pub trait Clock: Send {
    /// Milliseconds since an arbitrary fixed origin
    fn now_ms(&self) -> u64;
}

/// Wall clock
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Clock advanced by hand; clones share the same time
#[derive(Clone, Default)]
pub struct ManualClock {
    ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn advance(&self, ms: u64) {
        self.ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.ms.load(Ordering::SeqCst)
    }
}

/// Sending half of the key event queue
pub type KeySender = Sender<u8>;

/// Interrupt cause
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cause {
    Timer,
    /// Key press carrying its key data
    Key(u8),
}

impl Cause {
    pub const TIMER_CODE: i32 = 1;
    /// Added to key data so key causes never collide with the timer
    pub const KEY_OFFSET: i32 = 2;

    /// Value stored in `mcause`
    pub fn code(&self) -> i32 {
        match self {
            Cause::Timer => Self::TIMER_CODE,
            Cause::Key(data) => *data as i32 + Self::KEY_OFFSET,
        }
    }
}

pub struct InterruptController {
    clock: Box<dyn Clock>,
    quantum_ms: u64,
    epoch_ms: u64,
    timer_armed: bool,
    keys: Receiver<u8>,
}

impl InterruptController {
    /// Returns the controller and the sender used to queue key events
    pub fn make(clock: Box<dyn Clock>, quantum: Duration) -> (Self, KeySender) {
        let (sender, keys) = mpsc::channel();
        let epoch_ms = clock.now_ms();
        let controller = Self {
            clock,
            quantum_ms: quantum.as_millis() as u64,
            epoch_ms,
            timer_armed: true,
            keys,
        };
        (controller, sender)
    }

    /// Checks both sources, timer first
    pub fn poll(&mut self) -> Option<Cause> {
        if self.timer_armed {
            let now = self.clock.now_ms();
            if now.saturating_sub(self.epoch_ms) >= self.quantum_ms {
                self.timer_armed = false;
                self.epoch_ms = now;
                debug!(now, "timer interrupt");
                return Some(Cause::Timer);
            }
        }

        match self.keys.try_recv() {
            Ok(data) => {
                debug!(data, "key interrupt");
                Some(Cause::Key(data))
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Starts a new timer epoch without changing the armed state
    pub fn reset_epoch(&mut self) {
        self.epoch_ms = self.clock.now_ms();
    }

    /// Re-enables the timer and starts a new epoch
    pub fn rearm_timer(&mut self) {
        self.timer_armed = true;
        self.reset_epoch();
    }

    pub fn timer_armed(&self) -> bool {
        self.timer_armed
    }
}
