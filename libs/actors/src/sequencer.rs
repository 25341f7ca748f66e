//! Process-wide envelope sequence numbers
//!
//! Every envelope is stamped with a number drawn from [`Sequencer::global`].
//! Numbers are unique and strictly increasing for the life of the process,
//! which gives each mailbox a total order to dequeue by.

use std::sync::atomic::{AtomicU64, Ordering};

static GLOBAL: Sequencer = Sequencer::starting_at(0);

/// Monotonic counter handing out envelope sequence numbers
#[derive(Debug)]
pub struct Sequencer {
    last: AtomicU64,
}

impl Sequencer {
    /// Counter whose first `next()` returns `start + 1`
    pub const fn starting_at(start: u64) -> Self {
        Self {
            last: AtomicU64::new(start),
        }
    }

    /// The counter shared by every context in the process
    pub fn global() -> &'static Sequencer {
        &GLOBAL
    }

    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Last number handed out
    pub fn current(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}
