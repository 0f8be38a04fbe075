//! rsync output parsing.
//!
//! rsync run with `-P` prints two kinds of progress lines:
//!
//! ```text
//! 1234 files...                                   <- building the file list
//!   1,024 100%  1.2MB/s  0:00:00 (xfr#17, to-chk=83/100)   <- transferring
//! ```
//!
//! [`RsyncProgress`] turns those into discrete events on a [`ProgressSink`]:
//! one tick per 100 files counted (or transferred), and a single
//! `counting_finished` announcement when the output switches from the first
//! shape to the second.  It knows nothing about processes so it can be fed
//! canned lines in tests.

use std::sync::LazyLock;

use regex::Regex;

/// Files represented by one tick.
pub const FILES_PER_TICK: u64 = 100;

static COUNTING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\sfiles\.\.\.").expect("valid regex"));

static TRANSFER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"xfe?r#(\d+), (?:to|ir)-che?c?k=(\d+)/(\d+)").expect("valid regex")
});

/// Receives progress events.
pub trait ProgressSink {
    /// Another [`FILES_PER_TICK`] files were counted or transferred.
    fn tick(&mut self);

    /// The file list is complete and transfers are starting.  Called at most
    /// once per parser.
    fn counting_finished(&mut self, found: u64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Counting,
    Syncing,
}

/// Line-oriented state machine over rsync's stdout.
#[derive(Debug)]
pub struct RsyncProgress {
    phase: Phase,
    count: u64,
}

impl Default for RsyncProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl RsyncProgress {
    pub const fn new() -> Self {
        Self {
            phase: Phase::Counting,
            count: 0,
        }
    }

    /// Files counted so far, or files transferred once syncing started.
    pub const fn count(&self) -> u64 {
        self.count
    }

    pub fn is_syncing(&self) -> bool {
        self.phase == Phase::Syncing
    }

    /// Feed one line (or `\r`-delimited fragment) of output.
    pub fn feed(&mut self, line: &str, sink: &mut dyn ProgressSink) {
        if let Some(c) = COUNTING.captures(line) {
            let Ok(n) = c[1].parse::<u64>() else { return };
            if self.phase == Phase::Counting {
                self.advance_to(n, sink);
            }
        } else if let Some(c) = TRANSFER.captures(line) {
            let Ok(n) = c[1].parse::<u64>() else { return };
            if self.phase == Phase::Counting {
                self.phase = Phase::Syncing;
                sink.counting_finished(self.count);
                self.count = 0;
            }
            self.advance_to(n, sink);
        }
    }

    /// Returns `true` if any transfer happened, `false` when rsync only
    /// counted (everything was already up to date).
    pub fn finish(self) -> bool {
        self.is_syncing()
    }

    fn advance_to(&mut self, n: u64, sink: &mut dyn ProgressSink) {
        let ticks = (n / FILES_PER_TICK).saturating_sub(self.count / FILES_PER_TICK);
        for _ in 0..ticks {
            sink.tick();
        }
        self.count = self.count.max(n);
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
