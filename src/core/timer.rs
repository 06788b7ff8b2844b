//! Frame countdowns for deferred jobs.

use crate::util::ids::JobId;

/// What the timer should do with a countdown on this update pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerGate {
    /// Decrement the countdown.
    Advance,
    /// Leave the countdown untouched (job paused or excluded by global pause).
    Hold,
    /// Forget the countdown (job cancelled or gone).
    Discard,
}

#[derive(Debug)]
struct Countdown {
    id: JobId,
    remaining: u32,
}

/// Countdowns for `DeferredUpdate` jobs, kept in registration order.
#[derive(Debug, Default)]
pub(crate) struct DeferredTimer {
    countdowns: Vec<Countdown>,
}

impl DeferredTimer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Start a countdown of `frames` update passes.
    pub(crate) fn arm(&mut self, id: JobId, frames: u32) {
        self.countdowns.push(Countdown {
            id,
            remaining: frames,
        });
    }

    /// Advance every countdown by one update pass and return the jobs that are
    /// now due, in registration order.
    ///
    /// A countdown at 0 (armed with zero delay) fires on its first advance.
    pub(crate) fn advance<F>(&mut self, mut gate: F) -> Vec<JobId>
    where
        F: FnMut(JobId) -> TimerGate,
    {
        let mut fired = Vec::new();
        self.countdowns.retain_mut(|countdown| match gate(countdown.id) {
            TimerGate::Discard => false,
            TimerGate::Hold => true,
            TimerGate::Advance => {
                countdown.remaining = countdown.remaining.saturating_sub(1);
                if countdown.remaining == 0 {
                    fired.push(countdown.id);
                    false
                } else {
                    true
                }
            }
        });
        fired
    }

    /// Frames left for a job, if it is still counting down.
    pub(crate) fn remaining(&self, id: JobId) -> Option<u32> {
        self.countdowns
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.remaining)
    }

    pub(crate) fn clear(&mut self) {
        self.countdowns.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.countdowns.len()
    }
}
