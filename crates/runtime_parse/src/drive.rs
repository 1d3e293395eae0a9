//! Pumping a coordinator from a plain thread.
//!
//! Embedders with their own event loop call `Coordinator::pump` from it and
//! re-pump on the wake hook. `Driver` does the same with a condvar, for
//! tools and tests.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::coordinator::{Coordinator, PumpStatus};
use crate::host::WakeHook;

/// Sticky wake flag shared with the worker thread.
#[derive(Clone, Default)]
pub struct WakeSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        let (flag, condvar) = &*self.inner;
        match flag.lock() {
            Ok(mut woken) => *woken = true,
            Err(poisoned) => *poisoned.into_inner() = true,
        }
        condvar.notify_all();
    }

    pub fn hook(&self) -> WakeHook {
        let signal = self.clone();
        Arc::new(move || signal.notify())
    }

    /// Wait for a notification or `timeout`, and clear the flag. Returns
    /// whether a notification arrived.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let Ok(guard) = flag.lock() else {
            return false;
        };
        match condvar.wait_timeout_while(guard, timeout, |woken| !*woken) {
            Ok((mut woken, _)) => std::mem::replace(&mut *woken, false),
            Err(_) => false,
        }
    }
}

pub struct Driver {
    signal: WakeSignal,
    poll: Duration,
    deadline: Duration,
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver {
    pub fn new() -> Self {
        Self {
            signal: WakeSignal::new(),
            poll: Duration::from_millis(5),
            deadline: Duration::from_secs(30),
        }
    }

    /// Give up waiting for the worker after `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Hook to pass in `Collaborators::wake`.
    pub fn wake_hook(&self) -> WakeHook {
        self.signal.hook()
    }

    /// Pump until the coordinator blocks on something other than its
    /// budget or the worker.
    pub fn run_until_blocked(&self, coordinator: &mut Coordinator) -> PumpStatus {
        let started = Instant::now();
        loop {
            match coordinator.pump() {
                PumpStatus::Yielded => {}
                PumpStatus::AwaitingChunks if started.elapsed() < self.deadline => {
                    self.signal.wait(self.poll);
                }
                status => return status,
            }
        }
    }

    /// Deliver `chunks` as separate network reads, then end of stream.
    pub fn parse_chunks<'a>(
        &self,
        coordinator: &mut Coordinator,
        chunks: impl IntoIterator<Item = &'a str>,
    ) -> PumpStatus {
        for chunk in chunks {
            coordinator.append_input(chunk);
            match self.run_until_blocked(coordinator) {
                PumpStatus::NeedsInput => {}
                status => return status,
            }
        }
        coordinator.mark_end_of_stream();
        self.run_until_blocked(coordinator)
    }
}
