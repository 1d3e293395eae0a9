//! Budget-driven yielding for the coordinator's pump loop.

use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::host::WakeHook;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Tokens committed per pump session before yielding.
    pub token_budget: usize,
    /// Wall-clock budget per pump session. `0` disables the time check.
    pub time_budget_ms: u64,
    /// Stop taking chunks from the worker while this many tokens are
    /// buffered.
    pub max_buffered_tokens: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            token_budget: 1024,
            time_budget_ms: 8,
            max_buffered_tokens: 8192,
        }
    }
}

/// One uninterrupted run of the pump loop.
#[derive(Debug)]
pub struct PumpSession {
    started: Instant,
    tokens: usize,
}

impl PumpSession {
    pub fn record(&mut self, tokens: usize) {
        self.tokens = self.tokens.saturating_add(tokens);
    }

    pub fn tokens(&self) -> usize {
        self.tokens
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

pub struct Scheduler {
    config: SchedulerConfig,
    suspended: bool,
    wake: Option<WakeHook>,
    yields: u64,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, wake: Option<WakeHook>) -> Self {
        Self {
            config,
            suspended: false,
            wake,
            yields: 0,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn begin_session(&self) -> PumpSession {
        PumpSession {
            started: Instant::now(),
            tokens: 0,
        }
    }

    /// Whether the pump should return to the embedder now. `urgent` asks
    /// for an early yield (a blocking script is next) once the session has
    /// done some work. A yield schedules a resumption through the wake hook
    /// unless the scheduler is suspended.
    pub fn yield_if_needed(&mut self, session: &mut PumpSession, urgent: bool) -> bool {
        #[cfg_attr(not(any(test, feature = "debug-stats")), allow(unused_variables))]
        let reason = if self.suspended {
            "suspended"
        } else if urgent && session.tokens > 0 {
            "urgent"
        } else if session.tokens >= self.config.token_budget {
            "token budget"
        } else if self.config.time_budget_ms > 0
            && session.elapsed() >= Duration::from_millis(self.config.time_budget_ms)
        {
            "time budget"
        } else {
            return false;
        };
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(
            target: "parse.scheduler",
            "yield ({reason}) after {} tokens in {:?}",
            session.tokens,
            session.elapsed()
        );
        self.yields += 1;
        if !self.suspended {
            self.schedule_resumption();
        }
        true
    }

    /// Stop draining buffered chunks until `resume`.
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        if std::mem::take(&mut self.suspended) {
            self.schedule_resumption();
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Backpressure: take more worker output only below the buffer limit.
    pub fn should_accept(&self, buffered_tokens: usize) -> bool {
        buffered_tokens < self.config.max_buffered_tokens
    }

    pub fn yields(&self) -> u64 {
        self.yields
    }

    pub fn schedule_resumption(&self) {
        if let Some(wake) = &self.wake {
            wake();
        }
    }
}
