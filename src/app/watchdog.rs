//! Cooperative wall-clock budget.
//!
//! Nothing here preempts a running command. Device operations call [`Deadline::check`] before
//! they start and cap their own waits with [`Deadline::cap`], so an expired budget surfaces as
//! an `ERR_WATCHDOG` error at the next suspension point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::app::error::AppError;
use crate::app::interrupt::interrupt_flag;

#[derive(Debug, Clone)]
pub struct Deadline {
    scope: &'static str,
    budget: Option<Duration>,
    expires_at: Option<Instant>,
    interrupt: &'static AtomicBool,
}

impl Deadline {
    pub fn start(scope: &'static str, budget: Duration) -> Self {
        Self {
            scope,
            budget: Some(budget),
            expires_at: Instant::now().checked_add(budget),
            interrupt: interrupt_flag(),
        }
    }

    /// Only interruption ends an unbounded deadline.
    pub fn unbounded(scope: &'static str) -> Self {
        Self {
            scope,
            budget: None,
            expires_at: None,
            interrupt: interrupt_flag(),
        }
    }

    /// Watches `flag` instead of the process-wide signal flag.
    pub fn with_interrupt(mut self, flag: &'static AtomicBool) -> Self {
        self.interrupt = flag;
        self
    }

    /// A nested budget that never outlives its parent.
    pub fn child(&self, scope: &'static str, budget: Duration) -> Self {
        let own = Instant::now().checked_add(budget);
        let expires_at = match (own, self.expires_at) {
            (Some(own), Some(parent)) => Some(own.min(parent)),
            (own, parent) => own.or(parent),
        };
        Self {
            scope,
            budget: Some(budget),
            expires_at,
            interrupt: self.interrupt,
        }
    }

    pub fn scope(&self) -> &'static str {
        self.scope
    }

    /// `None` for an unbounded deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires_at| expires_at.saturating_duration_since(Instant::now()))
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }

    pub fn cap(&self, wait: Duration) -> Duration {
        match self.remaining() {
            Some(left) => wait.min(left),
            None => wait,
        }
    }

    pub fn check(&self, trace_id: &str) -> Result<(), AppError> {
        if self.is_interrupted() {
            return Err(AppError::interrupted(
                format!("{} interrupted by signal", self.scope),
                trace_id,
            ));
        }
        if self.is_expired() {
            let budget = self.budget.unwrap_or_default();
            return Err(AppError::watchdog(
                format!("{} budget of {:.1}s elapsed", self.scope, budget.as_secs_f64()),
                trace_id,
            ));
        }
        Ok(())
    }
}
