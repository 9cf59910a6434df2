//! Rolling trust judgement for one joint sensor.
//!
//! Two independent inputs feed `is_ok()`:
//! - the one-time variance qualification (sticky until an explicit re-check), and
//! - the live communication state plus a saturating count of failed reads in a
//!   row, which heal on the next good read.

/// Qualification progress of a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthPhase {
    /// Not set up yet.
    Uninitialized,
    /// Set up, waiting for its first variance check.
    Calibrating,
    /// Last variance check passed.
    Qualified,
    /// Last variance check failed or could not complete.
    Disqualified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorHealth {
    communication_works: bool,
    passed_variance_check: bool,
    consecutive_failed_reads: u8,
    max_failed_reads: u8,
    phase: HealthPhase,
}

impl SensorHealth {
    pub fn new(max_failed_reads: u8) -> Self {
        Self {
            communication_works: false,
            passed_variance_check: false,
            consecutive_failed_reads: 0,
            max_failed_reads,
            phase: HealthPhase::Uninitialized,
        }
    }

    pub fn communication_works(&self) -> bool {
        self.communication_works
    }

    pub fn passed_variance_check(&self) -> bool {
        self.passed_variance_check
    }

    pub fn consecutive_failed_reads(&self) -> u8 {
        self.consecutive_failed_reads
    }

    pub fn max_failed_reads(&self) -> u8 {
        self.max_failed_reads
    }

    pub fn phase(&self) -> HealthPhase {
        self.phase
    }

    /// The single trust signal: all three conditions must hold.
    pub fn is_ok(&self) -> bool {
        self.communication_works
            && self.passed_variance_check
            && self.consecutive_failed_reads < self.max_failed_reads
    }

    /// Result of the presence probe done at setup.
    pub(crate) fn record_setup(&mut self, present: bool) {
        self.communication_works = present;
        if self.phase == HealthPhase::Uninitialized {
            self.phase = HealthPhase::Calibrating;
        }
    }

    /// Outcome of one periodic read.
    pub(crate) fn record_read(&mut self, ok: bool) {
        if ok {
            if self.consecutive_failed_reads > 0 {
                tracing::debug!(
                    after = self.consecutive_failed_reads,
                    "sensor communication recovered"
                );
            }
            self.communication_works = true;
            self.consecutive_failed_reads = 0;
        } else {
            self.communication_works = false;
            self.consecutive_failed_reads = self.consecutive_failed_reads.saturating_add(1);
        }
    }

    /// Outcome of a variance qualification run.
    pub(crate) fn record_variance(&mut self, passed: bool) {
        self.passed_variance_check = passed;
        self.phase = if passed {
            HealthPhase::Qualified
        } else {
            HealthPhase::Disqualified
        };
    }
}
