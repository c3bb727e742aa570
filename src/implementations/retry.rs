use log::{ info, warn };

/// Lower bound on the attempt budget when it is derived from the requirement count
pub const MIN_ATTEMPTS: u32 = 3;

/// Attempt budget when none is configured: one per requirement, at least three
pub fn default_max_retries(requirement_count: usize) -> u32 {
    (requirement_count as u32).max(MIN_ATTEMPTS)
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Exhausted,
}

/// Bounds the generate-validate loop of one checkpoint and accumulates the
/// feedback of every failed attempt.
#[derive(Debug, Clone)]
pub struct RetryController {
    attempt: u32,
    max_retries: u32,
    feedback: Vec<String>,
}

impl RetryController {
    pub fn new(max_retries: u32) -> Self {
        Self {
            attempt: 0,
            max_retries: max_retries.max(1),
            feedback: Vec::new(),
        }
    }

    /// Start the next attempt; `None` once the budget is spent
    pub fn begin_attempt(&mut self) -> Option<u32> {
        if self.attempt >= self.max_retries {
            return None;
        }
        self.attempt += 1;
        info!("Attempt {} of {}", self.attempt, self.max_retries);
        Some(self.attempt)
    }

    /// Record the feedback of a failed attempt
    pub fn record_failure(&mut self, feedback: impl Into<String>) -> RetryDecision {
        self.feedback.push(feedback.into());
        if self.attempt >= self.max_retries {
            warn!("All {} attempts used", self.max_retries);
            RetryDecision::Exhausted
        } else {
            RetryDecision::Retry
        }
    }

    /// Feedback of every failed attempt, oldest first
    pub fn feedback(&self) -> &[String] {
        &self.feedback
    }

    pub fn last_feedback(&self) -> Option<&str> {
        self.feedback.last().map(String::as_str)
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}
