use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::Rule;
use crate::error::{ConfigError, Fault};
use crate::event::{RuntimeEvent, RuntimeEventArgs};

const MAXIMUM_EXCEEDED: &str = "Maximum number of requests exceeded";

/// Limits the request rate of each session.
///
/// Every request with a session is recorded. Hits older than the window are
/// forgotten; when an earlier hit of the same session is still within the
/// window, the remaining count is compared to the limit. Reaching the limit
/// is an intrusion.
///
/// Sessions with no hit inside the window are dropped at most once per
/// window, so the history stays bounded by the sessions active recently.
#[derive(Debug)]
pub struct RequestThrottleRule {
    max_count: usize,
    window: Duration,
    history: Mutex<History>,
}

#[derive(Debug, Default)]
struct History {
    sessions: HashMap<String, Vec<Instant>>,
    last_sweep: Option<Instant>,
}

impl History {
    fn sweep(&mut self, now: Instant, window: Duration) {
        if self
            .last_sweep
            .is_some_and(|last| now.saturating_duration_since(last) < window)
        {
            return;
        }
        self.sessions.retain(|_, hits| {
            hits.last()
                .is_some_and(|&hit| now.saturating_duration_since(hit) <= window)
        });
        self.last_sweep = Some(now);
    }
}

impl RequestThrottleRule {
    /// Default number of requests allowed per window.
    pub const DEFAULT_MAX_COUNT: usize = 5;
    /// Default window length.
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

    /// Creates a throttle allowing fewer than `max_count` requests per `window`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] if either value is zero.
    pub fn new(max_count: usize, window: Duration) -> Result<Self, ConfigError> {
        if max_count == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "max_count",
                reason: "must be greater than zero".to_string(),
            });
        }
        if window.is_zero() {
            return Err(ConfigError::InvalidParameter {
                name: "window",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            max_count,
            window,
            history: Mutex::new(History::default()),
        })
    }

    /// Maximum number of requests per window.
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Records a request of `session_id` made at `now` and applies the limit.
    ///
    /// # Errors
    ///
    /// Returns an intrusion fault when the limit is reached.
    pub fn record_hit(&self, session_id: &str, now: Instant) -> Result<(), Fault> {
        let mut history = self.history.lock();
        history.sweep(now, self.window);
        let hits = history.sessions.entry(session_id.to_string()).or_default();

        hits.retain(|&hit| now.saturating_duration_since(hit) <= self.window);
        let recent = !hits.is_empty();
        hits.push(now);

        if recent && hits.len() >= self.max_count {
            return Err(Fault::intrusion(
                MAXIMUM_EXCEEDED,
                format!(
                    "{MAXIMUM_EXCEEDED}: session {session_id} made {} requests within {:?}",
                    hits.len(),
                    self.window
                ),
            ));
        }
        Ok(())
    }

    /// Returns the number of requests currently remembered for `session_id`.
    pub fn history_len(&self, session_id: &str) -> usize {
        self.history
            .lock()
            .sessions
            .get(session_id)
            .map_or(0, Vec::len)
    }

    /// Returns the number of sessions currently remembered.
    pub fn session_count(&self) -> usize {
        self.history.lock().sessions.len()
    }
}

impl Default for RequestThrottleRule {
    fn default() -> Self {
        Self {
            max_count: Self::DEFAULT_MAX_COUNT,
            window: Self::DEFAULT_WINDOW,
            history: Mutex::new(History::default()),
        }
    }
}

impl Rule for RequestThrottleRule {
    fn name(&self) -> &str {
        "request-throttle"
    }

    fn events(&self) -> &[RuntimeEvent] {
        &[RuntimeEvent::PreRequestHandlerExecute]
    }

    fn execute(&self, _event: RuntimeEvent, args: &mut RuntimeEventArgs) -> Result<(), Fault> {
        let Some(session) = args.exchange().session.as_ref() else {
            return Ok(());
        };
        self.record_hit(session.id(), Instant::now())
    }
}
