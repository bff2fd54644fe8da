use std::fmt;
use std::sync::Arc;

use super::{Action, ActionArgs};
use crate::error::ActionError;
use crate::logging::{LogEventType, LogLevel, LoggerSink, TracingLogger};

/// Writes intrusion faults to the security log at fatal level.
///
/// Other fault kinds are ignored.
#[derive(Clone)]
pub struct LogAction {
    logger: Arc<dyn LoggerSink>,
}

impl LogAction {
    /// Logs through `logger`.
    pub fn new(logger: Arc<dyn LoggerSink>) -> Self {
        Self { logger }
    }
}

impl Default for LogAction {
    fn default() -> Self {
        Self::new(Arc::new(TracingLogger))
    }
}

impl Action for LogAction {
    fn name(&self) -> &str {
        "log"
    }

    fn execute(&self, args: &mut ActionArgs<'_>) -> Result<(), ActionError> {
        let fault = args.fault();
        if fault.is_intrusion() {
            self.logger
                .log(LogLevel::Fatal, LogEventType::Security, fault.log_message());
        }
        Ok(())
    }
}

impl fmt::Debug for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogAction").finish_non_exhaustive()
    }
}
