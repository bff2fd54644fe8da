use super::{Action, ActionArgs};
use crate::error::ActionError;

/// Discards the response and ends it with an error status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAction {
    status_code: u16,
}

impl BlockAction {
    /// Status code used by [`BlockAction::default`].
    pub const DEFAULT_STATUS: u16 = 403;

    /// Blocks with `status_code`.
    pub fn new(status_code: u16) -> Self {
        Self { status_code }
    }

    /// The status code sent to the client.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }
}

impl Default for BlockAction {
    fn default() -> Self {
        Self::new(Self::DEFAULT_STATUS)
    }
}

impl Action for BlockAction {
    fn name(&self) -> &str {
        "block"
    }

    fn execute(&self, args: &mut ActionArgs<'_>) -> Result<(), ActionError> {
        let response = &mut args.exchange_mut().response;
        response.clear_headers();
        response.clear_content();
        response.set_status(self.status_code);
        response.end();
        Ok(())
    }
}
