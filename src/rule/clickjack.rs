use super::Rule;
use crate::error::Fault;
use crate::event::{RuntimeEvent, RuntimeEventArgs};

const HEADER_NAME: &str = "X-FRAME-OPTIONS";

/// Framing policy sent in the `X-FRAME-OPTIONS` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FramingMode {
    /// The page may not be framed at all
    #[default]
    Deny,
    /// The page may only be framed by pages of the same origin
    SameOrigin,
}

impl FramingMode {
    /// Returns the header value for this mode.
    pub fn header_value(self) -> &'static str {
        match self {
            FramingMode::Deny => "DENY",
            FramingMode::SameOrigin => "SAMEORIGIN",
        }
    }
}

/// Adds clickjacking protection to every response.
#[derive(Debug, Clone, Default)]
pub struct ClickjackRule {
    mode: FramingMode,
}

impl ClickjackRule {
    /// Creates the rule with the given framing mode.
    pub fn new(mode: FramingMode) -> Self {
        Self { mode }
    }

    /// The configured framing mode.
    pub fn mode(&self) -> FramingMode {
        self.mode
    }
}

impl Rule for ClickjackRule {
    fn name(&self) -> &str {
        "clickjack"
    }

    fn events(&self) -> &[RuntimeEvent] {
        &[RuntimeEvent::PostRequestHandlerExecute]
    }

    fn execute(&self, _event: RuntimeEvent, args: &mut RuntimeEventArgs) -> Result<(), Fault> {
        args.exchange_mut()
            .response
            .add_header(HEADER_NAME, self.mode.header_value());
        Ok(())
    }
}
