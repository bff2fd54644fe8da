use super::{Action, ActionArgs};
use crate::error::{ActionError, ConfigError};

fn require_url(url: String) -> Result<String, ConfigError> {
    if url.is_empty() {
        return Err(ConfigError::InvalidParameter {
            name: "url",
            reason: "must not be empty".to_string(),
        });
    }
    Ok(url)
}

/// Redirects the client to a fixed URL and ends the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectAction {
    url: String,
}

impl RedirectAction {
    /// Redirects to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] for an empty URL.
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            url: require_url(url.into())?,
        })
    }

    /// The redirect target.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Action for RedirectAction {
    fn name(&self) -> &str {
        "redirect"
    }

    fn execute(&self, args: &mut ActionArgs<'_>) -> Result<(), ActionError> {
        args.exchange_mut().response.redirect(self.url.as_str());
        Ok(())
    }
}

/// Transfers the request to another server-side path and ends the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferAction {
    url: String,
}

impl TransferAction {
    /// Transfers to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] for an empty URL.
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            url: require_url(url.into())?,
        })
    }

    /// The transfer target.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Action for TransferAction {
    fn name(&self) -> &str {
        "transfer"
    }

    fn execute(&self, args: &mut ActionArgs<'_>) -> Result<(), ActionError> {
        args.exchange_mut().response.transfer(self.url.as_str());
        Ok(())
    }
}
