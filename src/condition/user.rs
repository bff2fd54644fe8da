use std::sync::Arc;

use regex::Regex;

use super::url::compile_pattern;
use super::{Condition, ConditionArgs};
use crate::error::ConfigError;
use crate::request::{IdentityProvider, RequestIdentity};

/// Matches the current user's name and role membership.
///
/// The user is resolved through an [`IdentityProvider`]. Anonymous users and
/// users with an empty name never match. Every listed role must be held.
#[derive(Clone)]
pub struct UserCondition {
    name_pattern: Regex,
    roles: Vec<String>,
    identity: Arc<dyn IdentityProvider>,
}

impl UserCondition {
    /// Matches user names against `name_pattern`, using the request principal.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] if the pattern does not compile.
    pub fn new(name_pattern: &str) -> Result<Self, ConfigError> {
        Self::with_identity(name_pattern, Arc::new(RequestIdentity))
    }

    /// Matches user names against `name_pattern`, resolving users through `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] if the pattern does not compile.
    pub fn with_identity(
        name_pattern: &str,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            name_pattern: compile_pattern(name_pattern)?,
            roles: Vec::new(),
            identity,
        })
    }

    /// Requires `role` in addition to the name match, builder style.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// The name pattern source.
    pub fn name_pattern(&self) -> &str {
        self.name_pattern.as_str()
    }

    /// The required roles.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

impl Condition for UserCondition {
    fn evaluate(&self, args: &ConditionArgs<'_>) -> bool {
        let Some(principal) = self.identity.current_principal(args.request()) else {
            return false;
        };
        if principal.name.is_empty() || !self.name_pattern.is_match(&principal.name) {
            return false;
        }
        self.roles.iter().all(|role| principal.is_in_role(role))
    }
}

impl std::fmt::Debug for UserCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCondition")
            .field("name_pattern", &self.name_pattern.as_str())
            .field("roles", &self.roles)
            .finish()
    }
}
