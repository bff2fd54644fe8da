use std::fmt;
use std::sync::Arc;

use super::{Action, ActionArgs};
use crate::error::ActionError;

/// Store of user accounts that can be locked out.
pub trait AccountStore: Send + Sync {
    /// Disables the account named `user_name`.
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] if the store rejects the update.
    fn disable(&self, user_name: &str) -> Result<(), ActionError>;
}

/// Disables the account of the current user.
///
/// Anonymous requests are left alone.
#[derive(Clone)]
pub struct DisableAccountAction {
    accounts: Arc<dyn AccountStore>,
}

impl DisableAccountAction {
    /// Disables accounts through `accounts`.
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }
}

impl Action for DisableAccountAction {
    fn name(&self) -> &str {
        "disable-account"
    }

    fn execute(&self, args: &mut ActionArgs<'_>) -> Result<(), ActionError> {
        match &args.runtime_args().exchange().request.principal {
            Some(principal) => self.accounts.disable(&principal.name),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for DisableAccountAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisableAccountAction").finish_non_exhaustive()
    }
}

/// Signs the current user out.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignOutAction;

impl Action for SignOutAction {
    fn name(&self) -> &str {
        "sign-out"
    }

    fn execute(&self, args: &mut ActionArgs<'_>) -> Result<(), ActionError> {
        args.exchange_mut().sign_out();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::test_support::faulting_rule;
    use crate::error::Fault;
    use crate::event::RuntimeEventArgs;
    use crate::request::{HttpExchange, HttpRequest, Principal, Session};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Accounts {
        disabled: Mutex<Vec<String>>,
        fail: bool,
    }

    impl AccountStore for Accounts {
        fn disable(&self, user_name: &str) -> Result<(), ActionError> {
            if self.fail {
                return Err(ActionError::new("disable-account", "store offline"));
            }
            self.disabled.lock().push(user_name.to_string());
            Ok(())
        }
    }

    fn signed_in() -> RuntimeEventArgs {
        let request = HttpRequest::new("r", "/").with_principal(Principal::new("1", "mallory"));
        RuntimeEventArgs::new(HttpExchange::new(request).with_session(Session::new("s")))
    }

    #[test]
    fn disables_current_user() {
        let store = Arc::new(Accounts::default());
        let action = DisableAccountAction::new(store.clone());
        let rule = faulting_rule();
        let fault = Fault::intrusion("x", "y");
        let mut runtime_args = signed_in();

        action
            .execute(&mut ActionArgs::new(&rule, &fault, &mut runtime_args))
            .unwrap();
        assert_eq!(*store.disabled.lock(), vec!["mallory".to_string()]);
    }

    #[test]
    fn anonymous_request_is_a_no_op() {
        let store = Arc::new(Accounts::default());
        let action = DisableAccountAction::new(store.clone());
        let rule = faulting_rule();
        let fault = Fault::intrusion("x", "y");
        let mut runtime_args = RuntimeEventArgs::new(HttpExchange::default());

        action
            .execute(&mut ActionArgs::new(&rule, &fault, &mut runtime_args))
            .unwrap();
        assert!(store.disabled.lock().is_empty());
    }

    #[test]
    fn store_failure_is_reported() {
        let store = Arc::new(Accounts {
            fail: true,
            ..Accounts::default()
        });
        let action = DisableAccountAction::new(store);
        let rule = faulting_rule();
        let fault = Fault::intrusion("x", "y");
        let mut runtime_args = signed_in();

        let err = action
            .execute(&mut ActionArgs::new(&rule, &fault, &mut runtime_args))
            .unwrap_err();
        assert_eq!(err.message(), "store offline");
    }

    #[test]
    fn sign_out_clears_session() {
        let rule = faulting_rule();
        let fault = Fault::intrusion("x", "y");
        let mut runtime_args = signed_in();

        SignOutAction
            .execute(&mut ActionArgs::new(&rule, &fault, &mut runtime_args))
            .unwrap();
        assert!(runtime_args.exchange().is_signed_out());
        assert!(runtime_args.exchange().session.is_none());
    }
}
