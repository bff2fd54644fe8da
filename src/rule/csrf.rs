use super::Rule;
use crate::error::Fault;
use crate::event::{RuntimeEvent, RuntimeEventArgs};

/// Session attribute holding the anti-forgery token.
pub const CSRF_TOKEN_KEY: &str = "csrf-token";

/// Response header exposing the anti-forgery token to the page.
pub const CSRF_TOKEN_HEADER: &str = "X-CSRF-TOKEN";

/// Attaches an anti-forgery token to requests served by a page handler.
///
/// The token is generated once per session and reused afterwards. Requests
/// without a mapped handler or without a session are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsrfRule;

impl CsrfRule {
    /// Creates the rule.
    pub fn new() -> Self {
        Self
    }
}

impl Rule for CsrfRule {
    fn name(&self) -> &str {
        "csrf"
    }

    fn events(&self) -> &[RuntimeEvent] {
        &[RuntimeEvent::PreRequestHandlerExecute]
    }

    fn execute(&self, _event: RuntimeEvent, args: &mut RuntimeEventArgs) -> Result<(), Fault> {
        let exchange = args.exchange_mut();
        if exchange.request.handler.is_none() {
            return Ok(());
        }
        let Some(session) = exchange.session.as_mut() else {
            return Ok(());
        };

        let token = match session.get(CSRF_TOKEN_KEY).map(str::to_string) {
            Some(token) => token,
            None => {
                let token = uuid::Uuid::new_v4().simple().to_string();
                session.set(CSRF_TOKEN_KEY, token.clone());
                token
            }
        };
        exchange.response.add_header(CSRF_TOKEN_HEADER, token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{HttpExchange, HttpRequest, Session};

    fn page_exchange() -> HttpExchange {
        HttpExchange::new(HttpRequest::new("r", "/form").with_handler("FormPage"))
            .with_session(Session::new("s-1"))
    }

    #[test]
    fn token_is_created_once_per_session() {
        let mut args = RuntimeEventArgs::new(page_exchange());
        CsrfRule
            .execute(RuntimeEvent::PreRequestHandlerExecute, &mut args)
            .unwrap();
        let exchange = args.into_exchange();
        let token = exchange
            .session
            .as_ref()
            .and_then(|s| s.get(CSRF_TOKEN_KEY))
            .map(str::to_string);
        assert!(token.is_some());
        assert_eq!(exchange.response.header(CSRF_TOKEN_HEADER), token.as_deref());

        let mut next = HttpExchange::new(HttpRequest::new("r2", "/form").with_handler("FormPage"));
        next.session = exchange.session.clone();
        let mut args = RuntimeEventArgs::new(next);
        CsrfRule
            .execute(RuntimeEvent::PreRequestHandlerExecute, &mut args)
            .unwrap();
        assert_eq!(args.exchange().response.header(CSRF_TOKEN_HEADER), token.as_deref());
    }

    #[test]
    fn requests_without_session_are_skipped() {
        let exchange = HttpExchange::new(HttpRequest::new("r", "/").with_handler("FormPage"));
        let mut args = RuntimeEventArgs::new(exchange);
        CsrfRule
            .execute(RuntimeEvent::PreRequestHandlerExecute, &mut args)
            .unwrap();
        assert!(args.exchange().response.headers().is_empty());
    }

    #[test]
    fn unmapped_requests_are_skipped() {
        let exchange =
            HttpExchange::new(HttpRequest::new("r", "/")).with_session(Session::new("s"));
        let mut args = RuntimeEventArgs::new(exchange);
        CsrfRule
            .execute(RuntimeEvent::PreRequestHandlerExecute, &mut args)
            .unwrap();
        assert!(args.exchange().session.as_ref().and_then(|s| s.get(CSRF_TOKEN_KEY)).is_none());
    }
}
