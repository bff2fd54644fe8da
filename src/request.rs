//! Request-scoped state seen by conditions, rules and actions.
//!
//! These types are a framework-agnostic view of one HTTP exchange. Platform
//! integrations copy what they need into an [`HttpExchange`] before firing
//! runtime events and apply the resulting [`HttpResponse`] afterwards.

use std::collections::{BTreeMap, BTreeSet};

/// An authenticated user or service principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Unique identifier for this principal
    pub id: String,
    /// Login name, matched by user conditions
    pub name: String,
    /// Roles granted to the principal
    pub roles: BTreeSet<String>,
}

impl Principal {
    /// Creates a principal with no roles.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            roles: BTreeSet::new(),
        }
    }

    /// Adds a role, builder style.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Returns true if the principal holds `role`.
    pub fn is_in_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Source of the current user for identity-based conditions.
pub trait IdentityProvider: Send + Sync {
    /// Returns the principal acting in `request`, if any.
    fn current_principal(&self, request: &HttpRequest) -> Option<Principal>;
}

/// [`IdentityProvider`] that trusts the principal attached to the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdentity;

impl IdentityProvider for RequestIdentity {
    fn current_principal(&self, request: &HttpRequest) -> Option<Principal> {
        request.principal.clone()
    }
}

/// Inbound request data.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    /// Unique identifier for this request, used for log correlation
    pub request_id: String,
    /// Full request URL
    pub url: String,
    /// Type name of the handler mapped to this request, if mapping has run
    pub handler: Option<String>,
    /// Query and form parameters
    pub parameters: BTreeMap<String, String>,
    /// Authenticated principal, if any
    pub principal: Option<Principal>,
}

impl HttpRequest {
    /// Creates a request for `url`.
    pub fn new(request_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Sets the handler type, builder style.
    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    /// Sets the principal, builder style.
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Adds a parameter, builder style.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Returns true if the parameter is present.
    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }
}

/// Outbound response state mutated by rules and actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
    redirect: Option<String>,
    transfer: Option<String>,
    ended: bool,
}

impl HttpResponse {
    /// Creates an empty `200 OK` response.
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: String::new(),
            redirect: None,
            transfer: None,
            ended: false,
        }
    }

    /// Returns the status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Sets the status code.
    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    /// Appends a header. Repeated names are kept, in insertion order.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Returns the first value of a header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns all headers in insertion order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Removes every header.
    pub fn clear_headers(&mut self) {
        self.headers.clear();
    }

    /// Returns the body written so far.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Appends to the body.
    pub fn write(&mut self, text: &str) {
        self.body.push_str(text);
    }

    /// Discards the body.
    pub fn clear_content(&mut self) {
        self.body.clear();
    }

    /// Issues a `302 Found` to `location` and ends the response.
    pub fn redirect(&mut self, location: impl Into<String>) {
        let location = location.into();
        self.status = 302;
        self.add_header("Location", location.clone());
        self.redirect = Some(location);
        self.ended = true;
    }

    /// Returns the redirect target, if the response was redirected.
    pub fn redirect_location(&self) -> Option<&str> {
        self.redirect.as_deref()
    }

    /// Hands the request over to another server-side path and ends this response.
    pub fn transfer(&mut self, path: impl Into<String>) {
        self.transfer = Some(path.into());
        self.ended = true;
    }

    /// Returns the server-side transfer target, if any.
    pub fn transfer_target(&self) -> Option<&str> {
        self.transfer.as_deref()
    }

    /// Marks the response complete; the handler must not run afterwards.
    pub fn end(&mut self) {
        self.ended = true;
    }

    /// Returns true once the response has been ended.
    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-user session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: String,
    attributes: BTreeMap<String, String>,
}

impl Session {
    /// Creates an empty session.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Returns the session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns a session attribute.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Sets a session attribute.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }
}

/// One request/response pair flowing through the runtime.
#[derive(Debug, Clone, Default)]
pub struct HttpExchange {
    /// The inbound request
    pub request: HttpRequest,
    /// The response under construction
    pub response: HttpResponse,
    /// The user's session, if one has been established
    pub session: Option<Session>,
    signed_out: bool,
}

impl HttpExchange {
    /// Creates an exchange for `request` with an empty response and no session.
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request,
            response: HttpResponse::new(),
            session: None,
            signed_out: false,
        }
    }

    /// Attaches a session, builder style.
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Drops the authenticated principal and the session.
    pub fn sign_out(&mut self) {
        self.request.principal = None;
        self.session = None;
        self.signed_out = true;
    }

    /// Returns true if [`sign_out`](Self::sign_out) ran during this exchange.
    pub fn is_signed_out(&self) -> bool {
        self.signed_out
    }
}
