//! Event-driven request security runtime and input canonicalization.
//!
//! The crate has two halves:
//!
//! - **Runtime**: a tree of [`Context`]s that reacts to request lifecycle
//!   events. Each context is gated by [`Condition`]s, runs [`Rule`]s when it
//!   matches, and answers rule [`Fault`]s with chains of [`Action`]s.
//! - **Encoder**: a registry of named [`Codec`]s and
//!   [`Encoder::canonicalize`], which decodes input to a fixed point and flags
//!   multiple or mixed encoding.
//!
//! # Dispatch
//!
//! ```text
//! platform event
//!   -> Runtime
//!        -> root Context (registration order)
//!             conditions match? push frame
//!               -> ContextRule -> Rule          (fault -> fault actions)
//!               -> SubContext -> ...
//!             pop frame
//! ```
//!
//! Every dispatch carries its own [`RuntimeEventArgs`]: the context stack and
//! the condition/match caches never leak between requests.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use esapi_core::{
//!     BlockAction, ConditionRef, HttpExchange, HttpRequest, LogAction, RequestThrottleRule,
//!     Runtime, RuntimeEvent, Session, UrlCondition,
//! };
//!
//! let runtime = Runtime::new();
//! let api = runtime.create_context_named("api")?;
//! api.bind_condition(ConditionRef::new(UrlCondition::new("^/api/")?), true);
//!
//! let throttle = api.bind_rule(Arc::new(RequestThrottleRule::default()));
//! throttle.add_fault_action(Arc::new(LogAction::default()));
//! throttle.add_fault_action(Arc::new(BlockAction::new(429)));
//!
//! let request = HttpRequest::new("req-1", "/api/items");
//! let exchange = HttpExchange::new(request).with_session(Session::new("s-1"));
//! let args = runtime.dispatch(RuntimeEvent::PreRequestHandlerExecute, exchange)?;
//! assert_eq!(args.exchange().response.status(), 200);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod action;
mod bridge;
mod cache;
mod condition;
mod config;
mod context;
mod encoder;
mod error;
mod event;
mod id;
mod logging;
mod module;
mod repository;
mod request;
mod rule;
mod runtime;

pub use action::{
    AccountStore, Action, ActionArgs, BlockAction, CustomAction, DisableAccountAction, LogAction,
    RedirectAction, SignOutAction, TransferAction,
};
pub use bridge::{Forward, RuntimeEventBridge, RuntimeEventListener, RuntimeEventPublisher};
pub use cache::EvaluationCache;
pub use condition::{
    Condition, ConditionArgs, ConditionRef, ContextCondition, HandlerCondition,
    ParametersCondition, UrlCondition, UserCondition, ValueCondition,
};
pub use config::{
    ConditionBinding, ContextConfig, EncoderConfig, RuleBinding, RuntimeConfig, SecurityConfig,
};
pub use context::{Context, ContextRule};
pub use encoder::{
    Base64Codec, Codec, Encoder, HtmlAttributeCodec, HtmlCodec, JavaScriptCodec, UrlCodec,
    VbScriptCodec, XmlCodec,
};
pub use error::{ActionChainError, ActionError, ConfigError, EncodingError, Fault, FaultKind};
pub use event::{ContextFrame, RuntimeEvent, RuntimeEventArgs};
pub use id::ObjectId;
pub use logging::{LogEventType, LogLevel, LogRecord, LoggerSink, RecordingLogger, TracingLogger};
pub use module::{RunRule, RuntimeModule};
pub use repository::{NamedObjectRepository, ObjectRepository};
pub use request::{
    HttpExchange, HttpRequest, HttpResponse, IdentityProvider, Principal, RequestIdentity, Session,
};
pub use rule::{
    ClickjackRule, CsrfRule, CustomRule, FramingMode, RequestThrottleRule, Rule,
    CSRF_TOKEN_HEADER, CSRF_TOKEN_KEY,
};
pub use runtime::Runtime;
