//! Middleware: request ids, request-scoped loggers and access logs.
//!
//! A stage is anything implementing [`Middleware`]: it takes the handler that
//! comes after it and returns a handler that runs around it. A [`Chain`] is an
//! ordered list of stages; [`Chain::then`] folds it over the application so
//! the first stage added is the outermost one.
//!
//! [`logging`] builds the standard chain. Per request it runs, in order:
//!
//! 1. [`InstallLogger`] opens the `request` span under the base logger
//! 2. [`Enrich::remote_addr`] records `remote`
//! 3. [`Enrich::user_agent`] records `user-agent`
//! 4. [`Enrich::referer`] records `referer`
//! 5. [`RequestIdStage`] reuses or mints the id, records `uuid`, sets `X-Request-ID`
//! 6. [`AccessLog`] times the application and emits one summary event
//! 7. the application handler
//!
//! The access stage sits last so the span it emits in already carries every
//! field recorded before it, and so it times the application alone.
//!
//! ```rust,no_run
//! use reqlog::{Logger, Request, Response, Router, Server, middleware};
//!
//! # async fn run() -> Result<(), reqlog::Error> {
//! let service = Logger::new(tracing::info_span!("billing"));
//!
//! let app = Router::new()
//!     .get("/", hello)
//!     .wrap(middleware::logging(service));
//!
//! Server::bind("0.0.0.0:3000")?.serve(app).await
//! # }
//!
//! async fn hello(req: Request) -> Response {
//!     req.logger().in_scope(|| tracing::info!("this is a request"));
//!     Response::text("hi")
//! }
//! ```

mod access;
mod enrich;
mod request_id;

use std::fmt;
use std::future;
use std::sync::Arc;

use http::HeaderName;
use tracing::Span;
use tracing::field::Empty;

use crate::context;
use crate::handler::{private, BoxedHandler, Handler};
use crate::log::Logger;
use crate::request::Request;
use crate::response::Response;

pub use access::AccessLog;
pub use enrich::Enrich;
pub use request_id::RequestIdStage;

/// Header carrying the request id in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Field holding the request id.
pub const REQUEST_ID_KEY: &str = "uuid";
pub const REMOTE_KEY: &str = "remote";
pub const USER_AGENT_KEY: &str = "user-agent";
pub const REFERER_KEY: &str = "referer";

/// One stage of a [`Chain`].
pub trait Middleware: Send + Sync + 'static {
    /// Returns a handler that runs this stage and then `next`.
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}

/// Wraps `next` in a stage that only rewrites the request on the way in.
pub(crate) fn map_request<F>(next: BoxedHandler, f: F) -> BoxedHandler
where
    F: Fn(Request) -> Request + Send + Sync + 'static,
{
    (move |req: Request| next.call(f(req))).into_boxed_handler()
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// An ordered list of stages. The first stage added runs first.
#[derive(Clone, Default)]
pub struct Chain {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage. It runs after every stage already in the chain.
    pub fn with(mut self, stage: impl Middleware) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Appends every stage of `other`, keeping their order.
    pub fn extend(mut self, other: Chain) -> Self {
        self.stages.extend(other.stages);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Wraps `app` in every stage, outermost first.
    pub fn then(&self, app: impl Handler) -> Pipeline {
        Pipeline { chain: self.clone(), handler: self.fold(app.into_boxed_handler()) }
    }

    fn fold(&self, app: BoxedHandler) -> BoxedHandler {
        self.stages.iter().rev().fold(app, |next, stage| stage.wrap(next))
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("stages", &self.stages.len()).finish()
    }
}

/// An application handler with its chain applied.
///
/// Call it directly, register it as a route handler, or let
/// [`Router::into_pipeline`](crate::Router::into_pipeline) build one.
#[derive(Clone)]
pub struct Pipeline {
    chain: Chain,
    handler: BoxedHandler,
}

impl Pipeline {
    pub async fn call(&self, req: Request) -> Response {
        self.handler.call(req).await
    }

    /// Runs `req` through the chain but answers with `res` instead of calling
    /// the application.
    ///
    /// For requests the server cannot hand to the application, such as one
    /// whose body failed to read. They still get an id and an access record.
    pub async fn respond(&self, req: Request, res: Response) -> Response {
        let answer = move |_req: Request| future::ready(res.clone());
        self.chain.fold(answer.into_boxed_handler()).call(req).await
    }
}

impl private::Sealed for Pipeline {}

impl Handler for Pipeline {
    fn into_boxed_handler(self) -> BoxedHandler {
        self.handler
    }
}

// ── InstallLogger ─────────────────────────────────────────────────────────────

/// Opens a `request` span per request, as a child of the base logger's span,
/// and binds it to the request context.
///
/// The span declares `remote`, `user-agent`, `referer` and `uuid`, all empty
/// until a later stage records them.
#[derive(Clone, Debug)]
pub struct InstallLogger {
    base: Logger,
}

impl InstallLogger {
    pub fn new(base: Logger) -> Self {
        Self { base }
    }
}

pub(crate) fn request_span(base: &Logger) -> Span {
    base.in_scope(|| {
        tracing::info_span!(
            "request",
            { REMOTE_KEY } = Empty,
            { USER_AGENT_KEY } = Empty,
            { REFERER_KEY } = Empty,
            { REQUEST_ID_KEY } = Empty,
        )
    })
}

impl Middleware for InstallLogger {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let base = self.base.clone();
        map_request(next, move |req| {
            let logger = Logger::new(request_span(&base));
            let ctx = context::with_logger(req.context(), logger);
            req.with_context(ctx)
        })
    }
}

// ── Standard chain ────────────────────────────────────────────────────────────

/// Settings for the standard chain.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Request and response header carrying the id.
    pub header: HeaderName,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { header: HeaderName::from_static(REQUEST_ID_HEADER) }
    }
}

impl LoggingConfig {
    pub fn header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }
}

/// The standard chain with the default header, with request spans opened
/// under `base`.
pub fn logging(base: Logger) -> Chain {
    logging_with(base, &LoggingConfig::default())
}

/// The standard chain with a custom header.
pub fn logging_with(base: Logger, config: &LoggingConfig) -> Chain {
    Chain::new()
        .with(InstallLogger::new(base))
        .with(Enrich::remote_addr())
        .with(Enrich::user_agent())
        .with(Enrich::referer())
        .with(RequestIdStage::new().header(config.header.clone()))
        .with(AccessLog)
}
