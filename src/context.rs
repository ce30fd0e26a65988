//! Request-scoped state that travels with the request.
//!
//! A [`Context`] is an immutable chain of typed values. Adding a value never
//! changes the context you started from; you get a new one whose newest link
//! points back at the old one:
//!
//! ```text
//!  with_logger(base)   update_logger(uuid=…)   with_request_id(…)
//!  ┌────────┐          ┌────────┐              ┌──────────┐
//!  │ Logger │ ◄─────── │ Logger │ ◄─────────── │ RequestId│  ◄── req.context()
//!  └────────┘          └────────┘              └──────────┘
//! ```
//!
//! Lookups walk from the newest link back, so the most recent value of a type
//! wins. Nothing here is thread-local or task-local: the context is owned by
//! the [`Request`] and handed on explicitly.
//!
//! There are two ways in. Handlers holding the request use the
//! `*_from_request` functions; code that was only handed the context uses the
//! `*_from_context` ones. Both read the same chain.

use std::any::Any;
use std::fmt;
use std::iter;
use std::sync::Arc;

use crate::id::RequestId;
use crate::log::Logger;
use crate::request::Request;

/// An immutable chain of request-scoped values.
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Link>>,
}

struct Link {
    value: Box<dyn Any + Send + Sync>,
    parent: Option<Arc<Link>>,
}

impl Context {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a context that also carries `value`.
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Self {
        Self {
            head: Some(Arc::new(Link { value: Box::new(value), parent: self.head.clone() })),
        }
    }

    /// The most recently attached value of type `T`.
    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        iter::successors(self.head.as_deref(), |l| l.parent.as_deref())
            .find_map(|l| l.value.downcast_ref::<T>())
    }

    pub fn depth(&self) -> usize {
        iter::successors(self.head.as_deref(), |l| l.parent.as_deref()).count()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("depth", &self.depth())
            .field("request_id", &request_id_from_context(self))
            .finish()
    }
}

// ── Logger ────────────────────────────────────────────────────────────────────

/// Returns a context carrying `logger`.
pub fn with_logger(ctx: &Context, logger: Logger) -> Context {
    ctx.with_value(logger)
}

/// The logger bound to `ctx`, or the process-wide default if none is.
pub fn logger_from_context(ctx: &Context) -> Logger {
    ctx.value::<Logger>().cloned().unwrap_or_else(|| Logger::global().clone())
}

/// The logger bound to `req`, or the process-wide default if none is.
pub fn logger_from_request(req: &Request) -> Logger {
    logger_from_context(req.context())
}

/// Returns a context whose logger carries `fields` on top of the ones already
/// bound. Keys that are already bound keep their earlier value.
pub fn update_logger<V>(ctx: &Context, fields: impl IntoIterator<Item = (&'static str, V)>) -> Context
where
    V: Into<String>,
{
    let logger = logger_from_context(ctx).with_fields(fields);
    with_logger(ctx, logger)
}

// ── Request id ────────────────────────────────────────────────────────────────

/// Returns a context carrying `id`.
pub fn with_request_id(ctx: &Context, id: RequestId) -> Context {
    ctx.with_value(id)
}

pub fn request_id_from_context(ctx: &Context) -> Option<RequestId> {
    ctx.value::<RequestId>().copied()
}

/// The id bound to `req`. `None` until the request-id stage has run.
pub fn request_id_from_request(req: &Request) -> Option<RequestId> {
    request_id_from_context(req.context())
}

#[cfg(test)]
mod tests {
    use tracing::field::Empty;

    use super::*;
    use crate::testing::{Capture, get};

    #[test]
    fn values_shadow_older_ones_without_mutation() {
        let a = Context::new().with_value(1u32);
        let b = a.with_value(2u32).with_value("unrelated");

        assert_eq!(a.value::<u32>(), Some(&1));
        assert_eq!(b.value::<u32>(), Some(&2));
        assert_eq!(b.value::<&str>(), Some(&"unrelated"));
        assert_eq!(a.value::<&str>(), None);
        assert_eq!(a.depth(), 1);
        assert_eq!(b.depth(), 3);
    }

    #[test]
    fn missing_logger_falls_back_to_global() {
        let logger = logger_from_context(&Context::new());
        assert!(logger.fields().is_empty());

        let logger = logger_from_request(&get("/"));
        assert!(logger.fields().is_empty());
    }

    #[test]
    fn bound_logger_is_returned() {
        let capture = Capture::start();
        let span = tracing::info_span!("svc", service = Empty);
        let ctx = with_logger(&Context::new(), Logger::new(span).with("service", "billing"));

        logger_from_context(&ctx).in_scope(|| tracing::info!("hi"));
        assert_eq!(capture.lines()[0]["span"]["service"], "billing");
    }

    #[test]
    fn update_logger_appends_and_keeps_input() {
        let base = with_logger(&Context::new(), Logger::none());
        let updated = update_logger(&base, [("remote", "10.0.0.1:5555")]);
        let again = update_logger(&updated, [("remote", "spoofed"), ("referer", "https://a.example")]);

        assert!(logger_from_context(&base).fields().is_empty());
        assert_eq!(logger_from_context(&updated).field("remote"), Some("10.0.0.1:5555"));

        let last = logger_from_context(&again);
        assert_eq!(last.field("remote"), Some("10.0.0.1:5555"));
        assert_eq!(last.field("referer"), Some("https://a.example"));
    }

    #[test]
    fn update_logger_without_bound_logger_enriches_the_default() {
        let ctx = update_logger(&Context::new(), [("k", "1")]);
        assert_eq!(logger_from_context(&ctx).field("k"), Some("1"));
    }

    #[test]
    fn request_id_round_trips_through_both_paths() {
        let id = RequestId::new();
        let req = get("/");
        assert_eq!(request_id_from_request(&req), None);

        let ctx = with_request_id(req.context(), id);
        assert_eq!(request_id_from_context(&ctx), Some(id));

        let req = req.with_context(ctx);
        assert_eq!(request_id_from_request(&req), Some(id));
        assert_eq!(req.request_id(), Some(id));
    }
}
