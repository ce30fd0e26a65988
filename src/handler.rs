//! Handler trait and type erasure.
//!
//! Routes and middleware stages hold handlers of many different concrete
//! types, so every handler is erased into one shape before it is stored:
//!
//! ```text
//! async fn hello(req: Request) -> Response { … }   ← user writes this
//!        ↓ .into_boxed_handler()
//! Arc::new(FnHandler(hello))                       ← BoxedHandler
//!        ↓ Middleware::wrap(next)
//! Arc<dyn ErasedHandler>                           ← stage around the handler
//!        ↓ handler.call(req)
//! Box::pin(async { hello(req).await.into_response() })
//! ```
//!
//! A middleware stage is just another erased handler that owns `next` and
//! calls it. Per request that costs one `Arc` clone and one virtual call per
//! stage.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a [`Response`].
///
/// Pinned because handler futures may be self-referential, and `Send` so the
/// server can drive it on any worker thread.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Object-safe dispatch interface shared by handlers and middleware stages.
///
/// Callers hold it as a [`BoxedHandler`], so the method resolves through the
/// trait object and the trait itself rarely needs importing. Closures and
/// pipelines reach it through [`Handler::into_boxed_handler`].
pub trait ErasedHandler {
    /// Starts handling `req`. The returned future owns everything it needs.
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
///
/// Cloning is one reference-count bump. The router stores one per route and
/// each middleware stage stores the one it wraps.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// Satisfied automatically by any function of the shape
///
/// ```text
/// async fn name(req: Request) -> impl IntoResponse
/// ```
///
/// and by [`Pipeline`](crate::middleware::Pipeline), so a wrapped
/// application can be mounted as a route of another router.
///
/// ```rust
/// use reqlog::{Request, Response, Router, StatusCode};
///
/// async fn plain(_req: Request) -> Response {
///     Response::text("hi")
/// }
///
/// Router::new()
///     .get("/", plain)
///     .get("/health", |_req: Request| async { StatusCode::NO_CONTENT })
///     .get("/who", |req: Request| async move {
///         req.header("user-agent").unwrap_or("unknown").to_owned()
///     });
/// ```
///
/// The trait is sealed: the set of handler shapes is fixed by this crate.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    /// Erases the concrete type. Called once, when the handler is stored.
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

pub(crate) mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a concrete handler function to [`ErasedHandler`].
///
/// The function runs synchronously inside `call` to produce its future; only
/// the `.await` and the response conversion are deferred into the box.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
