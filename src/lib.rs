//! # reqlog
//!
//! Request ids and structured request logging for HTTP services.
//!
//! Every request that passes through the standard middleware chain gets:
//!
//! - **One request id.** A well-formed `X-Request-ID` from the client is
//!   adopted, anything else is replaced by a fresh id. The same id is
//!   readable from the request context, recorded on the request span as
//!   `uuid` and echoed in the `X-Request-ID` response header.
//! - **A request-scoped logger**: a `tracing` span named `request` carrying
//!   `remote`, `user-agent`, `referer` and `uuid`, available to handlers via
//!   [`Request::logger`]. Events emitted in its scope inherit those fields.
//! - **One access event** with method, protocol, url, status, size and
//!   duration, emitted when the handler returns.
//!
//! Ids are 20-character, time-sortable strings in lowercase base32hex, e.g.
//! `cfrj1ro330reqgvfpgu0`. See [`RequestId`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use reqlog::{Logger, Request, Response, Router, Server, StatusCode, middleware};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), reqlog::Error> {
//!     let app = Router::new()
//!         .get("/users/{id}", get_user)
//!         .post("/users", create_user)
//!         .wrap(middleware::logging(Logger::none()));
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     req.logger().in_scope(|| tracing::info!(user = id, "looking up user"));
//!     Response::text(format!("user {id}"))
//! }
//!
//! async fn create_user(req: Request) -> Response {
//!     if req.body().is_empty() {
//!         req.logger().in_scope(|| tracing::warn!("empty body"));
//!         return Response::status(StatusCode::BAD_REQUEST);
//!     }
//!     Response::builder()
//!         .status(StatusCode::CREATED)
//!         .header("location", "/users/99")
//!         .json(req.body().to_vec())
//! }
//! ```
//!
//! Nothing is written unless the binary installs a `tracing` subscriber.
//! `tracing_subscriber::fmt().json()` prints each event as one JSON object
//! with the request span's fields under `span`. Pass a span of your own to
//! [`middleware::logging`] to nest every request span under it.

mod context;
mod error;
mod handler;
mod id;
mod request;
mod response;
mod router;
mod server;

pub mod log;
pub mod middleware;

#[cfg(test)]
mod testing;

pub use context::{
    Context, logger_from_context, logger_from_request, request_id_from_context,
    request_id_from_request, update_logger, with_logger, with_request_id,
};
pub use error::Error;
pub use handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
pub use http::{Method, StatusCode};
pub use id::{ParseRequestIdError, RequestId};
pub use log::Logger;
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
