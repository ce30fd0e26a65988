//! Request ids and access logs in front of a few JSON endpoints.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42
//!   curl -i -H 'x-request-id: cfrj1ro330reqgvfpgu0' http://localhost:3000/users/42
//!   curl -i -H 'x-request-id: nope' http://localhost:3000/users/42
//!   curl -i -X POST http://localhost:3000/users -d '{"name":"alice"}'
//!
//! Each request prints one access event whose request span carries the same
//! `uuid` as the `x-request-id` response header.

use reqlog::{Logger, Request, Response, Router, Server, StatusCode, middleware};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), reqlog::Error> {
    tracing_subscriber::fmt()
        .json()
        .flatten_event(true)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app = Router::new()
        .get("/users/{id}", get_user)
        .post("/users", create_user)
        .delete("/users/{id}", delete_user)
        .wrap(middleware::logging(Logger::new(tracing::info_span!("users-api"))));

    Server::bind("0.0.0.0:3000")?.serve(app).await
}

async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    req.logger().in_scope(|| tracing::info!(user = id, "fetching user"));
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#).into_bytes())
}

async fn create_user(req: Request) -> Response {
    if req.body().is_empty() {
        req.logger().in_scope(|| tracing::warn!("rejecting empty body"));
        return Response::status(StatusCode::BAD_REQUEST);
    }

    Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/users/99")
        .json(r#"{"id":"99","name":"new_user"}"#.to_owned().into_bytes())
}

async fn delete_user(_req: Request) -> StatusCode {
    StatusCode::NO_CONTENT
}
