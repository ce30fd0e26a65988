use std::sync::Arc;

use http::HeaderName;

use super::{Middleware, REQUEST_ID_HEADER, REQUEST_ID_KEY};
use crate::context;
use crate::handler::{BoxedHandler, Handler};
use crate::id::RequestId;
use crate::request::Request;

/// Gives every request exactly one [`RequestId`].
///
/// On the way in the id is settled once:
///
/// 1. an id already in the context is kept as is
/// 2. otherwise a well-formed id in the request header is adopted
/// 3. otherwise a fresh one is minted; a malformed header is logged at `warn`
///    first, with the rejected value under `input`
///
/// The id is recorded on the request logger under `uuid` unless the logger
/// already carries one. On the way out the same id replaces whatever the
/// handler put in the response header.
#[derive(Clone, Debug)]
pub struct RequestIdStage {
    header: HeaderName,
}

impl Default for RequestIdStage {
    fn default() -> Self {
        Self { header: HeaderName::from_static(REQUEST_ID_HEADER) }
    }
}

impl RequestIdStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header to read the client's id from and write the final id to.
    pub fn header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }

    fn reconcile(&self, req: Request) -> (Request, RequestId) {
        if let Some(id) = req.request_id() {
            if req.logger().field(REQUEST_ID_KEY).is_some() {
                return (req, id);
            }
            let ctx = context::update_logger(req.context(), [(REQUEST_ID_KEY, id.to_string())]);
            return (req.with_context(ctx), id);
        }

        let id = match req.headers().get(&self.header).filter(|v| !v.is_empty()) {
            None => RequestId::new(),
            Some(raw) => {
                let input = String::from_utf8_lossy(raw.as_bytes());
                match input.parse::<RequestId>() {
                    Ok(id) => id,
                    Err(e) => {
                        req.logger().in_scope(|| {
                            tracing::warn!(error = %e, input = %input, "invalid request id header")
                        });
                        RequestId::new()
                    }
                }
            }
        };

        let ctx = context::with_request_id(req.context(), id);
        let ctx = context::update_logger(&ctx, [(REQUEST_ID_KEY, id.to_string())]);
        (req.with_context(ctx), id)
    }
}

impl Middleware for RequestIdStage {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let stage = Arc::new(self.clone());
        (move |req: Request| {
            let next = Arc::clone(&next);
            let stage = Arc::clone(&stage);
            let (req, id) = stage.reconcile(req);
            async move {
                let mut res = next.call(req).await;
                res.set_header(stage.header.as_str(), id.to_string());
                res
            }
        })
        .into_boxed_handler()
    }
}
