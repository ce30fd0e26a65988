use super::{map_request, Middleware, REFERER_KEY, REMOTE_KEY, USER_AGENT_KEY};
use crate::context;
use crate::handler::BoxedHandler;
use crate::request::Request;

/// Records one piece of request metadata on the request logger.
///
/// Nothing is recorded when the value is missing or empty, so events never
/// carry blank `user-agent` or `referer` fields.
#[derive(Clone, Debug)]
pub struct Enrich {
    key: &'static str,
    source: fn(&Request) -> Option<String>,
}

impl Enrich {
    /// The peer address, `ip:port`, under `remote`.
    pub fn remote_addr() -> Self {
        Self {
            key: REMOTE_KEY,
            source: |req| req.remote_addr().map(|addr| addr.to_string()),
        }
    }

    /// The `User-Agent` request header, under `user-agent`.
    pub fn user_agent() -> Self {
        Self {
            key: USER_AGENT_KEY,
            source: |req| req.header("user-agent").map(str::to_owned),
        }
    }

    /// The `Referer` request header, under `referer`.
    pub fn referer() -> Self {
        Self {
            key: REFERER_KEY,
            source: |req| req.header("referer").map(str::to_owned),
        }
    }
}

impl Middleware for Enrich {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let Self { key, source } = self.clone();
        map_request(next, move |req| match source(&req).filter(|v| !v.is_empty()) {
            Some(value) => {
                let ctx = context::update_logger(req.context(), [(key, value)]);
                req.with_context(ctx)
            }
            None => req,
        })
    }
}
