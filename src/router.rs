//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. Register a path, get a
//! handler. A [`Chain`] mounted with [`Router::wrap`] runs around routing
//! itself, so unmatched requests are logged and tagged like any other.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{Chain, Pipeline};
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Each builder call returns `self` so registrations chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    chain: Chain,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), chain: Chain::new() }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them:
    ///
    /// ```rust,no_run
    /// # use reqlog::{Method, Request, Response, Router};
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn create_user(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::GET,  "/users/{id}", get_user)
    ///     .on(Method::POST, "/users",      create_user);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for `method`. Routes are fixed at startup, so this is a
    /// programming error rather than a runtime condition.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Runs `chain` around every request, matched or not.
    ///
    /// Calling it again appends: stages from earlier calls run first.
    pub fn wrap(mut self, chain: Chain) -> Self {
        self.chain = self.chain.extend(chain);
        self
    }

    pub(crate) fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }

    /// Seals the routing table behind the mounted chain.
    pub fn into_pipeline(self) -> Pipeline {
        let Self { routes, chain } = self;
        let table = Arc::new(Self { routes, chain: Chain::new() });

        let route = move |mut req: Request| {
            let table = Arc::clone(&table);
            async move {
                match table.lookup(req.method(), req.path()) {
                    Some((handler, params)) => {
                        req.params = params;
                        handler.call(req).await
                    }
                    None => Response::status(StatusCode::NOT_FOUND),
                }
            }
        };

        chain.then(route)
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;

    use super::*;
    use crate::middleware::{map_request, Middleware};

    async fn show(req: Request) -> Response {
        Response::text(format!("user {}", req.param("id").unwrap_or("?")))
    }

    fn request(method: Method, uri: &str) -> Request {
        http::Request::builder().method(method).uri(uri).body(Bytes::new()).unwrap().into()
    }

    #[tokio::test]
    async fn routes_by_method_and_path() {
        let app = Router::new().get("/users/{id}", show).into_pipeline();

        let res = app.call(request(Method::GET, "/users/42")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"user 42");

        let res = app.call(request(Method::POST, "/users/42")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);

        let res = app.call(request(Method::GET, "/nope")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    struct Mark(&'static str, Arc<Mutex<Vec<&'static str>>>);

    impl Middleware for Mark {
        fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
            let (mark, seen) = (self.0, Arc::clone(&self.1));
            map_request(next, move |req| {
                seen.lock().unwrap().push(mark);
                req
            })
        }
    }

    #[tokio::test]
    async fn repeated_wraps_stack_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .get("/users/{id}", show)
            .wrap(Chain::new().with(Mark("outer", Arc::clone(&seen))))
            .wrap(Chain::new().with(Mark("inner", Arc::clone(&seen))))
            .into_pipeline();

        let res = app.call(request(Method::GET, "/users/7")).await;

        assert_eq!(res.body(), b"user 7");
        assert_eq!(*seen.lock().unwrap(), ["outer", "inner"]);
    }
}
