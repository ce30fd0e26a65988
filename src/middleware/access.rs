use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use http::StatusCode;

use super::Middleware;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::log::Logger;
use crate::request::Request;
use crate::response::Response;

/// Emits one `info` event per request once the handler has returned.
///
/// The event is emitted inside the request span, so it carries every field
/// recorded by the stages before this one. Its own fields are:
///
/// | field         | value                                   |
/// |---------------|-----------------------------------------|
/// | `method`      | request method                          |
/// | `proto`       | `HTTP/1.1`, `HTTP/2.0`, ...             |
/// | `request-url` | path and query as received              |
/// | `status`      | response status code                    |
/// | `size`        | response body length in bytes           |
/// | `duration`    | handler time in milliseconds, as float  |
///
/// If the handler panics or the request future is dropped before it
/// finishes, the record is still written, with `status` and `size` set to 0
/// and a message saying what happened. Panics carry on unwinding afterwards.
#[derive(Clone, Copy, Debug, Default)]
pub struct AccessLog;

impl Middleware for AccessLog {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        (move |req: Request| {
            let entry = Entry::start(&req);
            Logged { inner: next.call(req), entry: Some(entry) }
        })
        .into_boxed_handler()
    }
}

/// The handler's future, paired with the record it owes.
struct Logged {
    inner: BoxFuture,
    entry: Option<Entry>,
}

impl Future for Logged {
    type Output = Response;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Response> {
        let this = self.get_mut();
        let inner = &mut this.inner;
        match panic::catch_unwind(AssertUnwindSafe(|| inner.as_mut().poll(cx))) {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(res)) => {
                if let Some(entry) = this.entry.take() {
                    entry.emit(Some(res.status_code()), res.body().len(), "");
                }
                Poll::Ready(res)
            }
            Err(payload) => {
                if let Some(entry) = this.entry.take() {
                    entry.emit(None, 0, "handler panicked");
                }
                panic::resume_unwind(payload)
            }
        }
    }
}

impl Drop for Logged {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            entry.emit(None, 0, "request cancelled before completion");
        }
    }
}

struct Entry {
    logger: Logger,
    method: String,
    proto: &'static str,
    url: String,
    start: Instant,
}

impl Entry {
    fn start(req: &Request) -> Self {
        Self {
            logger: req.logger(),
            method: req.method().to_string(),
            proto: req.proto(),
            url: req.uri().to_string(),
            start: Instant::now(),
        }
    }

    fn emit(self, status: Option<StatusCode>, size: usize, message: &str) {
        let duration = self.start.elapsed().as_secs_f64() * 1000.0;
        let status = status.map_or(0, |s| s.as_u16());
        self.logger.in_scope(|| {
            tracing::info!(
                method = %self.method,
                proto = self.proto,
                "request-url" = %self.url,
                status,
                size,
                duration,
                "{message}"
            )
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::middleware::{Chain, InstallLogger};
    use crate::testing::{Capture, get};

    fn chain() -> Chain {
        Chain::new().with(InstallLogger::new(Logger::none())).with(AccessLog)
    }

    #[tokio::test]
    async fn times_the_handler() {
        let capture = Capture::start();
        let app = chain().then(|_req: Request| async {
            tokio::time::sleep(Duration::from_millis(15)).await;
            Response::text("slow")
        });

        app.call(get("/slow")).await;

        let line = &capture.lines()[0];
        assert!(line["duration"].as_f64().unwrap() >= 15.0);
        assert_eq!(line["size"], 4);
        assert_eq!(line["message"], "");
        assert_eq!(line["level"], "INFO");
        assert_eq!(line["span"]["name"], "request");
    }

    #[tokio::test]
    async fn logs_when_the_handler_panics() {
        let capture = Capture::start();
        let app = chain().then(|_req: Request| async {
            if true {
                panic!("boom");
            }
            Response::text("unreachable")
        });

        let joined = tokio::spawn(async move { app.call(get("/boom")).await }).await;

        assert!(joined.unwrap_err().is_panic());
        let lines = capture.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["status"], 0);
        assert_eq!(lines[0]["request-url"], "/boom");
        assert_eq!(lines[0]["message"], "handler panicked");
    }

    #[tokio::test]
    async fn logs_when_the_request_is_dropped() {
        let capture = Capture::start();
        let app = chain().then(|_req: Request| async {
            std::future::pending::<()>().await;
            Response::text("never")
        });

        let outcome = tokio::time::timeout(Duration::from_millis(10), app.call(get("/hang"))).await;

        assert!(outcome.is_err());
        let lines = capture.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["status"], 0);
        assert_eq!(lines[0]["size"], 0);
        assert_eq!(lines[0]["message"], "request cancelled before completion");
    }
}
