//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the server:
//! 1. stops accepting new connections at once
//! 2. lets every in-flight connection task run to completion
//! 3. returns from [`Server::serve`], so `main` can exit cleanly
//!
//! Requests cut short by a client hanging up are still logged by the
//! [`AccessLog`](crate::middleware::AccessLog) stage, flagged as cancelled.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::middleware::Pipeline;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust
    /// use reqlog::Server;
    ///
    /// assert!(Server::bind("0.0.0.0:3000").is_ok());
    /// assert!(Server::bind("localhost").is_err());
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        Ok(Self { addr: addr.parse()? })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Starts accepting connections and dispatching them through `router`
    /// and the chain mounted on it.
    ///
    /// Returns only after a full graceful shutdown.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let pipeline = Arc::new(router.into_pipeline());

        info!(addr = %self.addr, "reqlog listening");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting at once,
                // even with connections still queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let pipeline = Arc::clone(&pipeline);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let pipeline = Arc::clone(&pipeline);
                            async move { dispatch(&pipeline, req, remote_addr).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished tasks so the set does not grow without bound.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("reqlog stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Buffers one request body and runs the request through the pipeline.
///
/// A body that fails to read skips the application and is answered `400`,
/// still through the chain so it is tagged and logged. Hyper never sees an
/// error.
async fn dispatch(
    pipeline: &Pipeline,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (head, body) = req.into_parts();
    let res = match body.collect().await {
        Ok(collected) => {
            let req = Request::from_parts(head, collected.to_bytes(), Some(remote_addr));
            pipeline.call(req).await
        }
        Err(e) => {
            warn!(peer = %remote_addr, error = %e, "failed to read request body");
            let req = Request::from_parts(head, Bytes::new(), Some(remote_addr));
            pipeline.respond(req, Response::status(StatusCode::BAD_REQUEST)).await
        }
    };
    Ok(res.into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT. Only Ctrl-C on non-Unix targets.
///
/// A signal that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::*;
    use crate::log::Logger;
    use crate::middleware;
    use crate::testing::Capture;

    /// Serves `app` on a free local port and sends `raw` over one connection.
    /// Returns whatever came back before the server closed it.
    async fn exchange(app: Router, raw: &[u8]) -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let server = Server::bind(&addr.to_string()).unwrap();
        tokio::spawn(server.serve(app));

        let mut stream = loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => break stream,
                Err(_) => tokio::time::sleep(Duration::from_millis(5)).await,
            }
        };
        stream.write_all(raw).await.unwrap();

        let mut out = Vec::new();
        // The server may reset the connection after a malformed body.
        let _ = stream.read_to_end(&mut out).await;
        String::from_utf8_lossy(&out).into_owned()
    }

    fn ping(base: Logger) -> Router {
        Router::new()
            .get("/ping", |_req: Request| async { "pong" })
            .post("/p", |_req: Request| async { "accepted" })
            .wrap(middleware::logging(base))
    }

    #[tokio::test]
    async fn serves_and_logs_over_tcp() {
        let capture = Capture::start();
        let raw = exchange(
            ping(Logger::none()),
            b"GET /ping HTTP/1.1\r\nhost: test\r\nx-request-id: cfrj1ro330reqgvfpgu0\r\nconnection: close\r\n\r\n",
        )
        .await;

        assert!(raw.starts_with("HTTP/1.1 200 OK"));
        assert!(raw.contains("x-request-id: cfrj1ro330reqgvfpgu0"));
        assert!(raw.ends_with("pong"));

        let records = capture.requests();
        assert_eq!(records.len(), 1);
        let line = &records[0];
        assert_eq!(line["span"]["uuid"], "cfrj1ro330reqgvfpgu0");
        assert_eq!(line["request-url"], "/ping");
        assert_eq!(line["status"], 200);
        assert!(line["span"]["remote"].as_str().unwrap().starts_with("127.0.0.1:"));
    }

    #[tokio::test]
    async fn unreadable_body_is_answered_and_logged() {
        let capture = Capture::start();
        let raw = exchange(
            ping(Logger::none()),
            b"POST /p HTTP/1.1\r\nhost: test\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\nzz\r\n",
        )
        .await;

        assert!(raw.starts_with("HTTP/1.1 400 Bad Request"), "{raw}");
        assert!(!raw.contains("accepted"));
        let header = raw
            .lines()
            .find_map(|l| l.strip_prefix("x-request-id: "))
            .expect("response carries a request id");

        let records = capture.requests();
        assert_eq!(records.len(), 1);
        let line = &records[0];
        assert_eq!(line["status"], 400);
        assert_eq!(line["method"], "POST");
        assert_eq!(line["request-url"], "/p");
        assert_eq!(line["span"]["uuid"], header.trim());

        let warned = capture
            .lines()
            .into_iter()
            .any(|l| l["message"] == "failed to read request body" && l["level"] == "WARN");
        assert!(warned);
    }

    #[tokio::test]
    async fn service_span_fields_stay_on_the_service_span() {
        let capture = Capture::start();
        let base = Logger::new(tracing::info_span!("service", uuid = "service-boot"));
        let raw = exchange(
            ping(base),
            b"GET /ping HTTP/1.1\r\nhost: test\r\nconnection: close\r\n\r\n",
        )
        .await;

        let header = raw
            .lines()
            .find_map(|l| l.strip_prefix("x-request-id: "))
            .expect("response carries a request id")
            .trim()
            .to_owned();
        assert_ne!(header, "service-boot");

        let records = capture.requests();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["span"]["uuid"], header);
        assert_eq!(records[0]["spans"][0]["uuid"], "service-boot");
    }
}
