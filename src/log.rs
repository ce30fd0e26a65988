//! Request-scoped loggers on top of `tracing` spans.
//!
//! A [`Logger`] is a handle on one span plus the fields bound on it so far.
//! The span declares its fields up front, empty; binding a field records its
//! value on the span, so every event emitted inside the span carries it:
//!
//! ```rust
//! use reqlog::Logger;
//! use tracing::field::Empty;
//!
//! let logger = Logger::new(tracing::info_span!("import", tenant = Empty));
//! let scoped = logger.with("tenant", "acme");
//!
//! scoped.in_scope(|| tracing::info!(rows = 12, "import finished"));
//! ```
//!
//! Bindings are append-only. A key that is already bound keeps its first
//! value for the lifetime of the logger and all its children. A key the span
//! does not declare is kept on the logger but never reaches the output.

use std::fmt;
use std::iter;
use std::sync::{Arc, OnceLock};

use tracing::Span;

// ── Fields ────────────────────────────────────────────────────────────────────

/// An immutable, append-only list of bound fields.
///
/// Each binding is one `Arc` link pointing at the previous list, so cloning
/// and extending are both O(1) and children share their parent's storage.
#[derive(Clone, Default)]
pub struct Fields {
    head: Option<Arc<Link>>,
}

struct Link {
    key: &'static str,
    value: String,
    parent: Option<Arc<Link>>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.links().find(|l| l.key == key).map(|l| l.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.links().count()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Iterates in binding order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        let mut links: Vec<&Link> = self.links().collect();
        links.reverse();
        links.into_iter().map(|l| (l.key, l.value.as_str()))
    }

    fn push(&self, key: &'static str, value: String) -> Self {
        Self { head: Some(Arc::new(Link { key, value, parent: self.head.clone() })) }
    }

    fn links(&self) -> impl Iterator<Item = &Link> {
        iter::successors(self.head.as_deref(), |l| l.parent.as_deref())
    }
}

impl fmt::Debug for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// ── Logger ────────────────────────────────────────────────────────────────────

static GLOBAL: OnceLock<Logger> = OnceLock::new();

/// A span and the fields bound on it.
#[derive(Clone)]
pub struct Logger {
    span: Span,
    fields: Fields,
}

impl Logger {
    pub fn new(span: Span) -> Self {
        Self { span, fields: Fields::new() }
    }

    /// A logger without a span of its own. Events emitted through it land in
    /// whatever span is current.
    pub fn none() -> Self {
        Self::new(Span::none())
    }

    /// The process-wide default logger.
    ///
    /// Used whenever a logger is looked up and none was bound. Unless
    /// [`set_global`](Logger::set_global) ran first, it is [`Logger::none`].
    pub fn global() -> &'static Logger {
        GLOBAL.get_or_init(Logger::none)
    }

    /// Installs the process-wide default. Only the first call (or the first
    /// use of [`global`](Logger::global)) wins; later calls hand the logger back.
    pub fn set_global(logger: Logger) -> Result<(), Logger> {
        GLOBAL.set(logger)
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Runs `f` inside the span, so `tracing` events emitted by `f` carry
    /// every bound field.
    pub fn in_scope<F: FnOnce() -> T, T>(&self, f: F) -> T {
        self.span.in_scope(f)
    }

    /// A child logger with `key` bound to `value`, unless `key` is already
    /// bound, in which case the child is identical to `self`.
    pub fn with(&self, key: &'static str, value: impl Into<String>) -> Self {
        if self.fields.get(key).is_some() {
            return self.clone();
        }
        let value = value.into();
        self.span.record(key, value.as_str());
        Self { span: self.span.clone(), fields: self.fields.push(key, value) }
    }

    /// A child logger with every pair from `fields` bound, in order.
    pub fn with_fields<V>(&self, fields: impl IntoIterator<Item = (&'static str, V)>) -> Self
    where
        V: Into<String>,
    {
        fields.into_iter().fold(self.clone(), |acc, (k, v)| acc.with(k, v))
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("span", &self.span.metadata().map(|m| m.name()))
            .field("fields", &self.fields)
            .finish()
    }
}
