//! Chained request dispatch
//!
//! A [`Dispatcher`] owns an ordered list of handlers and tries each in
//! registration order; the first one that reports handled wins. The root
//! path short-circuits to a fixed landing page, the crash-test path raises
//! a deliberate fault for the listener's panic barrier, and anything no
//! handler claims falls back to the not-found response.

use crate::entry::ContentStream;
use crate::reconcile::normalize_key;
use async_trait::async_trait;
use http::{Method, StatusCode};
use std::sync::Arc;
use tracing::info;

const DEFAULT_CRASH_PATH: &str = "/crash";

/// Response body produced by a handler
pub enum ReplyBody {
    Text(String),
    Html(String),
    Json(String),
    Stream(ContentStream),
}

/// Transport-neutral response: the listener adapter turns this into the
/// real HTTP response
pub struct Reply {
    pub status: StatusCode,
    pub body: ReplyBody,
}

impl Reply {
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: ReplyBody::Text(body.into()),
        }
    }

    pub fn html(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: ReplyBody::Html(body.into()),
        }
    }

    pub fn json(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: ReplyBody::Json(body.into()),
        }
    }

    pub fn stream(status: StatusCode, stream: ContentStream) -> Self {
        Self {
            status,
            body: ReplyBody::Stream(stream),
        }
    }
}

/// One link in the dispatch chain
///
/// `None` means "not handled here" and lets the dispatcher try the next
/// handler. Paths arrive already normalized (trimmed, case-folded).
#[async_trait]
pub trait Handler: Send + Sync {
    async fn serve(&self, method: &Method, path: &str) -> Option<Reply>;
}

/// Fixed terminal handler answering 404 for anything left unclaimed
pub struct NotFoundHandler;

impl NotFoundHandler {
    pub fn reply(&self, method: &Method, path: &str) -> Reply {
        Reply::text(
            StatusCode::NOT_FOUND,
            format!("Not found {}:{}\r\n", method, path),
        )
    }
}

#[async_trait]
impl Handler for NotFoundHandler {
    async fn serve(&self, method: &Method, path: &str) -> Option<Reply> {
        Some(self.reply(method, path))
    }
}

/// Ordered handler chain with landing-page and crash-test short circuits
pub struct Dispatcher {
    handlers: Vec<Arc<dyn Handler>>,
    not_found: NotFoundHandler,
    landing_page: String,
    crash_path: String,
}

impl Dispatcher {
    pub fn new(landing_page: impl Into<String>) -> Self {
        Self {
            handlers: Vec::new(),
            not_found: NotFoundHandler,
            landing_page: landing_page.into(),
            crash_path: DEFAULT_CRASH_PATH.to_string(),
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn with_crash_path(mut self, path: impl Into<String>) -> Self {
        self.crash_path = normalize_key(&path.into());
        self
    }

    /// Route one request through the chain
    ///
    /// # Panics
    ///
    /// Panics on the crash-test path. That is the point of it: the fault
    /// travels up to the listener's panic barrier, which answers 500 and
    /// reports the fault, proving the top-level failure path works.
    pub async fn dispatch(&self, method: &Method, path: &str) -> Reply {
        let path = normalize_key(path);

        if path == "/" {
            info!("serving landing page");
            return Reply::html(StatusCode::OK, self.landing_page.clone());
        }
        if path == self.crash_path {
            panic!("deliberate crash-test fault for {}", path);
        }

        for handler in &self.handlers {
            if let Some(reply) = handler.serve(method, &path).await {
                info!(path = %path, status = %reply.status, "request served");
                return reply;
            }
        }

        info!(path = %path, method = %method, "no handler claimed request");
        self.not_found.reply(method, &path)
    }
}
