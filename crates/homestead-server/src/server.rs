//! HTTP routing and listener lifecycle
//!
//! Every request falls through one axum route into the dispatcher; a
//! catch-panic layer guarantees a failing request still gets a response
//! and the fault is reported, instead of taking down the listener.

use crate::error::{Result, ServerError};
use crate::types::ServerConfig;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::Response;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use http::{header, StatusCode};
use refreshable_cache::{ContentStream, Dispatcher, Reply, ReplyBody};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};

/// Create the HTTP router
pub fn create_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        .with_state(dispatcher)
}

/// Hand every request to the dispatcher chain
async fn dispatch(State(dispatcher): State<Arc<Dispatcher>>, request: Request) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    into_response(dispatcher.dispatch(&method, &path).await)
}

fn into_response(reply: Reply) -> Response {
    let builder = Response::builder().status(reply.status);
    let built = match reply.body {
        ReplyBody::Text(text) => builder
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Body::from(text)),
        ReplyBody::Html(html) => builder
            .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
            .body(Body::from(html)),
        ReplyBody::Json(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json)),
        ReplyBody::Stream(ContentStream::Bytes(bytes)) => builder.body(Body::from(bytes)),
        ReplyBody::Stream(ContentStream::File(file)) => {
            builder.body(Body::from_stream(ReaderStream::new(file)))
        }
    };
    built.unwrap_or_else(|e| {
        error!(error = %e, "failed to build response");
        plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Sorry")
    })
}

/// Convert an escaped fault into a response, after reporting it
fn handle_panic(fault: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = fault.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = fault.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown fault".to_string()
    };
    error!(fault = %detail, "request handler crashed");
    plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Sorry")
}

fn plain_response(status: StatusCode, body: &'static str) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}

/// Listener lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Owns the bound network listeners: one plain port, plus a TLS port when
/// certificate material is present on disk
///
/// Transitions are one-directional (Created → Starting → Running →
/// Stopping → Stopped). Stopping waits for every bound listener to close;
/// a second stop while one is in progress is a no-op.
pub struct HttpListener {
    router: Router,
    address: IpAddr,
    port: u16,
    ssl_port: u16,
    tls_cert: PathBuf,
    tls_key: PathBuf,
    phase: Mutex<Phase>,
    handles: Mutex<Vec<Handle>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl HttpListener {
    pub fn new(router: Router, config: &ServerConfig) -> Self {
        Self {
            router,
            address: config.address,
            port: config.port,
            ssl_port: config.ssl_port,
            tls_cert: config.tls_cert.clone(),
            tls_key: config.tls_key.clone(),
            phase: Mutex::new(Phase::Created),
            handles: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub async fn phase(&self) -> Phase {
        *self.phase.lock().await
    }

    /// Addresses the listeners are actually bound to
    pub async fn local_addrs(&self) -> Vec<SocketAddr> {
        let handles = self.handles.lock().await.clone();
        let mut addrs = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Some(addr) = handle.listening().await {
                addrs.push(addr);
            }
        }
        addrs
    }

    /// Bind all listeners and wait until they accept connections
    pub async fn start(&self) -> Result<()> {
        {
            let mut phase = self.phase.lock().await;
            if *phase != Phase::Created {
                return Err(ServerError::Bind(format!(
                    "cannot start a listener in the {:?} phase",
                    *phase
                )));
            }
            *phase = Phase::Starting;
        }

        let plain_addr = SocketAddr::new(self.address, self.port);
        let plain_handle = Handle::new();
        {
            let app = self.router.clone();
            let handle = plain_handle.clone();
            info!(address = %plain_addr, "plain listener starting");
            self.tasks.lock().await.push(tokio::spawn(async move {
                if let Err(e) = axum_server::bind(plain_addr)
                    .handle(handle)
                    .serve(app.into_make_service())
                    .await
                {
                    error!(address = %plain_addr, error = %e, "plain listener terminated");
                }
            }));
        }
        self.handles.lock().await.push(plain_handle);

        if self.tls_cert.exists() && self.tls_key.exists() {
            let tls = RustlsConfig::from_pem_file(&self.tls_cert, &self.tls_key)
                .await
                .map_err(|e| ServerError::Tls(Box::new(e)))?;
            let tls_addr = SocketAddr::new(self.address, self.ssl_port);
            let tls_handle = Handle::new();
            let app = self.router.clone();
            let handle = tls_handle.clone();
            info!(address = %tls_addr, "tls listener starting");
            self.tasks.lock().await.push(tokio::spawn(async move {
                if let Err(e) = axum_server::bind_rustls(tls_addr, tls)
                    .handle(handle)
                    .serve(app.into_make_service())
                    .await
                {
                    error!(address = %tls_addr, error = %e, "tls listener terminated");
                }
            }));
            self.handles.lock().await.push(tls_handle);
        } else {
            info!("no certificate material found, tls listener disabled");
        }

        // listening() resolves to None when a listener dies before binding
        let handles = self.handles.lock().await.clone();
        for handle in handles {
            if handle.listening().await.is_none() {
                self.stop().await;
                return Err(ServerError::Bind("listener failed to bind".to_string()));
            }
        }

        let mut phase = self.phase.lock().await;
        if *phase == Phase::Starting {
            *phase = Phase::Running;
            info!("all listeners running");
        }
        Ok(())
    }

    /// Drain and close every listener
    ///
    /// Safe to call from concurrent shutdown paths: only the first call
    /// does the work.
    pub async fn stop(&self) {
        {
            let mut phase = self.phase.lock().await;
            match *phase {
                Phase::Stopping | Phase::Stopped => {
                    debug!("stop already in progress");
                    return;
                }
                _ => *phase = Phase::Stopping,
            }
        }
        info!("stopping listeners");

        let handles: Vec<Handle> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            handle.graceful_shutdown(Some(Duration::from_secs(10)));
        }
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                debug!(error = %e, "listener task join failed");
            }
        }

        *self.phase.lock().await = Phase::Stopped;
        info!("all listeners stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LANDING_PAGE;
    use http::Method;
    use refreshable_cache::{FilesystemSource, Handler, RefreshableCache};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;
    use tower::ServiceExt;

    fn write(root: &Path, rel: &str, contents: &str) {
        let full = root.join(rel);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(full, contents).expect("write fixture file");
    }

    async fn mounted_router(root: &Path) -> (Router, Arc<RefreshableCache>) {
        let source = FilesystemSource::new(root, root);
        let cache = RefreshableCache::new(
            "/api/static",
            Box::new(source),
            Duration::from_secs(300),
        );
        cache.refresh().await;
        let dispatcher =
            Dispatcher::new(LANDING_PAGE).with_handler(cache.clone() as Arc<dyn Handler>);
        (create_router(Arc::new(dispatcher)), cache)
    }

    async fn get(router: Router, path: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri(path)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn test_home_page() {
        let router = create_router(Arc::new(Dispatcher::new(LANDING_PAGE)));
        let (status, body) = get(router, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Simple home page"));
    }

    #[tokio::test]
    async fn test_not_found_names_method_and_path() {
        let router = create_router(Arc::new(Dispatcher::new(LANDING_PAGE)));
        let (status, body) = get(router, "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "Not found GET:/nope\r\n");
    }

    #[tokio::test]
    async fn test_crash_path_is_contained() {
        let router = create_router(Arc::new(Dispatcher::new(LANDING_PAGE)));
        let (status, body) = get(router, "/crash").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Sorry");
    }

    #[tokio::test]
    async fn test_serves_file_content() {
        let dir = tempdir().expect("tempdir");
        write(dir.path(), "a.txt", "hello");
        let (router, _cache) = mounted_router(dir.path()).await;

        let (status, body) = get(router.clone(), "/a.txt").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "hello");

        let (status, _) = get(router, "/missing.txt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_colliding_sources_surface_as_error() {
        let dir = tempdir().expect("tempdir");
        write(dir.path(), "A.txt", "upper");
        write(dir.path(), "a.txt", "lower");
        let (router, _cache) = mounted_router(dir.path()).await;

        let (status, _) = get(router.clone(), "/a.txt").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, body) = get(router, "/api/static/diagnostics").await;
        assert_eq!(status, StatusCode::OK);
        let listing: serde_json::Value = serde_json::from_str(&body).expect("diagnostics json");
        assert!(listing["/a.txt"]
            .as_str()
            .expect("listed key")
            .contains("ambiguous"));
    }

    #[tokio::test]
    async fn test_refresh_endpoint_responds_immediately() {
        let dir = tempdir().expect("tempdir");
        let (router, _cache) = mounted_router(dir.path()).await;
        let (status, body) = get(router, "/api/static/refresh").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Refreshing...");
    }

    #[tokio::test]
    async fn test_index_promotion_end_to_end() {
        let dir = tempdir().expect("tempdir");
        write(dir.path(), "docs/index.html", "<html>docs</html>");
        let (router, _cache) = mounted_router(dir.path()).await;

        for path in ["/docs", "/docs/", "/docs/index.html"] {
            let (status, body) = get(router.clone(), path).await;
            assert_eq!(status, StatusCode::OK, "{} must resolve", path);
            assert_eq!(body, "<html>docs</html>");
        }
    }

    fn test_config() -> ServerConfig {
        ServerConfig {
            address: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            ssl_port: 0,
            use_fs: false,
            static_root: PathBuf::from("http_files"),
            manifest_url: None,
            refresh_interval: Duration::from_secs(300),
            tls_key: PathBuf::from("missing/privkey.pem"),
            tls_cert: PathBuf::from("missing/fullchain.pem"),
        }
    }

    #[tokio::test]
    async fn test_listener_lifecycle() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let router = create_router(Arc::new(Dispatcher::new(LANDING_PAGE)));
        let listener = HttpListener::new(router, &test_config());
        assert_eq!(listener.phase().await, Phase::Created);

        listener.start().await.expect("start");
        assert_eq!(listener.phase().await, Phase::Running);

        let addrs = listener.local_addrs().await;
        assert_eq!(addrs.len(), 1, "tls must stay disabled without certs");

        let mut stream = tokio::net::TcpStream::connect(addrs[0])
            .await
            .expect("connect");
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .expect("send request");
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.expect("read response");
        let text = String::from_utf8_lossy(&raw);
        assert!(text.starts_with("HTTP/1.1 200"));
        assert!(text.contains("Simple home page"));

        listener.stop().await;
        assert_eq!(listener.phase().await, Phase::Stopped);

        // stopping again is a no-op, and a stopped listener never restarts
        listener.stop().await;
        assert_eq!(listener.phase().await, Phase::Stopped);
        assert!(listener.start().await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_stops_are_safe() {
        let router = create_router(Arc::new(Dispatcher::new(LANDING_PAGE)));
        let listener = Arc::new(HttpListener::new(router, &test_config()));
        listener.start().await.expect("start");

        let first = {
            let listener = Arc::clone(&listener);
            tokio::spawn(async move { listener.stop().await })
        };
        let second = {
            let listener = Arc::clone(&listener);
            tokio::spawn(async move { listener.stop().await })
        };
        first.await.expect("first stop");
        second.await.expect("second stop");
        assert_eq!(listener.phase().await, Phase::Stopped);
    }
}
