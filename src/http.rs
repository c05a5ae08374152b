use crate::assembler::Assembler;
use crate::assets;
use crate::collectors::SystemProbe;
use crate::config::Config;
use crate::metrics::Metrics;
use crate::session::{ChannelTransport, Session};
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, serve, Router};
use futures_util::stream;
use std::convert::Infallible;
use std::future::{Future, IntoFuture};
use std::net::{AddrParseError, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, info_span, Instrument};

/// Frames buffered per client before `flush` starts waiting on it.
const STREAM_BUFFER: usize = 4;

pub type ProbeFactory = Arc<dyn Fn() -> Box<dyn SystemProbe + Send> + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub metrics: Arc<Metrics>,
    pub probe_factory: ProbeFactory,
    next_session_id: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(config: Config, metrics: Arc<Metrics>, probe_factory: ProbeFactory) -> Self {
        Self {
            config: Arc::new(config),
            metrics,
            probe_factory,
            next_session_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("некорректный адрес listen '{listen}': {source}")]
    InvalidAddress {
        listen: String,
        source: AddrParseError,
    },
    #[error("не удалось запустить HTTP-сервер на {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

/// The bound listener together with the router it serves. Built once at
/// startup.
pub struct Server {
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
}

impl Server {
    pub async fn bind(state: AppState) -> Result<Self, StartupError> {
        let addr: SocketAddr =
            state
                .config
                .listen
                .parse()
                .map_err(|source| StartupError::InvalidAddress {
                    listen: state.config.listen.clone(),
                    source,
                })?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| StartupError::Bind { addr, source })?;
        let local_addr = listener.local_addr().unwrap_or(addr);

        Ok(Self {
            listener,
            router: build_router(state),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves until `shutdown` resolves. Event streams never finish on their
    /// own, so open sessions are dropped instead of drained.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> std::io::Result<()> {
        info!(listen = %self.local_addr, "HTTP-сервер запущен");
        tokio::select! {
            res = serve(self.listener, self.router).into_future() => res,
            _ = shutdown => Ok(()),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/sys-info", get(sys_info_handler))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .fallback(static_handler)
        .with_state(state)
}

async fn sys_info_handler(State(state): State<AppState>) -> Response {
    let id = state.next_session_id.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = mpsc::channel::<Bytes>(STREAM_BUFFER);

    let session_state = state.clone();
    tokio::spawn(
        async move {
            let probe = (session_state.probe_factory)();
            let assembler = Assembler::new(
                probe,
                session_state.config.disk_mount.clone(),
                session_state.config.processes,
            );
            Session::new(
                assembler,
                ChannelTransport::new(tx),
                session_state.metrics.clone(),
            )
            .run()
            .await
        }
        .instrument(info_span!("session", id)),
    );

    let body = Body::from_stream(stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|chunk| (Ok::<_, Infallible>(chunk), rx))
    }));

    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    state.metrics.inc_scrape_count();
    match state.metrics.encode_metrics() {
        Ok(encoded) => {
            let mut response = Response::new(Body::from(encoded));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("ошибка кодирования метрик: {err}"),
        )
            .into_response(),
    }
}

async fn static_handler(State(state): State<AppState>, uri: Uri) -> Response {
    assets::load(&state.config.ui_dir, uri.path()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::fake::FakeProbe;
    use axum::body::to_bytes;
    use axum::http::Request;
    use futures_util::StreamExt;
    use std::sync::atomic::AtomicUsize;
    use tower::ServiceExt;

    fn fake_state(config: Config) -> (AppState, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let factory: ProbeFactory = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::new(FakeProbe::new()) as Box<dyn SystemProbe + Send>
        });
        let metrics = Metrics::new().expect("инициализация метрик");
        (AppState::new(config, metrics, factory), created)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let (state, _) = fake_state(Config::default());
        let app = build_router(state);

        let response = app.oneshot(get_request("/healthz")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.as_ref(), b"ok");
    }

    #[tokio::test]
    async fn metrics_lists_session_counters() {
        let (state, _) = fake_state(Config::default());
        let app = build_router(state);

        let response = app.oneshot(get_request("/metrics")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("sysfeed_sessions_active"));
        assert!(text.contains("sysfeed_scrape_count_total 1"));
    }

    #[tokio::test(start_paused = true)]
    async fn sys_info_streams_events() {
        let (state, _) = fake_state(Config::default());
        let metrics = state.metrics.clone();
        let app = build_router(state);

        let response = app.oneshot(get_request("/sys-info")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/event-stream");
        assert_eq!(response.headers()[CACHE_CONTROL], "no-cache");
        assert_eq!(response.headers()[CONNECTION], "keep-alive");

        let mut body = response.into_body().into_data_stream();
        let chunk = body.next().await.expect("событие").expect("тело потока");
        let text = String::from_utf8(chunk.to_vec()).unwrap();
        assert!(text.starts_with("event:sysInfo\ndata:{\"memory\":"));
        assert!(text.ends_with("}\n\n"));
        assert_eq!(metrics.sysfeed_sessions_active.get(), 1.0);

        drop(body);
        while metrics.sysfeed_sessions_active.get() > 0.0 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(
            metrics
                .sysfeed_sessions_ended_total
                .with_label_values(&["disconnected"])
                .get(),
            1.0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn each_client_gets_its_own_probe() {
        let (state, created) = fake_state(Config::default());
        let app = build_router(state);

        let first = app.clone().oneshot(get_request("/sys-info")).await.unwrap();
        let second = app.oneshot(get_request("/sys-info")).await.unwrap();
        let mut first = first.into_body().into_data_stream();
        let mut second = second.into_body().into_data_stream();

        first.next().await.expect("событие").unwrap();
        second.next().await.expect("событие").unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_paths_serve_ui_bundle() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();
        let (state, _) = fake_state(Config {
            ui_dir: dir.path().to_path_buf(),
            ..Config::default()
        });
        let app = build_router(state);

        let index = app.clone().oneshot(get_request("/")).await.unwrap();
        assert_eq!(index.status(), StatusCode::OK);
        let script = app.clone().oneshot(get_request("/app.js")).await.unwrap();
        assert_eq!(
            script.headers()[CONTENT_TYPE],
            "text/javascript; charset=utf-8"
        );
        let missing = app.oneshot(get_request("/missing.css")).await.unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bind_failure_is_startup_error() {
        let (state, _) = fake_state(Config {
            listen: "127.0.0.1:0".to_string(),
            ..Config::default()
        });
        let server = Server::bind(state).await.expect("первый bind");

        let (taken, _) = fake_state(Config {
            listen: server.local_addr().to_string(),
            ..Config::default()
        });
        assert!(matches!(
            Server::bind(taken).await,
            Err(StartupError::Bind { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_listen_is_startup_error() {
        let (state, _) = fake_state(Config {
            listen: "not-an-address".to_string(),
            ..Config::default()
        });
        assert!(matches!(
            Server::bind(state).await,
            Err(StartupError::InvalidAddress { .. })
        ));
    }
}
