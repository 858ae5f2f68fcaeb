//! Shared fixtures for integration tests.
#![allow(dead_code)]

use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

use qmr_proxyd::relay::EventRelay;
use qmr_proxyd::sources::ConfigResolver;
use qmr_proxyd::supervisor::{CoreLauncher, Supervisor, SupervisorOptions};
use qmr_proxyd::sysproxy::{SystemProxy, SystemProxyError, SystemProxyState};

/// Core config served by the mock subscription server.
pub fn core_yaml(controller: &str) -> String {
    format!(
        "mixed-port: 7891\nexternal-controller: {}\nproxies:\n  - name: node-a\n    type: ss\nproxy-groups:\n  - name: auto\n    type: select\n",
        controller
    )
}

#[derive(Clone)]
struct SubscriptionState {
    body: Arc<String>,
    hits: Arc<AtomicUsize>,
}

/// Mock subscription provider.
///
/// `/sub` and `/alt` serve the YAML body (and count hits), `/empty` an empty
/// body, `/missing` a 404, `/slow` never answers in time.
pub struct MockSubscription {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl MockSubscription {
    pub async fn start(body: String) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let state = SubscriptionState {
            body: Arc::new(body),
            hits: hits.clone(),
        };

        async fn serve_body(State(state): State<SubscriptionState>) -> String {
            state.hits.fetch_add(1, Ordering::SeqCst);
            state.body.as_ref().clone()
        }

        let app = Router::new()
            .route("/sub", get(serve_body))
            .route("/alt", get(serve_body))
            .route("/empty", get(|| async { "" }))
            .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "gone") }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .with_state(state);

        let addr = serve(app).await;
        Self { addr, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Mock core external-controller answering `/version`.
pub async fn start_mock_controller() -> SocketAddr {
    let app = Router::new().route("/version", get(|| async { r#"{"version":"mock"}"# }));
    serve(app).await
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Temp directory holding the sources file and profile directories.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new(sources: &[String]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sources.txt"), sources.join("\n")).unwrap();
        Self { dir }
    }

    pub fn sources_file(&self) -> PathBuf {
        self.dir.path().join("sources.txt")
    }

    pub fn base_dir(&self) -> PathBuf {
        self.dir.path().join("profiles")
    }

    pub fn resolver(&self, timeout: Duration) -> ConfigResolver {
        ConfigResolver::new(self.sources_file(), self.base_dir(), timeout, "clash.meta").unwrap()
    }
}

/// `/bin/sh` stand-in for the core; the script sees the profile directory as `$1`.
pub fn sh_core(script: &str) -> CoreLauncher {
    CoreLauncher::new(
        "/bin/sh",
        vec!["-c".into(), script.into(), "core".into(), "{dir}".into()],
    )
}

/// Long-running core that prints one line to each stream.
pub const STEADY_CORE: &str = "echo core up in $1; echo warming >&2; exec sleep 30";

/// Exits with an error on the first run, stays up on later runs.
pub const FLAKY_ONCE_CORE: &str =
    "if [ -f \"$1/ran\" ]; then exec sleep 30; fi; touch \"$1/ran\"; sleep 0.4; exit 1";

/// Always exits with code 3 after a short while.
pub const CRASHING_CORE: &str = "sleep 0.4; exit 3";

pub fn fast_options() -> SupervisorOptions {
    SupervisorOptions {
        auto_restart: false,
        restart_delay: Duration::from_millis(300),
        warmup: Duration::from_millis(100),
        stop_timeout: Duration::from_secs(2),
        readiness: None,
        proxy_host: "127.0.0.1".into(),
        bypass: vec!["localhost".into(), "<local>".into()],
        rollback_on_failure: true,
    }
}

pub fn supervisor(
    workspace: &Workspace,
    launcher: CoreLauncher,
    proxy: Option<Arc<dyn SystemProxy>>,
    options: SupervisorOptions,
) -> Supervisor {
    Supervisor::new(
        options,
        workspace.resolver(Duration::from_secs(2)),
        launcher,
        proxy,
        EventRelay::new(64),
    )
}

/// System proxy whose writes always fail.
#[derive(Debug, Default)]
pub struct FailingSystemProxy;

impl SystemProxy for FailingSystemProxy {
    fn enable(&self, _server: &str, _bypass: &[String]) -> Result<(), SystemProxyError> {
        Err(SystemProxyError::Command {
            program: "gsettings".into(),
            status: "exit status: 1".into(),
            stderr: "No such schema".into(),
        })
    }

    fn disable(&self) -> Result<(), SystemProxyError> {
        Ok(())
    }

    fn current(&self) -> Result<SystemProxyState, SystemProxyError> {
        Ok(SystemProxyState::default())
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn wait_until<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
