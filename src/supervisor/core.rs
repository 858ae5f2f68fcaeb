//! Proxy-core process supervisor.
//!
//! # Responsibilities
//! - Own at most one core process and keep `is_running()` truthful
//! - Run the start sequence: resolve → spawn → readiness → system proxy
//! - Relay process output and lifecycle transitions
//! - Restart after unexpected exits when asked to
//!
//! # Design Decisions
//! - `start`, `stop` and `restart` are serialized through one async lock;
//!   a start that finds a running core returns `AlreadyRunning` instead of
//!   queuing a second process
//! - Each operation runs on its own task, so a dropped caller never leaves
//!   the state at `Starting`
//! - A per-run watcher task owns the `Child`; it is the only place exits are observed
//! - Handles are tagged with a run id so a late exit never clears a newer run
//! - System-proxy failure during start kills the core unless
//!   `rollback_on_failure` is off
//! - An exit followed by a restart that never runs (stopped, switched off,
//!   failed) still disables the system proxy

use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::{oneshot, watch};
use tokio::time;
use uuid::Uuid;

use crate::config::DaemonConfig;
use crate::observability::metrics;
use crate::relay::{CoreEvent, EventRelay};
use crate::sources::{ConfigResolver, ResolvedConfig, SourceSelector};
use crate::supervisor::error::{SupervisorError, SupervisorResult};
use crate::supervisor::launcher::CoreLauncher;
use crate::supervisor::readiness::ReadinessProbe;
use crate::supervisor::state::CoreState;
use crate::sysproxy::{self, SystemProxy, SystemProxyError, SystemProxyState};

/// Tunables for the supervisor, usually derived from [`DaemonConfig`].
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub auto_restart: bool,
    pub restart_delay: Duration,
    /// Fixed wait used when `readiness` is `None`.
    pub warmup: Duration,
    pub stop_timeout: Duration,
    pub readiness: Option<ReadinessProbe>,
    pub proxy_host: String,
    pub bypass: Vec<String>,
    pub rollback_on_failure: bool,
}

impl SupervisorOptions {
    pub fn from_config(config: &DaemonConfig) -> Result<Self, reqwest::Error> {
        let readiness = if config.readiness.enabled {
            Some(ReadinessProbe::new(&config.readiness)?)
        } else {
            None
        };

        Ok(Self {
            auto_restart: config.supervisor.auto_restart,
            restart_delay: Duration::from_millis(config.supervisor.restart_delay_ms),
            warmup: Duration::from_millis(config.supervisor.warmup_ms),
            stop_timeout: Duration::from_secs(config.supervisor.stop_timeout_secs),
            readiness,
            proxy_host: config.system_proxy.host.clone(),
            bypass: config.system_proxy.bypass.clone(),
            rollback_on_failure: config.system_proxy.rollback_on_failure,
        })
    }
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            auto_restart: false,
            restart_delay: Duration::from_secs(5),
            warmup: Duration::from_secs(2),
            stop_timeout: Duration::from_secs(5),
            readiness: None,
            proxy_host: "127.0.0.1".to_string(),
            bypass: Vec::new(),
            rollback_on_failure: true,
        }
    }
}

/// Result of a successful `start` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    Started {
        run_id: Uuid,
        pid: Option<u32>,
        source: String,
        config_path: PathBuf,
        proxy_port: u16,
    },
    /// A core was already running; nothing was changed.
    AlreadyRunning { run_id: Uuid, source: String },
}

/// Result of a successful `stop` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StopOutcome {
    Stopped { run_id: Uuid, exit_code: Option<i32> },
    NotRunning,
}

/// Snapshot returned by `status()`.
#[derive(Debug, Clone, Serialize)]
pub struct CoreStatus {
    pub state: CoreState,
    pub running: bool,
    pub pid: Option<u32>,
    pub run_id: Option<Uuid>,
    pub source: Option<String>,
    pub config_path: Option<PathBuf>,
    pub proxy_port: Option<u16>,
    pub external_controller: Option<String>,
    pub auto_restart: bool,
    /// Backend name of the OS proxy store, `None` when management is off.
    pub system_proxy: Option<&'static str>,
    pub restarts: u64,
    pub uptime_secs: Option<u64>,
    pub last_error: Option<String>,
    pub proxies: Vec<String>,
    pub groups: Vec<String>,
}

#[derive(Debug, Clone)]
struct ExitInfo {
    code: Option<i32>,
    success: bool,
    description: String,
}

impl ExitInfo {
    fn from_status(status: std::io::Result<ExitStatus>) -> Self {
        match status {
            Ok(status) => Self {
                code: status.code(),
                success: status.success(),
                description: status.to_string(),
            },
            Err(e) => Self {
                code: None,
                success: false,
                description: format!("wait failed: {}", e),
            },
        }
    }

    fn unknown() -> Self {
        Self {
            code: None,
            success: false,
            description: "exit status unavailable".to_string(),
        }
    }
}

struct CoreHandle {
    run_id: Uuid,
    pid: Option<u32>,
    source: String,
    started_at: Instant,
    /// Set once termination was requested by us.
    killed: bool,
    kill_tx: Option<oneshot::Sender<()>>,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
}

#[derive(Default)]
struct Shared {
    state: CoreState,
    handle: Option<CoreHandle>,
    last_resolved: Option<ResolvedConfig>,
    last_selector: Option<SourceSelector>,
    last_error: Option<String>,
    restarts: u64,
    /// Bumped by `stop`; a pending auto-restart only fires if unchanged.
    restart_epoch: u64,
    /// An unexpected exit left the OS proxy enabled for a restart that has not run yet.
    restart_pending: bool,
}

struct Inner {
    options: SupervisorOptions,
    resolver: ConfigResolver,
    launcher: CoreLauncher,
    system_proxy: Option<Arc<dyn SystemProxy>>,
    relay: EventRelay,
    auto_restart: AtomicBool,
    op_lock: tokio::sync::Mutex<()>,
    shared: Mutex<Shared>,
}

/// Owns the proxy-core process. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(
        options: SupervisorOptions,
        resolver: ConfigResolver,
        launcher: CoreLauncher,
        system_proxy: Option<Arc<dyn SystemProxy>>,
        relay: EventRelay,
    ) -> Self {
        let auto_restart = AtomicBool::new(options.auto_restart);
        Self {
            inner: Arc::new(Inner {
                options,
                resolver,
                launcher,
                system_proxy,
                relay,
                auto_restart,
                op_lock: tokio::sync::Mutex::new(()),
                shared: Mutex::new(Shared::default()),
            }),
        }
    }

    /// Wire up everything from the daemon config with the platform's system proxy backend.
    pub fn from_config(config: &DaemonConfig, relay: EventRelay) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let options = SupervisorOptions::from_config(config)?;
        let resolver = ConfigResolver::from_config(&config.core, &config.resolver)?;
        let launcher = CoreLauncher::from_config(&config.core);
        let system_proxy = if config.system_proxy.enabled {
            let proxy = sysproxy::platform_default();
            tracing::info!(backend = proxy.name(), "System proxy management enabled");
            Some(proxy)
        } else {
            tracing::info!("System proxy management disabled");
            None
        };
        Ok(Self::new(options, resolver, launcher, system_proxy, relay))
    }

    pub fn relay(&self) -> &EventRelay {
        &self.inner.relay
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.inner.resolver
    }

    pub fn system_proxy(&self) -> Option<Arc<dyn SystemProxy>> {
        self.inner.system_proxy.clone()
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.inner
            .shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: CoreEvent) {
        self.inner.relay.emit(event);
    }

    pub fn is_running(&self) -> bool {
        self.shared()
            .handle
            .as_ref()
            .map(|h| !h.killed)
            .unwrap_or(false)
    }

    pub fn state(&self) -> CoreState {
        self.shared().state
    }

    pub fn auto_restart(&self) -> bool {
        self.inner.auto_restart.load(Ordering::SeqCst)
    }

    /// Takes effect on the next exit event.
    pub fn set_auto_restart(&self, enabled: bool) {
        let previous = self.inner.auto_restart.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            tracing::info!(enabled, "Auto-restart changed");
        }
    }

    pub fn status(&self) -> CoreStatus {
        let shared = self.shared();
        let handle = shared.handle.as_ref();
        let resolved = shared.last_resolved.as_ref();

        CoreStatus {
            state: shared.state,
            running: handle.map(|h| !h.killed).unwrap_or(false),
            pid: handle.and_then(|h| h.pid),
            run_id: handle.map(|h| h.run_id),
            source: handle
                .map(|h| h.source.clone())
                .or_else(|| resolved.map(|r| r.source.clone())),
            config_path: resolved.map(|r| r.path.clone()),
            proxy_port: resolved.map(|r| r.summary.proxy_port),
            external_controller: resolved.map(|r| r.summary.external_controller.clone()),
            auto_restart: self.auto_restart(),
            system_proxy: self.inner.system_proxy.as_ref().map(|p| p.name()),
            restarts: shared.restarts,
            uptime_secs: handle.map(|h| h.started_at.elapsed().as_secs()),
            last_error: shared.last_error.clone(),
            proxies: resolved.map(|r| r.summary.proxy_names.clone()).unwrap_or_default(),
            groups: resolved.map(|r| r.summary.group_names.clone()).unwrap_or_default(),
        }
    }

    /// Current OS proxy settings, if a backend is configured.
    pub async fn system_proxy_state(&self) -> Option<Result<SystemProxyState, SystemProxyError>> {
        let proxy = self.inner.system_proxy.clone()?;
        Some(
            tokio::task::spawn_blocking(move || proxy.current())
                .await
                .unwrap_or_else(|e| Err(SystemProxyError::Task(e.to_string()))),
        )
    }

    /// Operations run on their own task: a caller that goes away (client
    /// disconnect, request timeout) cannot abandon a start or stop halfway.
    async fn detached<T, F, Fut>(&self, op: F) -> SupervisorResult<T>
    where
        F: FnOnce(Supervisor) -> Fut,
        Fut: Future<Output = SupervisorResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(op(self.clone()))
            .await
            .unwrap_or_else(|e| Err(SupervisorError::Task(e.to_string())))
    }

    pub async fn start(&self, selector: SourceSelector) -> SupervisorResult<StartOutcome> {
        self.detached(|sup| async move {
            let _op = sup.inner.op_lock.lock().await;
            sup.start_locked(selector).await
        })
        .await
    }

    pub async fn stop(&self) -> SupervisorResult<StopOutcome> {
        self.detached(|sup| async move {
            let _op = sup.inner.op_lock.lock().await;
            sup.stop_locked().await
        })
        .await
    }

    /// Stop whatever runs, then start with `selector`, without letting another call interleave.
    pub async fn restart(&self, selector: SourceSelector) -> SupervisorResult<StartOutcome> {
        self.detached(|sup| async move {
            let _op = sup.inner.op_lock.lock().await;
            sup.stop_locked().await?;
            sup.start_locked(selector).await
        })
        .await
    }

    /// Stop the core on daemon exit, restoring the OS proxy.
    pub async fn shutdown(&self) {
        match self.stop().await {
            Ok(StopOutcome::Stopped { run_id, .. }) => {
                tracing::info!(run_id = %run_id, "Core stopped for shutdown")
            }
            Ok(StopOutcome::NotRunning) => {}
            Err(e) => tracing::error!(error = %e, "Failed to stop core cleanly during shutdown"),
        }
    }

    async fn start_locked(&self, selector: SourceSelector) -> SupervisorResult<StartOutcome> {
        {
            let mut shared = self.shared();
            if let Some(handle) = shared.handle.as_ref().filter(|h| !h.killed) {
                tracing::debug!(run_id = %handle.run_id, "Start requested while core is running");
                return Ok(StartOutcome::AlreadyRunning {
                    run_id: handle.run_id,
                    source: handle.source.clone(),
                });
            }
            shared.state = CoreState::Starting;
            shared.last_selector = Some(selector.clone());
        }
        metrics::record_start_attempt();
        self.emit(CoreEvent::status(CoreState::Starting, "resolving core config"));

        let resolved = match self.inner.resolver.resolve(&selector).await {
            Ok(resolved) => resolved,
            Err(e) => return Err(self.fail_start(e.into())),
        };
        self.shared().last_resolved = Some(resolved.clone());

        let mut child = match self.inner.launcher.spawn(&resolved.dir) {
            Ok(child) => child,
            Err(source) => {
                return Err(self.fail_start(SupervisorError::Spawn {
                    binary: self.inner.launcher.binary().display().to_string(),
                    source,
                }))
            }
        };

        let run_id = Uuid::new_v4();
        let pid = child.id();
        tracing::info!(
            run_id = %run_id,
            pid = ?pid,
            binary = %self.inner.launcher.binary().display(),
            dir = %resolved.dir.display(),
            "Core process spawned"
        );

        if let Some(stdout) = child.stdout.take() {
            pump_lines(self.inner.relay.clone(), run_id, stdout, OutputStream::Stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            pump_lines(self.inner.relay.clone(), run_id, stderr, OutputStream::Stderr);
        }

        let (kill_tx, kill_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        self.shared().handle = Some(CoreHandle {
            run_id,
            pid,
            source: resolved.source.clone(),
            started_at: Instant::now(),
            killed: false,
            kill_tx: Some(kill_tx),
            exit_rx: exit_rx.clone(),
        });
        tokio::spawn(self.clone().watch_process(run_id, child, kill_rx, exit_tx));

        self.emit(CoreEvent::status_for_run(
            CoreState::Starting,
            run_id,
            format!("core process spawned (pid {})", pid.map_or_else(|| "?".to_string(), |p| p.to_string())),
        ));

        if let Err(e) = self.await_ready(&resolved, exit_rx.clone()).await {
            self.terminate(run_id).await;
            return Err(self.fail_start(e));
        }

        if let Some(proxy) = self.inner.system_proxy.clone() {
            let server = resolved.summary.proxy_server(&self.inner.options.proxy_host);
            let bypass = self.inner.options.bypass.clone();
            let enabled = run_blocking(proxy, move |p| p.enable(&server, &bypass)).await;

            if let Err(e) = enabled {
                metrics::record_system_proxy_failure("enable");
                if self.inner.options.rollback_on_failure {
                    tracing::error!(run_id = %run_id, error = %e, "System proxy enable failed, rolling back core start");
                    self.terminate(run_id).await;
                    return Err(self.fail_start(e.into()));
                }
                tracing::error!(run_id = %run_id, error = %e, "System proxy enable failed, core left running");
                let err: SupervisorError = e.into();
                if self.mark_running(run_id, Some(err.to_string())) {
                    return Err(err);
                }
                return Err(self.fail_start(exited_early(&exit_rx)));
            }
        }

        if !self.mark_running(run_id, None) {
            return Err(self.fail_start(exited_early(&exit_rx)));
        }

        Ok(StartOutcome::Started {
            run_id,
            pid,
            source: resolved.source.clone(),
            config_path: resolved.path.clone(),
            proxy_port: resolved.summary.proxy_port,
        })
    }

    /// Move to `Running` if `run_id` still owns the handle.
    fn mark_running(&self, run_id: Uuid, warning: Option<String>) -> bool {
        {
            let mut shared = self.shared();
            if shared.handle.as_ref().map(|h| h.run_id) != Some(run_id) {
                return false;
            }
            shared.state = CoreState::Running;
            shared.last_error = warning.clone();
        }
        metrics::set_core_running(true);
        let message = match warning {
            Some(w) => format!("core running; {}", w),
            None => "core running".to_string(),
        };
        tracing::info!(run_id = %run_id, "Core running");
        self.emit(CoreEvent::status_for_run(CoreState::Running, run_id, message));
        true
    }

    fn fail_start(&self, err: SupervisorError) -> SupervisorError {
        {
            let mut shared = self.shared();
            shared.state = CoreState::Error;
            shared.last_error = Some(err.to_string());
        }
        metrics::record_start_failure(err.code());
        tracing::error!(code = err.code(), error = %err, "Core start failed");
        self.emit(CoreEvent::status(CoreState::Error, err.to_string()));
        err
    }

    /// Probe (or wait out the warm-up) while watching for an early exit.
    async fn await_ready(
        &self,
        resolved: &ResolvedConfig,
        mut exit_rx: watch::Receiver<Option<ExitInfo>>,
    ) -> SupervisorResult<()> {
        let ready = async {
            match &self.inner.options.readiness {
                Some(probe) => probe.wait_ready(&resolved.summary).await,
                None => {
                    time::sleep(self.inner.options.warmup).await;
                    Ok(())
                }
            }
        };

        tokio::select! {
            result = ready => result,
            info = wait_exit(&mut exit_rx) => Err(SupervisorError::ExitedEarly {
                code: info.code,
                status: info.description,
            }),
        }
    }

    async fn stop_locked(&self) -> SupervisorResult<StopOutcome> {
        let (current, restart_pending) = {
            let mut shared = self.shared();
            shared.restart_epoch += 1;
            let restart_pending = std::mem::take(&mut shared.restart_pending);
            let current = shared.handle.as_ref().map(|h| h.run_id);
            if current.is_some() {
                shared.state = CoreState::Stopping;
            } else if restart_pending {
                shared.state = CoreState::Stopped;
            }
            (current, restart_pending)
        };

        let Some(run_id) = current else {
            if !restart_pending {
                tracing::debug!("Stop requested with no core running");
                return Ok(StopOutcome::NotRunning);
            }
            tracing::info!("Stop cancelled a pending restart");
            return match self.disable_system_proxy().await {
                Ok(()) => {
                    self.emit(CoreEvent::status(CoreState::Stopped, "pending restart cancelled"));
                    Ok(StopOutcome::NotRunning)
                }
                Err(e) => {
                    let err: SupervisorError = e.into();
                    self.shared().last_error = Some(err.to_string());
                    Err(err)
                }
            };
        };

        self.emit(CoreEvent::status_for_run(CoreState::Stopping, run_id, "stopping core"));
        let exit = self.terminate(run_id).await;
        if exit.is_none() {
            tracing::warn!(
                run_id = %run_id,
                timeout_secs = self.inner.options.stop_timeout.as_secs(),
                "Core did not report exit before the stop timeout"
            );
        }
        self.shared().state = CoreState::Stopped;
        metrics::set_core_running(false);

        let exit_code = exit.and_then(|e| e.code);
        match self.disable_system_proxy().await {
            Ok(()) => {
                tracing::info!(run_id = %run_id, exit_code = ?exit_code, "Core stopped");
                self.emit(CoreEvent::StatusUpdate {
                    state: CoreState::Stopped,
                    message: "core stopped".to_string(),
                    run_id: Some(run_id),
                    exit_code,
                });
                Ok(StopOutcome::Stopped { run_id, exit_code })
            }
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "Core stopped but system proxy disable failed");
                let err: SupervisorError = e.into();
                self.shared().last_error = Some(err.to_string());
                self.emit(CoreEvent::StatusUpdate {
                    state: CoreState::Stopped,
                    message: format!("core stopped; {}", err),
                    run_id: Some(run_id),
                    exit_code,
                });
                Err(err)
            }
        }
    }

    /// Kill `run_id` if it still owns the handle and wait (bounded) for its exit.
    async fn terminate(&self, run_id: Uuid) -> Option<ExitInfo> {
        let (kill_tx, mut exit_rx) = {
            let mut shared = self.shared();
            let handle = shared.handle.as_mut().filter(|h| h.run_id == run_id)?;
            handle.killed = true;
            (handle.kill_tx.take(), handle.exit_rx.clone())
        };

        if let Some(tx) = kill_tx {
            let _ = tx.send(());
        }
        let exit = time::timeout(self.inner.options.stop_timeout, wait_exit(&mut exit_rx))
            .await
            .ok();

        let mut shared = self.shared();
        if shared.handle.as_ref().map(|h| h.run_id) == Some(run_id) {
            shared.handle = None;
        }
        exit
    }

    /// Owns the child for its whole life.
    async fn watch_process(
        self,
        run_id: Uuid,
        mut child: Child,
        mut kill_rx: oneshot::Receiver<()>,
        exit_tx: watch::Sender<Option<ExitInfo>>,
    ) {
        let status = tokio::select! {
            status = child.wait() => status,
            _ = &mut kill_rx => {
                if let Err(e) = child.start_kill() {
                    tracing::warn!(run_id = %run_id, error = %e, "Failed to signal core process");
                }
                child.wait().await
            }
        };

        let info = ExitInfo::from_status(status);
        let _ = exit_tx.send(Some(info.clone()));
        self.on_exit(run_id, info);
    }

    fn on_exit(&self, run_id: Uuid, info: ExitInfo) {
        let mut shared = self.shared();
        if shared.handle.as_ref().map(|h| h.run_id) != Some(run_id) {
            metrics::record_exit("requested");
            return;
        }
        let Some(handle) = shared.handle.take() else {
            return;
        };

        // Requested stops and failed starts report through their own call path.
        if handle.killed || shared.state == CoreState::Starting {
            metrics::record_exit("requested");
            return;
        }

        let state = if info.success {
            metrics::record_exit("clean");
            CoreState::Stopped
        } else {
            metrics::record_exit("failed");
            CoreState::Error
        };
        shared.state = state;
        metrics::set_core_running(false);

        let message = format!("core exited unexpectedly ({})", info.description);
        if !info.success {
            shared.last_error = Some(message.clone());
        }

        let auto_restart = self.auto_restart();
        let restart_with = shared.last_selector.clone().filter(|_| auto_restart);
        shared.restart_pending = restart_with.is_some();
        let epoch = shared.restart_epoch;
        drop(shared);

        tracing::warn!(
            run_id = %run_id,
            exit_code = ?info.code,
            uptime_secs = handle.started_at.elapsed().as_secs(),
            auto_restart,
            "Core exited unexpectedly"
        );
        self.emit(CoreEvent::StatusUpdate {
            state,
            message,
            run_id: Some(run_id),
            exit_code: info.code,
        });

        match restart_with {
            Some(selector) => self.schedule_restart(selector, epoch),
            None => self.release_system_proxy(),
        }
    }

    fn schedule_restart(&self, selector: SourceSelector, epoch: u64) {
        let delay = self.inner.options.restart_delay;
        tracing::info!(delay_ms = delay.as_millis() as u64, "Scheduling core restart");
        self.emit(CoreEvent::status(
            CoreState::Stopped,
            format!("restarting in {}ms", delay.as_millis()),
        ));

        let supervisor = self.clone();
        tokio::spawn(async move {
            time::sleep(delay).await;
            let _op = supervisor.inner.op_lock.lock().await;
            let (superseded, switched_off) = {
                let mut shared = supervisor.shared();
                // `stop` or a manual start took over; they own the OS proxy now.
                let superseded = shared.restart_epoch != epoch || shared.handle.is_some();
                let switched_off = !superseded && !supervisor.auto_restart();
                if shared.restart_epoch == epoch {
                    shared.restart_pending = false;
                }
                if !superseded && !switched_off {
                    shared.restarts += 1;
                }
                (superseded, switched_off)
            };

            if superseded {
                tracing::debug!("Pending restart superseded");
                return;
            }
            if switched_off {
                tracing::info!("Auto-restart switched off during restart delay");
                supervisor.release_after_exit().await;
                return;
            }

            metrics::record_restart();
            match supervisor.start_locked(selector).await {
                Ok(outcome) => tracing::info!(outcome = ?outcome, "Core restarted"),
                Err(e) => {
                    tracing::error!(error = %e, "Automatic restart failed");
                    supervisor.release_after_exit().await;
                }
            }
        });
    }

    async fn disable_system_proxy(&self) -> Result<(), SystemProxyError> {
        let Some(proxy) = self.inner.system_proxy.clone() else {
            return Ok(());
        };
        let result = run_blocking(proxy, |p| p.disable()).await;
        if result.is_err() {
            metrics::record_system_proxy_failure("disable");
        }
        result
    }

    /// Disable the OS proxy unless a core is up again. Caller holds the op lock.
    async fn release_after_exit(&self) {
        if self.shared().handle.is_some() {
            return;
        }
        if let Err(e) = self.disable_system_proxy().await {
            tracing::error!(error = %e, "Failed to disable system proxy after core exit");
        }
    }

    /// After an unexpected exit with no restart coming, stop pointing the OS at a dead port.
    fn release_system_proxy(&self) {
        if self.inner.system_proxy.is_none() {
            return;
        }
        let supervisor = self.clone();
        tokio::spawn(async move {
            let _op = supervisor.inner.op_lock.lock().await;
            supervisor.release_after_exit().await;
        });
    }
}

fn exited_early(exit_rx: &watch::Receiver<Option<ExitInfo>>) -> SupervisorError {
    let info = exit_rx.borrow().clone().unwrap_or_else(ExitInfo::unknown);
    SupervisorError::ExitedEarly {
        code: info.code,
        status: info.description,
    }
}

async fn wait_exit(exit_rx: &mut watch::Receiver<Option<ExitInfo>>) -> ExitInfo {
    loop {
        let current = exit_rx.borrow_and_update().clone();
        if let Some(info) = current {
            return info;
        }
        if exit_rx.changed().await.is_err() {
            return exit_rx.borrow().clone().unwrap_or_else(ExitInfo::unknown);
        }
    }
}

async fn run_blocking<F>(proxy: Arc<dyn SystemProxy>, f: F) -> Result<(), SystemProxyError>
where
    F: FnOnce(&dyn SystemProxy) -> Result<(), SystemProxyError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(proxy.as_ref()))
        .await
        .unwrap_or_else(|e| Err(SystemProxyError::Task(e.to_string())))
}

#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

fn pump_lines<R>(relay: EventRelay, run_id: Uuid, reader: R, stream: OutputStream)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            // Bytes, not `lines()`: one non-UTF-8 line must not stop the drain.
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(|c| c == '\n' || c == '\r')
                        .to_string();
                    let event = match stream {
                        OutputStream::Stdout => {
                            tracing::debug!(target: "core", run_id = %run_id, "{}", line);
                            CoreEvent::Log { run_id, line }
                        }
                        OutputStream::Stderr => {
                            tracing::debug!(target: "core", run_id = %run_id, stream = "stderr", "{}", line);
                            CoreEvent::Error { run_id, line }
                        }
                    };
                    relay.emit(event);
                }
                Err(e) => {
                    tracing::warn!(run_id = %run_id, stream = ?stream, error = %e, "Stopped reading core output");
                    break;
                }
            }
        }
    });
}
