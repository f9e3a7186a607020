use crate::config::BackendConfig;
use crate::error::SupervisorError;
use crate::models::{BackendSnapshot, LogEntry, LogLevel, LogSource, ReadinessState};
use crate::services::log_sink::LogSink;
use crate::services::readiness::{
    Detection, MarkerDetector, OutputScanner, ReadinessDetector, ScannedChunk,
};
use crate::utils::kill_process_tree;
use chrono::{DateTime, Utc};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

const READ_CHUNK_SIZE: usize = 4096;
/// 进程退出后等待输出读完的上限，防止孙进程占着管道
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);
const STOP_WAIT_TIMEOUT: Duration = Duration::from_secs(3);

/// 后端启动命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub env: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
        }
    }

    /// `python <script>`，强制 UTF-8 并关闭输出缓冲，保证就绪标记及时出现
    pub fn python(interpreter: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self::new(interpreter)
            .arg(script.into().into_os_string())
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONUNBUFFERED", "1")
            .env("PYTHONUTF8", "1")
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        let mut spec = Self::python(&config.interpreter, &config.script);
        spec.current_dir = config.working_dir.clone();
        spec
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.env.iter().map(|(key, value)| (key.as_str(), value.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        #[cfg(target_os = "windows")]
        {
            // 隐藏控制台窗口
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        command
    }
}

#[derive(Debug)]
enum StartupSignal {
    Ready,
    TimedOut,
    Fatal(String),
    Exited(Option<i32>),
}

/// 启动等待的唯一结算点：就绪、退出、超时三者只有第一个生效
struct StartupGate {
    sender: StdMutex<Option<oneshot::Sender<StartupSignal>>>,
    readiness: Arc<StdMutex<ReadinessState>>,
}

impl StartupGate {
    fn new(sender: oneshot::Sender<StartupSignal>, readiness: Arc<StdMutex<ReadinessState>>) -> Self {
        Self {
            sender: StdMutex::new(Some(sender)),
            readiness,
        }
    }

    fn settle(&self, signal: StartupSignal) -> bool {
        let sender = match lock(&self.sender).take() {
            Some(sender) => sender,
            None => return false,
        };
        let next = match &signal {
            StartupSignal::Ready => ReadinessState::Ready,
            StartupSignal::TimedOut => ReadinessState::TimedOut,
            StartupSignal::Fatal(_) => ReadinessState::Failed { exit_code: None },
            StartupSignal::Exited(exit_code) => ReadinessState::Failed {
                exit_code: *exit_code,
            },
        };
        lock(&self.readiness).advance(next);
        let _ = sender.send(signal);
        true
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

struct BackendProcess {
    instance_id: Uuid,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    readiness: Arc<StdMutex<ReadinessState>>,
    stop_requested: Arc<AtomicBool>,
    kill_tx: Option<oneshot::Sender<()>>,
    monitor: Option<JoinHandle<()>>,
}

impl BackendProcess {
    fn snapshot(&self) -> BackendSnapshot {
        BackendSnapshot {
            instance_id: self.instance_id,
            pid: self.pid,
            readiness: *lock(&self.readiness),
            started_at: self.started_at,
        }
    }
}

type ProcessSlot = Arc<Mutex<Option<BackendProcess>>>;

/// 后端进程的唯一所有者
///
/// 同一时刻至多持有一个进程；进程句柄只在内部流转，外部只能通过
/// `start`/`stop`/`status` 访问
pub struct BackendSupervisor {
    launch: LaunchSpec,
    detector: Arc<dyn ReadinessDetector>,
    sink: Arc<dyn LogSink>,
    startup_timeout: Duration,
    slot: ProcessSlot,
}

impl BackendSupervisor {
    pub fn new(launch: LaunchSpec, startup_timeout: Duration, sink: Arc<dyn LogSink>) -> Self {
        Self {
            launch,
            detector: Arc::new(MarkerDetector::default()),
            sink,
            startup_timeout,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn from_config(config: &BackendConfig, sink: Arc<dyn LogSink>) -> Self {
        Self::new(LaunchSpec::from_config(config), config.startup_timeout, sink)
    }

    pub fn with_detector(mut self, detector: Arc<dyn ReadinessDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn launch_spec(&self) -> &LaunchSpec {
        &self.launch
    }

    pub fn startup_timeout(&self) -> Duration {
        self.startup_timeout
    }

    /// 启动后端并等待就绪
    ///
    /// 超时不是错误：返回 `Ok(ReadinessState::TimedOut)`，进程继续运行
    pub async fn start(&self) -> Result<ReadinessState, SupervisorError> {
        let instance_id = Uuid::new_v4();
        let (signal_tx, signal_rx) = oneshot::channel();
        let readiness = Arc::new(StdMutex::new(ReadinessState::Starting));
        let gate = Arc::new(StartupGate::new(signal_tx, readiness.clone()));

        {
            let mut slot = self.slot.lock().await;
            if let Some(existing) = slot.as_ref() {
                return Err(SupervisorError::AlreadyRunning { pid: existing.pid });
            }

            self.log(
                Some(instance_id),
                LogLevel::Info,
                format!("starting backend: {}", self.launch.display()),
            );

            let mut child = self
                .launch
                .command()
                .spawn()
                .map_err(|source| SupervisorError::Spawn {
                    program: self.launch.program.display().to_string(),
                    source,
                })?;
            let pid = child.id();

            let mut readers = Vec::with_capacity(2);
            if let Some(stdout) = child.stdout.take() {
                readers.push(self.spawn_reader(stdout, LogSource::Stdout, instance_id, &gate));
            }
            if let Some(stderr) = child.stderr.take() {
                readers.push(self.spawn_reader(stderr, LogSource::Stderr, instance_id, &gate));
            }

            let (kill_tx, kill_rx) = oneshot::channel();
            let stop_requested = Arc::new(AtomicBool::new(false));
            let watch = ExitWatch {
                instance_id,
                stop_requested: stop_requested.clone(),
                readers,
                gate: gate.clone(),
                sink: self.sink.clone(),
                slot: self.slot.clone(),
            };
            let monitor = tokio::spawn(monitor_exit(child, kill_rx, watch));

            // 持锁期间登记，监视任务清理时一定能看到本实例
            *slot = Some(BackendProcess {
                instance_id,
                pid,
                started_at: Utc::now(),
                readiness,
                stop_requested,
                kill_tx: Some(kill_tx),
                monitor: Some(monitor),
            });

            self.log(
                Some(instance_id),
                LogLevel::Info,
                format!("backend spawned (pid {})", display_pid(pid)),
            );
        }

        let mut signal_rx = signal_rx;
        let signal = match tokio::time::timeout(self.startup_timeout, &mut signal_rx).await {
            Ok(received) => received.ok(),
            Err(_) => {
                // 超时与其他信号同时到达时以先结算者为准
                gate.settle(StartupSignal::TimedOut);
                signal_rx.await.ok()
            }
        };

        match signal {
            Some(StartupSignal::Ready) => {
                self.log(Some(instance_id), LogLevel::Info, "backend is ready");
                Ok(ReadinessState::Ready)
            }
            Some(StartupSignal::TimedOut) => {
                self.log(
                    Some(instance_id),
                    LogLevel::Warning,
                    format!(
                        "no readiness signal within {}s, assuming backend is ready",
                        self.startup_timeout.as_secs_f32()
                    ),
                );
                Ok(ReadinessState::TimedOut)
            }
            Some(StartupSignal::Fatal(line)) => {
                self.log(
                    Some(instance_id),
                    LogLevel::Error,
                    format!("backend reported a fatal startup error: {}", line),
                );
                self.stop().await;
                Err(SupervisorError::FatalOutput { line })
            }
            Some(StartupSignal::Exited(exit_code)) => {
                self.log(
                    Some(instance_id),
                    LogLevel::Error,
                    format!(
                        "backend exited before it was ready (exit code {})",
                        exit_code.map_or_else(|| "none".to_string(), |code| code.to_string())
                    ),
                );
                Err(SupervisorError::StartupFailed { exit_code })
            }
            None => Err(SupervisorError::StartupFailed { exit_code: None }),
        }
    }

    /// 强制结束当前进程（含子进程树）并释放所有权；没有进程时返回 false
    pub async fn stop(&self) -> bool {
        let process = self.slot.lock().await.take();
        let mut process = match process {
            Some(process) => process,
            None => return false,
        };

        self.log(
            Some(process.instance_id),
            LogLevel::Info,
            format!("stopping backend (pid {})", display_pid(process.pid)),
        );
        process.stop_requested.store(true, Ordering::SeqCst);

        if let Some(pid) = process.pid {
            match tokio::task::spawn_blocking(move || kill_process_tree(pid)).await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => self.log(
                    Some(process.instance_id),
                    LogLevel::Warning,
                    format!("failed to kill process tree: {}", error),
                ),
                Err(error) => self.log(
                    Some(process.instance_id),
                    LogLevel::Warning,
                    format!("kill task failed: {}", error),
                ),
            }
        }

        if let Some(kill_tx) = process.kill_tx.take() {
            let _ = kill_tx.send(());
        }
        if let Some(monitor) = process.monitor.take() {
            if tokio::time::timeout(STOP_WAIT_TIMEOUT, monitor).await.is_err() {
                self.log(
                    Some(process.instance_id),
                    LogLevel::Warning,
                    "backend did not report exit after kill",
                );
            }
        }
        true
    }

    pub async fn restart(&self) -> Result<ReadinessState, SupervisorError> {
        self.stop().await;
        self.start().await
    }

    pub async fn status(&self) -> Option<BackendSnapshot> {
        self.slot.lock().await.as_ref().map(BackendProcess::snapshot)
    }

    pub async fn is_running(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    fn spawn_reader<R>(
        &self,
        stream: R,
        source: LogSource,
        instance_id: Uuid,
        gate: &Arc<StartupGate>,
    ) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(pump_output(
            stream,
            source,
            instance_id,
            OutputScanner::new(self.detector.clone()),
            gate.clone(),
            self.sink.clone(),
        ))
    }

    fn log(&self, instance_id: Option<Uuid>, level: LogLevel, message: impl Into<String>) {
        self.sink.record(LogEntry::lifecycle(instance_id, level, message));
    }
}

/// 读取一路输出：原样上报日志，检测结果交给启动结算点
async fn pump_output<R>(
    mut stream: R,
    source: LogSource,
    instance_id: Uuid,
    mut scanner: OutputScanner,
    gate: Arc<StartupGate>,
    sink: Arc<dyn LogSink>,
) where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; READ_CHUNK_SIZE];
    loop {
        match stream.read(&mut buffer).await {
            Ok(0) => break,
            Ok(read) => {
                let chunk = scanner.feed(&buffer[..read]);
                report_chunk(chunk, source, instance_id, &gate, sink.as_ref());
            }
            Err(error) => {
                sink.record(LogEntry::lifecycle(
                    Some(instance_id),
                    LogLevel::Warning,
                    format!("failed to read backend {}: {}", source.as_str(), error),
                ));
                break;
            }
        }
    }
    if let Some(chunk) = scanner.finish() {
        report_chunk(chunk, source, instance_id, &gate, sink.as_ref());
    }
}

fn report_chunk(
    chunk: ScannedChunk,
    source: LogSource,
    instance_id: Uuid,
    gate: &StartupGate,
    sink: &dyn LogSink,
) {
    if !chunk.text.is_empty() {
        sink.record(LogEntry::output(instance_id, source, chunk.text));
    }
    match chunk.detection {
        Detection::Ready => {
            gate.settle(StartupSignal::Ready);
        }
        Detection::Fatal(line) => {
            gate.settle(StartupSignal::Fatal(line));
        }
        Detection::Irrelevant => {}
    }
}

/// 监视任务退出时需要收尾的实例状态
struct ExitWatch {
    instance_id: Uuid,
    stop_requested: Arc<AtomicBool>,
    readers: Vec<JoinHandle<()>>,
    gate: Arc<StartupGate>,
    sink: Arc<dyn LogSink>,
    slot: ProcessSlot,
}

/// 等待进程退出或收到停止请求，随后结算启动并释放所有权
async fn monitor_exit(mut child: Child, kill_rx: oneshot::Receiver<()>, watch: ExitWatch) {
    let ExitWatch {
        instance_id,
        stop_requested,
        readers,
        gate,
        sink,
        slot,
    } = watch;

    let status = tokio::select! {
        status = child.wait() => status,
        _ = kill_rx => {
            let _ = child.kill().await;
            child.wait().await
        }
    };
    // 进程树被强杀时 wait 往往先返回，以停止标记区分主动停止
    let stopped = stop_requested.load(Ordering::SeqCst);

    // 退出前打印的就绪标记仍然算数
    let _ = tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, async {
        for reader in readers {
            let _ = reader.await;
        }
    })
    .await;

    let exit_code = status.as_ref().ok().and_then(|status| status.code());
    gate.settle(StartupSignal::Exited(exit_code));

    let (level, message) = match (&status, stopped) {
        (_, true) => (LogLevel::Info, "backend stopped".to_string()),
        (Ok(status), false) if status.success() => {
            (LogLevel::Info, "backend exited normally".to_string())
        }
        (Ok(status), false) => (LogLevel::Warning, format!("backend exited: {}", status)),
        (Err(error), false) => (
            LogLevel::Error,
            format!("failed to wait for backend exit: {}", error),
        ),
    };
    sink.record(LogEntry::lifecycle(Some(instance_id), level, message));

    let mut slot = slot.lock().await;
    if slot.as_ref().map(|process| process.instance_id) == Some(instance_id) {
        *slot = None;
    }
}

fn display_pid(pid: Option<u32>) -> String {
    pid.map_or_else(|| "unknown".to_string(), |pid| pid.to_string())
}
