//! Connection-session lifecycle around the connector child process.
//!
//! A session owns one child process and the proxy state it enabled. The
//! child's stdout and stderr share one pipe, so the output pump sees a
//! single combined stream in the child's write order; the listener
//! receives `SessionEvent`s over an mpsc channel and never blocks the
//! workers.

use std::{
    fs,
    io::{self, BufRead, BufReader, PipeReader, Write},
    process::{Command, Stdio},
    sync::{
        Arc, Mutex,
        mpsc::{Receiver, Sender, channel},
    },
    thread::JoinHandle,
};

use crate::{
    launcher::ConnectorCommand,
    settings::configuration_directory,
    system::{
        self, ChildExit,
        proxy::{self, ProxyBackend},
    },
};

/// Local endpoint the connector listens on while the session runs.
pub const PROXY_LISTEN_ADDRESS: &str = "127.0.0.1:1081";

pub enum SessionEvent {
    /// One line of the child's stdout or stderr, in arrival order.
    Output(String),
    /// The child exited; teardown (proxy restore) has already happened.
    Finished(ChildExit),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
}

pub enum StartOutcome {
    Started(Receiver<SessionEvent>),
    /// A session is already running; no second child was spawned.
    AlreadyRunning,
}

/// Append-only capture of the child's output. Lines are never rewritten
/// or dropped.
#[derive(Default)]
pub struct OutputLog {
    lines: Vec<String>,
}

impl OutputLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

struct ActiveSession {
    process_id: u32,
    worker: JoinHandle<()>,
}

pub struct Supervisor {
    backends: Arc<Mutex<Vec<Box<dyn ProxyBackend>>>>,
    session_logging: bool,
    active: Option<ActiveSession>,
}

impl Supervisor {
    pub fn new(backends: Vec<Box<dyn ProxyBackend>>) -> Self {
        Self {
            backends: Arc::new(Mutex::new(backends)),
            session_logging: false,
            active: None,
        }
    }

    /// Also append every forwarded line to a timestamped file under the
    /// configuration directory.
    pub fn set_session_logging(&mut self, enabled: bool) {
        self.session_logging = enabled;
    }

    pub fn state(&mut self) -> SessionState {
        self.reap_finished();
        if self.active.is_some() {
            SessionState::Running
        } else {
            SessionState::Idle
        }
    }

    /// Enables the platform proxy (if requested), spawns the connector and
    /// transitions to Running. A start while Running is rejected without
    /// spawning a second child. Launch failure is returned to the caller;
    /// a proxy enabled for the failed start is disabled again first.
    pub fn start(
        &mut self,
        command: &ConnectorCommand,
        proxy_enabled: bool,
    ) -> io::Result<StartOutcome> {
        self.reap_finished();
        if self.active.is_some() {
            log::info!("[session] already connected, ignoring start");
            return Ok(StartOutcome::AlreadyRunning);
        }

        // One pipe for both streams keeps stdout/stderr lines in the
        // child's write order.
        let (output_reader, stdout_writer) = io::pipe()?;
        let stderr_writer = stdout_writer.try_clone()?;

        if proxy_enabled {
            let (host, port) = system::parse_host_port(PROXY_LISTEN_ADDRESS);
            if let Ok(mut backends) = self.backends.lock() {
                proxy::enable_all(&mut backends, &host, port);
            }
        }

        log::info!("[connect] spawning: {}", command.redacted_command_line());

        let mut process_command = Command::new(&command.program);
        process_command
            .args(&command.arguments)
            .stdin(Stdio::null())
            .stdout(stdout_writer)
            .stderr(stderr_writer);

        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            process_command.creation_flags(system::CREATE_NO_WINDOW);
        }

        let mut child = match process_command.spawn() {
            Ok(child) => child,
            Err(error) => {
                log::error!(
                    "[connect] failed to launch {}: {error}",
                    command.program.display()
                );
                if proxy_enabled && let Ok(mut backends) = self.backends.lock() {
                    proxy::disable_all(&mut backends);
                }
                return Err(error);
            }
        };

        // The command still holds copies of the pipe's write ends; drop
        // them so the pump sees EOF once the child exits.
        drop(process_command);

        let process_id = child.id();
        let (sender, receiver) = channel();
        let log_file = if self.session_logging {
            create_session_log_file()
        } else {
            None
        };

        let pump = spawn_pump(output_reader, sender.clone(), log_file);

        let backends = self.backends.clone();
        let worker = std::thread::spawn(move || {
            if pump.join().is_err() {
                log::warn!("[session] output pump panicked");
            }

            let exit = match child.wait() {
                Ok(status) => ChildExit {
                    code: status.code(),
                },
                Err(error) => {
                    log::warn!("[session] child wait error: {error}");
                    ChildExit { code: None }
                }
            };
            log::info!("[session] connector exited ({exit})");

            if proxy_enabled && let Ok(mut backends) = backends.lock() {
                proxy::disable_all(&mut backends);
            }

            let _ = sender.send(SessionEvent::Finished(exit));
        });

        log::info!("[session] running (pid={process_id})");
        self.active = Some(ActiveSession { process_id, worker });
        Ok(StartOutcome::Started(receiver))
    }

    /// Sends a termination signal and blocks until the child has exited
    /// and its teardown (proxy restore) has finished. No-op when Idle.
    /// There is no timeout: a child that ignores termination hangs the
    /// stop operation.
    pub fn stop(&mut self) -> bool {
        self.reap_finished();
        let Some(session) = self.active.take() else {
            log::info!("[session] stop requested while idle, nothing to do");
            return false;
        };

        system::terminate_process(session.process_id);
        if session.worker.join().is_err() {
            log::warn!("[session] worker panicked during shutdown");
        }
        log::info!("[session] stopped (pid={})", session.process_id);
        true
    }

    /// A naturally-exited child leaves a finished worker behind; collect
    /// it so the state machine reads Idle again.
    fn reap_finished(&mut self) {
        if self
            .active
            .as_ref()
            .is_some_and(|session| session.worker.is_finished())
        {
            if let Some(session) = self.active.take() {
                let _ = session.worker.join();
                log::debug!(
                    "[session] reaped finished session (pid={})",
                    session.process_id
                );
            }
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        // The window closing must not leave the child or the OS proxy behind.
        self.stop();
    }
}

fn spawn_pump(
    reader: PipeReader,
    sender: Sender<SessionEvent>,
    log_file: Option<Arc<Mutex<fs::File>>>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let reader = BufReader::new(reader);
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if let Some(ref log_file) = log_file
                        && let Ok(mut file) = log_file.lock()
                        && let Err(error) = writeln!(file, "{line}")
                    {
                        log::warn!("[logs] failed to write output line: {error}");
                    }
                    // Keep draining after the listener is gone so the child
                    // never blocks on a full pipe.
                    let _ = sender.send(SessionEvent::Output(line));
                }
                Err(error) => {
                    log::trace!("[child output] reader ended: {error}");
                    break;
                }
            }
        }
    })
}

fn create_session_log_file() -> Option<Arc<Mutex<fs::File>>> {
    let directory = configuration_directory().join("logs");
    if let Err(error) = fs::create_dir_all(&directory) {
        log::warn!("[logs] failed to create log directory: {error}");
        return None;
    }

    let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let path = directory.join(format!("{timestamp}.log"));

    match fs::File::create(&path) {
        Ok(file) => {
            log::info!("[logs] session log: {}", path.display());
            Some(Arc::new(Mutex::new(file)))
        }
        Err(error) => {
            log::warn!("[logs] failed to create log file: {error}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(unix)]
    use std::{path::PathBuf, time::Duration};

    #[derive(Clone, Default)]
    struct RecordingProxy {
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ProxyBackend for RecordingProxy {
        fn name(&self) -> &str {
            "recording"
        }

        fn enable(&mut self, _host: &str, _port: u16) {
            self.calls.lock().unwrap().push("enable");
        }

        fn disable(&mut self) {
            self.calls.lock().unwrap().push("disable");
        }
    }

    fn recording_supervisor() -> (Supervisor, Arc<Mutex<Vec<&'static str>>>) {
        let backend = RecordingProxy::default();
        let calls = backend.calls.clone();
        (Supervisor::new(vec![Box::new(backend)]), calls)
    }

    #[cfg(unix)]
    fn shell_command(script: &str) -> ConnectorCommand {
        ConnectorCommand {
            program: PathBuf::from("/bin/sh"),
            arguments: vec!["-c".into(), script.into()],
        }
    }

    #[cfg(unix)]
    fn collect_events(receiver: &Receiver<SessionEvent>) -> (Vec<String>, ChildExit) {
        let mut lines = Vec::new();
        loop {
            match receiver
                .recv_timeout(Duration::from_secs(10))
                .expect("session event")
            {
                SessionEvent::Output(line) => lines.push(line),
                SessionEvent::Finished(exit) => return (lines, exit),
            }
        }
    }

    #[cfg(unix)]
    fn wait_for_idle(supervisor: &mut Supervisor) {
        for _ in 0..200 {
            if supervisor.state() == SessionState::Idle {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("supervisor did not return to Idle");
    }

    #[test]
    fn stop_while_idle_is_a_noop() {
        let (mut supervisor, calls) = recording_supervisor();
        assert_eq!(supervisor.state(), SessionState::Idle);
        assert!(!supervisor.stop());
        assert_eq!(supervisor.state(), SessionState::Idle);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn output_lines_arrive_in_order() {
        let (mut supervisor, _calls) = recording_supervisor();
        let command = shell_command("for i in 1 2 3 4 5; do echo line$i; done");

        let StartOutcome::Started(receiver) = supervisor.start(&command, false).unwrap() else {
            panic!("expected a started session");
        };

        let (lines, exit) = collect_events(&receiver);
        assert_eq!(lines, vec!["line1", "line2", "line3", "line4", "line5"]);
        assert!(exit.success());
        wait_for_idle(&mut supervisor);
    }

    #[cfg(unix)]
    #[test]
    fn stdout_and_stderr_interleave_in_write_order() {
        let (mut supervisor, _calls) = recording_supervisor();
        let command = shell_command(
            "i=1; while [ $i -le 300 ]; do echo o$i; echo e$i >&2; i=$((i+1)); done",
        );

        let StartOutcome::Started(receiver) = supervisor.start(&command, false).unwrap() else {
            panic!("expected a started session");
        };

        let (lines, exit) = collect_events(&receiver);
        let mut expected = Vec::new();
        for i in 1..=300 {
            expected.push(format!("o{i}"));
            expected.push(format!("e{i}"));
        }
        assert_eq!(lines, expected);
        assert!(exit.success());
        wait_for_idle(&mut supervisor);
    }

    #[cfg(unix)]
    #[test]
    fn stderr_lines_are_forwarded_too() {
        let (mut supervisor, _calls) = recording_supervisor();
        let command = shell_command("echo oops >&2");

        let StartOutcome::Started(receiver) = supervisor.start(&command, false).unwrap() else {
            panic!("expected a started session");
        };

        let (lines, exit) = collect_events(&receiver);
        assert_eq!(lines, vec!["oops"]);
        assert!(exit.success());
        wait_for_idle(&mut supervisor);
    }

    #[cfg(unix)]
    #[test]
    fn start_while_running_reports_already_connected() {
        let (mut supervisor, _calls) = recording_supervisor();
        let command = shell_command("sleep 30");

        let StartOutcome::Started(receiver) = supervisor.start(&command, false).unwrap() else {
            panic!("expected a started session");
        };
        assert_eq!(supervisor.state(), SessionState::Running);

        match supervisor.start(&command, false).unwrap() {
            StartOutcome::AlreadyRunning => {}
            StartOutcome::Started(_) => panic!("second session must be rejected"),
        }

        assert!(supervisor.stop());
        let (_, exit) = collect_events(&receiver);
        assert!(!exit.success());
        assert_eq!(supervisor.state(), SessionState::Idle);
    }

    #[cfg(unix)]
    #[test]
    fn proxy_is_paired_on_natural_exit() {
        let (mut supervisor, calls) = recording_supervisor();
        let command = shell_command("echo done");

        let StartOutcome::Started(receiver) = supervisor.start(&command, true).unwrap() else {
            panic!("expected a started session");
        };

        let (_, exit) = collect_events(&receiver);
        assert!(exit.success());
        wait_for_idle(&mut supervisor);
        assert_eq!(*calls.lock().unwrap(), vec!["enable", "disable"]);
    }

    #[cfg(unix)]
    #[test]
    fn proxy_is_paired_on_explicit_stop() {
        let (mut supervisor, calls) = recording_supervisor();
        let command = shell_command("sleep 30");

        let StartOutcome::Started(receiver) = supervisor.start(&command, true).unwrap() else {
            panic!("expected a started session");
        };
        assert!(supervisor.stop());

        let (_, exit) = collect_events(&receiver);
        assert!(!exit.success());
        assert_eq!(*calls.lock().unwrap(), vec!["enable", "disable"]);
    }

    #[cfg(unix)]
    #[test]
    fn proxy_is_restored_when_launch_fails() {
        let (mut supervisor, calls) = recording_supervisor();
        let command = ConnectorCommand {
            program: PathBuf::from("/nonexistent/zju-connect"),
            arguments: Vec::new(),
        };

        assert!(supervisor.start(&command, true).is_err());
        assert_eq!(supervisor.state(), SessionState::Idle);
        assert_eq!(*calls.lock().unwrap(), vec!["enable", "disable"]);
    }

    #[cfg(unix)]
    #[test]
    fn proxy_is_untouched_when_not_requested() {
        let (mut supervisor, calls) = recording_supervisor();
        let command = shell_command("echo done");

        let StartOutcome::Started(receiver) = supervisor.start(&command, false).unwrap() else {
            panic!("expected a started session");
        };
        let _ = collect_events(&receiver);
        wait_for_idle(&mut supervisor);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_code_is_reported_to_listener() {
        let (mut supervisor, _calls) = recording_supervisor();
        let command = shell_command("echo failing; exit 3");

        let StartOutcome::Started(receiver) = supervisor.start(&command, false).unwrap() else {
            panic!("expected a started session");
        };

        let (lines, exit) = collect_events(&receiver);
        assert_eq!(lines, vec!["failing"]);
        assert_eq!(exit.code, Some(3));
        assert!(!exit.success());
        wait_for_idle(&mut supervisor);
    }

    #[cfg(unix)]
    #[test]
    fn session_can_be_started_again_after_exit() {
        let (mut supervisor, _calls) = recording_supervisor();
        let command = shell_command("echo once");

        let StartOutcome::Started(receiver) = supervisor.start(&command, false).unwrap() else {
            panic!("expected a started session");
        };
        let _ = collect_events(&receiver);
        wait_for_idle(&mut supervisor);

        let StartOutcome::Started(receiver) = supervisor.start(&command, false).unwrap() else {
            panic!("expected a second session after the first ended");
        };
        let (lines, _) = collect_events(&receiver);
        assert_eq!(lines, vec!["once"]);
        wait_for_idle(&mut supervisor);
    }

    #[test]
    fn output_log_is_append_only() {
        let mut log = OutputLog::new();
        log.push("L1".into());
        log.push("L2".into());
        log.push("L1".into());
        assert_eq!(log.lines(), ["L1", "L2", "L1"]);
    }
}
