use std::process::{Command, Stdio};

pub mod proxy;
pub mod startup;

#[cfg(target_os = "macos")]
pub(crate) mod macos;

#[cfg(target_os = "windows")]
pub(crate) mod windows;

#[cfg(target_os = "windows")]
pub(crate) const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Exit state of the connector process. `code` is `None` when the child
/// was terminated by a signal.
pub struct ChildExit {
    pub code: Option<i32>,
}

impl ChildExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl std::fmt::Display for ChildExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code: {code}"),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Ask the child to terminate. SIGTERM on Unix-like systems, the native
/// API on Windows. Best effort: a child that ignores the request keeps
/// running until the caller reaps it.
#[cfg(unix)]
pub fn terminate_process(process_id: u32) -> bool {
    let process_id_string = process_id.to_string();
    if run_silent("kill", &["-TERM", &process_id_string]) {
        log::info!("[terminate] sent SIGTERM to pid={process_id_string}");
        true
    } else {
        log::warn!("[terminate] SIGTERM failed for pid={process_id_string}");
        false
    }
}

#[cfg(target_os = "windows")]
pub fn terminate_process(process_id: u32) -> bool {
    windows::terminate_process(process_id)
}

pub fn run_silent_with_output(program: &str, arguments: &[&str]) -> (bool, String) {
    log::debug!("[cmd] {program} {}", arguments.join(" "));
    let mut command = Command::new(program);
    command
        .args(arguments)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    match command.output() {
        Ok(output) => {
            if !output.status.success() {
                log::debug!(
                    "[cmd] {program} exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim(),
                );
            }
            (
                output.status.success(),
                String::from_utf8_lossy(&output.stdout).to_string(),
            )
        }
        Err(error) => {
            log::debug!("[cmd] spawn error for {program}: {error}");
            (false, String::new())
        }
    }
}

pub fn run_silent(program: &str, arguments: &[&str]) -> bool {
    run_silent_with_output(program, arguments).0
}

pub fn parse_host_port(address: &str) -> (String, u16) {
    if let Some(index) = address.rfind(':') {
        let host = &address[..index];
        let port = address[index + 1..].parse::<u16>().unwrap_or(1081);
        (host.to_string(), port)
    } else {
        (address.to_string(), 1081)
    }
}
