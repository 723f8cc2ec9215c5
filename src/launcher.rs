//! Resolution and invocation shape of the external `zju-connect` binary.
//!
//! The connector ships alongside the application in a `core/` directory;
//! this module only locates it and builds its argument vector. Arguments
//! are handed to the OS as an argv array, so no shell quoting is involved.

use std::path::{Path, PathBuf};

pub fn connector_binary_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "zju-connect.exe"
    } else {
        "zju-connect"
    }
}

/// `<directory of the running executable>/core/zju-connect[.exe]`.
pub fn connector_binary_path() -> PathBuf {
    let base = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("core").join(connector_binary_name())
}

/// The bundled binary may land without its executable bits; set them before
/// the first invocation. No-op on Windows and for missing files.
pub fn ensure_executable(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if path.exists()
            && let Err(error) =
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        {
            log::warn!(
                "[launcher] failed to set executable permission on {}: {error}",
                path.display()
            );
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

#[derive(Debug, Clone)]
pub struct ConnectorCommand {
    pub program: PathBuf,
    pub arguments: Vec<String>,
}

impl ConnectorCommand {
    pub fn new(
        program: PathBuf,
        server_address: &str,
        dns_address: &str,
        username: &str,
        password: &str,
    ) -> Self {
        let arguments = vec![
            "-server".into(),
            server_address.into(),
            "-zju-dns-server".into(),
            dns_address.into(),
            "-username".into(),
            username.into(),
            "-password".into(),
            password.into(),
        ];
        Self { program, arguments }
    }

    /// Command line for logging, with the password value masked.
    pub fn redacted_command_line(&self) -> String {
        let mut rendered = vec![self.program.display().to_string()];
        let mut mask_next = false;
        for argument in &self.arguments {
            if mask_next {
                rendered.push("*".repeat(argument.len()));
                mask_next = false;
            } else {
                mask_next = argument == "-password";
                rendered.push(argument.clone());
            }
        }
        rendered.join(" ")
    }
}
