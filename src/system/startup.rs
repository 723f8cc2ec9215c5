//! Launch-at-login registration for the running executable.
//!
//! Windows: a value under the current user's `Run` registry key.
//! macOS: a LaunchAgent plist under `~/Library/LaunchAgents`.
//! Linux: an XDG autostart desktop entry under the config directory.

#[cfg(not(target_os = "windows"))]
use std::path::{Path, PathBuf};

#[cfg(target_os = "windows")]
const RUN_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Run";
#[cfg(target_os = "windows")]
const RUN_VALUE: &str = "HITSZ Connect Verge";

/// Registers or unregisters the running executable to start at login.
/// Failures are logged and swallowed, like the other OS side effects.
pub fn set_launch_at_login(enabled: bool) {
    if enabled {
        enable();
    } else {
        disable();
    }
}

#[cfg(target_os = "windows")]
pub fn launch_at_login_enabled() -> bool {
    windows_registry::CURRENT_USER
        .open(RUN_KEY)
        .and_then(|key| key.get_string(RUN_VALUE))
        .is_ok()
}

#[cfg(target_os = "windows")]
fn enable() {
    let Ok(exe) = std::env::current_exe() else {
        log::warn!("[startup] cannot resolve own executable path");
        return;
    };
    let command = format!("\"{}\"", exe.display());

    match windows_registry::CURRENT_USER.create(RUN_KEY) {
        Ok(key) => match key.set_string(RUN_VALUE, &command) {
            Ok(()) => log::info!("[startup] registered launch at login"),
            Err(error) => log::warn!("[startup] failed to set Run value: {error}"),
        },
        Err(error) => log::warn!("[startup] failed to open Run key: {error}"),
    }
}

#[cfg(target_os = "windows")]
fn disable() {
    match windows_registry::CURRENT_USER.create(RUN_KEY) {
        Ok(key) => {
            // Removing an absent value is fine.
            let _ = key.remove_value(RUN_VALUE);
            log::info!("[startup] unregistered launch at login");
        }
        Err(error) => log::warn!("[startup] failed to open Run key: {error}"),
    }
}

#[cfg(target_os = "macos")]
fn launch_agent_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Library/LaunchAgents/com.hitsz.connect-verge.plist")
}

#[cfg(target_os = "macos")]
pub fn launch_at_login_enabled() -> bool {
    launch_agent_path().exists()
}

#[cfg(target_os = "macos")]
fn launch_agent_contents(exe: &Path) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>com.hitsz.connect-verge</string>
    <key>ProgramArguments</key>
    <array>
        <string>{}</string>
    </array>
    <key>RunAtLoad</key>
    <true/>
    <key>KeepAlive</key>
    <false/>
</dict>
</plist>
"#,
        exe.display()
    )
}

#[cfg(target_os = "macos")]
fn enable() {
    let Ok(exe) = std::env::current_exe() else {
        log::warn!("[startup] cannot resolve own executable path");
        return;
    };
    write_registration_file(&launch_agent_path(), &launch_agent_contents(&exe));
}

#[cfg(target_os = "macos")]
fn disable() {
    remove_registration_file(&launch_agent_path());
}

#[cfg(target_os = "linux")]
fn autostart_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("autostart/hitsz-connect-verge.desktop")
}

#[cfg(target_os = "linux")]
pub fn launch_at_login_enabled() -> bool {
    autostart_path().exists()
}

#[cfg(target_os = "linux")]
fn desktop_entry_contents(exe: &Path) -> String {
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name=HITSZ Connect Verge\n\
         Exec={}\n\
         Terminal=false\n\
         Categories=Network;\n\
         X-GNOME-Autostart-enabled=true\n",
        exe.display()
    )
}

#[cfg(target_os = "linux")]
fn enable() {
    let Ok(exe) = std::env::current_exe() else {
        log::warn!("[startup] cannot resolve own executable path");
        return;
    };
    write_registration_file(&autostart_path(), &desktop_entry_contents(&exe));
}

#[cfg(target_os = "linux")]
fn disable() {
    remove_registration_file(&autostart_path());
}

#[cfg(not(target_os = "windows"))]
fn write_registration_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent()
        && let Err(error) = std::fs::create_dir_all(parent)
    {
        log::warn!(
            "[startup] failed to create directory {}: {error}",
            parent.display()
        );
        return;
    }
    match std::fs::write(path, contents) {
        Ok(()) => log::info!("[startup] registered launch at login: {}", path.display()),
        Err(error) => log::warn!("[startup] failed to write {}: {error}", path.display()),
    }
}

#[cfg(not(target_os = "windows"))]
fn remove_registration_file(path: &Path) {
    if !path.exists() {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(()) => log::info!("[startup] unregistered launch at login: {}", path.display()),
        Err(error) => log::warn!("[startup] failed to remove {}: {error}", path.display()),
    }
}
