//! OS proxy strategies behind one capability trait.
//!
//! Exactly one backend exists per platform: the Windows registry, macOS
//! `networksetup`, or GNOME `gsettings`. Failures of the underlying OS
//! commands are logged and swallowed; the session supervisor never sees
//! them.

#[cfg(target_os = "linux")]
use super::run_silent;

pub trait ProxyBackend: Send {
    fn name(&self) -> &str;

    /// Point the OS HTTP/HTTPS proxy at `host:port`.
    fn enable(&mut self, host: &str, port: u16);

    /// Turn the OS proxy off. Issues its commands unconditionally; calling
    /// it when the proxy is already off is a no-op in effect.
    fn disable(&mut self);
}

#[cfg(target_os = "linux")]
pub fn detect() -> Vec<Box<dyn ProxyBackend>> {
    log::info!("[proxy] using backend: GSettings");
    vec![Box::new(GnomeProxy)]
}

#[cfg(target_os = "macos")]
pub fn detect() -> Vec<Box<dyn ProxyBackend>> {
    log::info!("[proxy] using backend: networksetup");
    vec![Box::new(super::macos::NetworkSetupProxy)]
}

#[cfg(target_os = "windows")]
pub fn detect() -> Vec<Box<dyn ProxyBackend>> {
    log::info!("[proxy] using backend: Windows Registry");
    vec![Box::new(super::windows::RegistryProxy)]
}

pub fn enable_all(backends: &mut [Box<dyn ProxyBackend>], host: &str, port: u16) {
    for backend in backends {
        log::info!("[proxy] enabling proxy via {}", backend.name());
        backend.enable(host, port);
    }
}

pub fn disable_all(backends: &mut [Box<dyn ProxyBackend>]) {
    for backend in backends {
        log::info!("[proxy] disabling proxy via {}", backend.name());
        backend.disable();
    }
}

#[cfg(target_os = "linux")]
pub struct GnomeProxy;

#[cfg(target_os = "linux")]
impl ProxyBackend for GnomeProxy {
    fn name(&self) -> &str {
        "GSettings"
    }

    fn enable(&mut self, host: &str, port: u16) {
        let port_string = port.to_string();

        log::info!("[proxy] GSettings: setting HTTP/HTTPS proxy to {host}:{port}");

        run_silent(
            "gsettings",
            &["set", "org.gnome.system.proxy", "mode", "manual"],
        );
        for protocol in &["http", "https"] {
            run_silent(
                "gsettings",
                &[
                    "set",
                    &format!("org.gnome.system.proxy.{protocol}"),
                    "host",
                    host,
                ],
            );
            run_silent(
                "gsettings",
                &[
                    "set",
                    &format!("org.gnome.system.proxy.{protocol}"),
                    "port",
                    &port_string,
                ],
            );
        }
    }

    fn disable(&mut self) {
        log::info!("[proxy] GSettings: clearing proxy settings");
        run_silent(
            "gsettings",
            &["set", "org.gnome.system.proxy", "mode", "none"],
        );
    }
}
