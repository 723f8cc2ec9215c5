use super::proxy::ProxyBackend;

mod win32 {
    use windows::Win32::{
        Foundation::CloseHandle,
        System::Threading::{OpenProcess, PROCESS_TERMINATE, TerminateProcess},
    };

    pub fn terminate(process_id: u32, exit_code: u32) -> bool {
        unsafe {
            let handle = match OpenProcess(PROCESS_TERMINATE, false, process_id) {
                Ok(handle) => handle,
                Err(error) => {
                    log::warn!("[win32] OpenProcess failed for pid {process_id}: {error}");
                    return false;
                }
            };
            let result = TerminateProcess(handle, exit_code);
            let _ = CloseHandle(handle);
            if let Err(error) = result {
                log::warn!("[win32] TerminateProcess failed for pid {process_id}: {error}");
                return false;
            }
            true
        }
    }
}

pub fn terminate_process(process_id: u32) -> bool {
    log::info!("[terminate] terminating pid {process_id} via native API");
    win32::terminate(process_id, 0)
}

const INTERNET_SETTINGS_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Internet Settings";

fn notify_proxy_settings_changed() {
    use windows::Win32::Networking::WinInet::{
        INTERNET_OPTION_REFRESH, INTERNET_OPTION_SETTINGS_CHANGED, InternetSetOptionW,
    };

    unsafe {
        let _ = InternetSetOptionW(None, INTERNET_OPTION_SETTINGS_CHANGED, None, 0);
        let _ = InternetSetOptionW(None, INTERNET_OPTION_REFRESH, None, 0);
    }
}

/// Toggles `ProxyEnable`/`ProxyServer` under the current user's Internet
/// Settings key, then tells WinInet the settings changed.
pub struct RegistryProxy;

impl ProxyBackend for RegistryProxy {
    fn name(&self) -> &str {
        "Windows Registry"
    }

    fn enable(&mut self, host: &str, port: u16) {
        let proxy_value = format!("{host}:{port}");

        log::info!("[proxy] registry: setting system proxy to {proxy_value}");

        match windows_registry::CURRENT_USER.create(INTERNET_SETTINGS_KEY) {
            Ok(key) => {
                if let Err(error) = key.set_u32("ProxyEnable", 1) {
                    log::warn!("[proxy] failed to set ProxyEnable: {error}");
                }
                if let Err(error) = key.set_string("ProxyServer", &proxy_value) {
                    log::warn!("[proxy] failed to set ProxyServer: {error}");
                }
            }
            Err(error) => {
                log::warn!("[proxy] failed to open registry key: {error}");
            }
        }

        notify_proxy_settings_changed();
    }

    fn disable(&mut self) {
        log::info!("[proxy] registry: disabling system proxy");

        match windows_registry::CURRENT_USER.create(INTERNET_SETTINGS_KEY) {
            Ok(key) => {
                if let Err(error) = key.set_u32("ProxyEnable", 0) {
                    log::warn!("[proxy] failed to set ProxyEnable: {error}");
                }
            }
            Err(error) => {
                log::warn!("[proxy] failed to open registry key: {error}");
            }
        }

        notify_proxy_settings_changed();
    }
}
