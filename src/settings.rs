use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVER_ADDRESS: &str = "vpn.hitsz.edu.cn";
pub const DEFAULT_DNS_ADDRESS: &str = "10.248.98.30";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    #[serde(default = "default_server")]
    pub server: String,
    #[serde(default = "default_dns")]
    pub dns: String,
    #[serde(default = "default_proxy")]
    pub proxy: bool,
    #[serde(default)]
    pub connect_on_startup: bool,
    #[serde(default)]
    pub launch_at_login: bool,
}

fn default_server() -> String {
    DEFAULT_SERVER_ADDRESS.into()
}

fn default_dns() -> String {
    DEFAULT_DNS_ADDRESS.into()
}

fn default_proxy() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: default_server(),
            dns: default_dns(),
            proxy: default_proxy(),
            connect_on_startup: false,
            launch_at_login: false,
        }
    }
}

impl Settings {
    pub fn settings_file_path() -> PathBuf {
        configuration_directory().join("settings.toml")
    }

    pub fn load() -> Self {
        Self::load_from(&Self::settings_file_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(settings) => {
                    log::info!("[settings] loaded from {}", path.display());
                    settings
                }
                Err(error) => {
                    log::warn!("[settings] failed to parse {}: {error}", path.display());
                    Self::default()
                }
            },
            Err(_) => {
                log::info!(
                    "[settings] no settings file at {}, using defaults",
                    path.display()
                );
                Self::default()
            }
        }
    }

    pub fn save(&self) {
        self.save_to(&Self::settings_file_path());
    }

    pub fn save_to(&self, path: &Path) {
        let content = match toml::to_string_pretty(self) {
            Ok(content) => content,
            Err(error) => {
                log::warn!("[settings] failed to serialize settings: {error}");
                return;
            }
        };

        if let Some(parent) = path.parent()
            && let Err(error) = std::fs::create_dir_all(parent)
        {
            log::warn!(
                "[settings] failed to create directory {}: {error}",
                parent.display()
            );
            return;
        }

        match std::fs::write(path, content) {
            Ok(()) => log::info!("[settings] saved to {}", path.display()),
            Err(error) => log::warn!("[settings] failed to write {}: {error}", path.display()),
        }
    }
}

pub fn configuration_directory() -> PathBuf {
    let directory = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hitsz-connect-verge");
    if let Err(error) = std::fs::create_dir_all(&directory) {
        log::warn!(
            "[settings] failed to create configuration directory {}: {error}",
            directory.display()
        );
    }
    directory
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temporary_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "hitsz-connect-verge-test-{}-{name}.toml",
            std::process::id()
        ))
    }

    #[test]
    fn defaults_match_fixed_connection_parameters() {
        let settings = Settings::default();
        assert_eq!(settings.server, "vpn.hitsz.edu.cn");
        assert_eq!(settings.dns, "10.248.98.30");
        assert!(settings.proxy);
        assert!(!settings.connect_on_startup);
        assert!(!settings.launch_at_login);
    }

    #[test]
    fn save_then_load_round_trips() {
        let path = temporary_path("round-trip");
        let settings = Settings {
            server: "vpn.example.edu".into(),
            dns: "10.0.0.53".into(),
            proxy: false,
            connect_on_startup: true,
            launch_at_login: true,
        };

        settings.save_to(&path);
        assert_eq!(Settings::load_from(&path), settings);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_or_invalid_file_falls_back_to_defaults() {
        let missing = temporary_path("missing");
        let _ = std::fs::remove_file(&missing);
        assert_eq!(Settings::load_from(&missing), Settings::default());

        let invalid = temporary_path("invalid");
        std::fs::write(&invalid, "server = [not toml").unwrap();
        assert_eq!(Settings::load_from(&invalid), Settings::default());
        let _ = std::fs::remove_file(&invalid);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = temporary_path("partial");
        std::fs::write(&path, "proxy = false\n").unwrap();

        let settings = Settings::load_from(&path);
        assert!(!settings.proxy);
        assert_eq!(settings.server, DEFAULT_SERVER_ADDRESS);
        assert_eq!(settings.dns, DEFAULT_DNS_ADDRESS);

        let _ = std::fs::remove_file(&path);
    }
}
