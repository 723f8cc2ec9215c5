use super::{proxy::ProxyBackend, run_silent, run_silent_with_output};

/// Configures web and secure-web proxies per enumerated network service,
/// the way `networksetup` expects.
pub struct NetworkSetupProxy;

impl ProxyBackend for NetworkSetupProxy {
    fn name(&self) -> &str {
        "networksetup"
    }

    fn enable(&mut self, host: &str, port: u16) {
        let port_string = port.to_string();

        for service in list_network_services() {
            log::info!("[proxy] networksetup: enabling proxy on '{service}' ({host}:{port})");
            run_silent(
                "networksetup",
                &["-setwebproxy", &service, host, &port_string],
            );
            run_silent(
                "networksetup",
                &["-setsecurewebproxy", &service, host, &port_string],
            );
        }
    }

    fn disable(&mut self) {
        for service in list_network_services() {
            log::info!("[proxy] networksetup: disabling proxy on '{service}'");
            run_silent("networksetup", &["-setwebproxystate", &service, "off"]);
            run_silent(
                "networksetup",
                &["-setsecurewebproxystate", &service, "off"],
            );
        }
    }
}

fn list_network_services() -> Vec<String> {
    let (success, listing) = run_silent_with_output("networksetup", &["-listallnetworkservices"]);
    if !success {
        log::warn!("[proxy] networksetup -listallnetworkservices failed");
        return Vec::new();
    }
    parse_network_services(&listing)
}

/// The first line is a legend; services prefixed with `*` are disabled.
fn parse_network_services(listing: &str) -> Vec<String> {
    listing
        .lines()
        .skip(1)
        .filter(|line| !line.is_empty() && !line.starts_with('*'))
        .map(|line| line.to_string())
        .collect()
}
