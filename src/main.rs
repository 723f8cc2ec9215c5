mod credentials;
mod launcher;
mod session;
mod settings;
mod system;

use std::{
    io::Write,
    sync::mpsc::{RecvTimeoutError, channel},
    time::Duration,
};

use crate::{
    credentials::CredentialStore,
    launcher::ConnectorCommand,
    session::{OutputLog, SessionEvent, SessionState, StartOutcome, Supervisor},
    settings::Settings,
    system::{proxy, startup},
};

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("hitsz_connect_verge=info"),
    )
    .init();

    log::info!(
        "hitsz-connect-verge v{} starting (RUST_LOG={})",
        env!("CARGO_PKG_VERSION"),
        std::env::var("RUST_LOG").unwrap_or_else(|_| "<default: info>".into()),
    );

    let settings_path = Settings::settings_file_path();
    let settings = Settings::load();
    if !settings_path.exists() {
        settings.save();
    }

    if settings.launch_at_login != startup::launch_at_login_enabled() {
        startup::set_launch_at_login(settings.launch_at_login);
    }

    let store = CredentialStore::open();
    let saved = store.load();
    let (username, password) = if saved.is_empty() {
        prompt_credentials(&store)
    } else {
        (saved.username, saved.password)
    };

    if username.is_empty() {
        log::error!("[startup] no credentials available, exiting");
        std::process::exit(2);
    }

    let binary_path = launcher::connector_binary_path();
    if !binary_path.exists() {
        log::warn!(
            "[startup] connector binary not found at {}",
            binary_path.display()
        );
    }
    launcher::ensure_executable(&binary_path);

    let command = ConnectorCommand::new(
        binary_path,
        &settings.server,
        &settings.dns,
        &username,
        &password,
    );

    if settings.connect_on_startup {
        log::info!("[startup] connect on startup enabled, connecting");
    } else {
        let _ = prompt_line("press Enter to connect: ");
    }

    let mut supervisor = Supervisor::new(proxy::detect());
    supervisor.set_session_logging(true);
    let receiver = match supervisor.start(&command, settings.proxy) {
        Ok(StartOutcome::Started(receiver)) => receiver,
        Ok(StartOutcome::AlreadyRunning) => {
            log::warn!("[startup] already connected");
            return;
        }
        Err(error) => {
            log::error!("[startup] failed to launch connector: {error}");
            std::process::exit(1);
        }
    };

    // Enter disconnects; the connector exiting on its own ends the run too.
    if supervisor.state() == SessionState::Running {
        println!("connected - press Enter to disconnect");
    }
    let (stop_sender, stop_receiver) = channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_ok() {
            let _ = stop_sender.send(());
        }
    });

    let mut output_log = OutputLog::new();
    loop {
        if stop_receiver.try_recv().is_ok() {
            log::info!("[shutdown] disconnect requested");
            supervisor.stop();
        }

        match receiver.recv_timeout(Duration::from_millis(200)) {
            Ok(SessionEvent::Output(line)) => {
                println!("{line}");
                output_log.push(line);
            }
            Ok(SessionEvent::Finished(exit)) => {
                if exit.success() {
                    log::info!("[shutdown] connector exited normally");
                } else {
                    log::warn!("[shutdown] connector exited abnormally ({exit})");
                }
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    log::info!(
        "[shutdown] session ended after {} output lines",
        output_log.lines().len()
    );
}

/// First run without saved credentials: ask once on stdin. Declining
/// "remember" also removes anything previously stored.
fn prompt_credentials(store: &CredentialStore) -> (String, String) {
    let username = prompt_line("username: ");
    let password = prompt_line("password: ");
    let remember = prompt_line("remember password? [Y/n]: ");

    if remember.eq_ignore_ascii_case("n") {
        store.clear();
    } else if !username.is_empty() {
        store.save(&username, &password);
    }

    (username, password)
}

fn prompt_line(prompt: &str) -> String {
    print!("{prompt}");
    let _ = std::io::stdout().flush();

    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return String::new();
    }
    line.trim_end_matches(['\r', '\n']).to_string()
}
