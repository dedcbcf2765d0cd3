//! Latcher daemon entry point.
//!
//! Wires together the infrastructure and runs until SIGINT/SIGTERM:
//!
//! ```text
//! main()
//!  └─ DaemonConfig::load()   -- TOML config, defaults on first run
//!  └─ UinputSink::create()   -- the single virtual output device (fatal on failure)
//!  └─ LatchController        -- registry + shared engine + workers
//!       ├─ one worker thread per configured device
//!       └─ ChannelObserver   -- state snapshots, drained into the log below
//! ```
//!
//! Any presentation layer would consume the same control surface and
//! snapshot channel; this binary's "UI" is the structured log.

#[cfg(target_os = "linux")]
fn main() -> anyhow::Result<()> {
    linux_main::run()
}

#[cfg(not(target_os = "linux"))]
fn main() {
    eprintln!("latcherd requires Linux (evdev/uinput)");
    std::process::exit(1);
}

#[cfg(target_os = "linux")]
mod linux_main {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc::RecvTimeoutError;
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Context;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use tracing::{error, info, warn};
    use tracing_subscriber::EnvFilter;

    use latcherd::application::controller::LatchController;
    use latcherd::application::observer::ChannelObserver;
    use latcherd::infrastructure::device::linux::EvdevFactory;
    use latcherd::infrastructure::sink::uinput::UinputSink;
    use latcherd::infrastructure::storage::config::DaemonConfig;

    pub fn run() -> anyhow::Result<()> {
        let config_path = DaemonConfig::default_path().context("resolving config location")?;
        let config = DaemonConfig::load(&config_path)
            .with_context(|| format!("loading config from {}", config_path.display()))?;

        // Structured logging. Level comes from the config, `RUST_LOG` wins.
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(config.daemon.log_level.clone())),
            )
            .init();

        info!("Latcher daemon starting");

        // ── Virtual output device ─────────────────────────────────────────────
        let sink = UinputSink::create().context("creating the virtual output device")?;

        // ── Controller ────────────────────────────────────────────────────────
        let (observer, snapshots) = ChannelObserver::new();
        let mut controller = LatchController::new(
            Box::new(sink),
            Box::new(EvdevFactory),
            Arc::new(observer),
        );

        for entry in &config.devices {
            if let Err(error) = controller.add_device(&entry.path) {
                error!(path = %entry.path.display(), %error, "failed to register device");
            }
        }

        if controller.devices().is_empty() {
            warn!(
                config = %config_path.display(),
                "no devices registered, add [[devices]] entries to the config"
            );
        } else if config.daemon.autostart {
            controller.start().context("starting the input controller")?;
        }

        // ── Shutdown flag ─────────────────────────────────────────────────────
        let term = Arc::new(AtomicBool::new(false));
        for signal in [SIGINT, SIGTERM] {
            signal_hook::flag::register(signal, Arc::clone(&term))
                .context("registering signal handler")?;
        }

        info!("Latcher ready, press Ctrl-C to exit");

        // ── Snapshot pump ─────────────────────────────────────────────────────
        while !term.load(Ordering::Relaxed) {
            match snapshots.recv_timeout(Duration::from_millis(250)) {
                Ok(state) => info!(
                    trigger = %state
                        .trigger_code
                        .map(key_name)
                        .unwrap_or_else(|| "none".to_string()),
                    latched = %format_keys(&state.latched_keys),
                    held = state.trigger_held,
                    devices = state.device_count,
                    running = state.running,
                    "state changed"
                ),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        info!("shutdown signal received");
        controller.stop();
        Ok(())
    }

    /// `KEY_A`-style name for a code, for the humans reading the log.
    fn key_name(code: u16) -> String {
        format!("{:?}", evdev::Key::new(code))
    }

    fn format_keys(codes: &[u16]) -> String {
        if codes.is_empty() {
            return "none".to_string();
        }
        codes
            .iter()
            .map(|&code| key_name(code))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
