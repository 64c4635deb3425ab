//! `numpad-monitor`: headless keypad monitor.
//!
//! Finds a keypad, opens a [`KeypadDriver`] on it and logs every key event.
//! When the keypad is unplugged the monitor waits for it to come back and
//! reconnects.  Ctrl-C exits.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load config (--config or the platform default)
//!  └─ PresenceMonitor (polling thread, shared by every session)
//!  └─ loop
//!       ├─ wait_for_keypad()  -- rescans until a port is available
//!       └─ run_session()      -- driver open → ping → log keys → wait for removal
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use numpad_core::domain::{DeviceInfo, SerialSettings};
use numpad_driver::infrastructure::presence::enumerator::SystemEnumerator;
use numpad_driver::infrastructure::storage::config::{
    load_config, load_config_from, AppConfig, ConfigError,
};
use numpad_driver::{KeypadDriver, PresenceMonitor};

/// How long to wait between scans while no keypad is attached.
const RESCAN_INTERVAL: Duration = Duration::from_secs(1);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// SimpleNP keypad monitor.
///
/// Every option falls back to the config file when omitted.
#[derive(Debug, Parser)]
#[command(
    name = "numpad-monitor",
    about = "Logs key events from a SimpleNP USB numeric keypad",
    version
)]
struct Cli {
    /// Serial port of the keypad, e.g. `COM5` or `/dev/ttyACM0`.
    ///
    /// When neither this nor the config file names a port, the first
    /// recognised keypad is used.
    #[arg(long, env = "NUMPAD_PORT")]
    port: Option<String>,

    /// Line speed in bits per second.
    #[arg(long, env = "NUMPAD_BAUD_RATE")]
    baud_rate: Option<u32>,

    /// Path of the TOML config file.
    #[arg(long, env = "NUMPAD_CONFIG")]
    config: Option<PathBuf>,

    /// Presence polling interval in milliseconds.
    #[arg(long, env = "NUMPAD_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,
}

impl Cli {
    /// Loads the config file and applies the command-line overrides.
    ///
    /// A missing file, or no platform config directory when `--config` is
    /// absent, yields the defaults.
    fn load_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => match load_config() {
                Ok(config) => config,
                Err(ConfigError::NoPlatformConfigDir) => AppConfig::default(),
                Err(e) => return Err(e).context("failed to load config"),
            },
        };

        if let Some(ms) = self.poll_interval_ms {
            config.driver.poll_interval_ms = ms;
        }
        Ok(config)
    }

    fn target(&self, config: &AppConfig) -> Target {
        let preferred = match (&self.port, &config.serial) {
            (Some(port), Some(serial)) => Some(SerialSettings {
                port: port.clone(),
                ..serial.clone()
            }),
            (Some(port), None) => Some(SerialSettings::for_port(port.clone())),
            (None, serial) => serial.clone(),
        };
        Target {
            preferred,
            baud_rate: self.baud_rate,
        }
    }
}

// ── Port selection ────────────────────────────────────────────────────────────

/// Which keypad the monitor is looking for.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    /// A pinned port; `None` means "any recognised keypad".
    preferred: Option<SerialSettings>,
    baud_rate: Option<u32>,
}

impl Target {
    /// Picks settings for an attached keypad among `devices`.
    fn pick(&self, devices: &[DeviceInfo]) -> Option<SerialSettings> {
        let mut settings = match &self.preferred {
            Some(preferred) => devices
                .iter()
                .any(|d| d.port_name == preferred.port)
                .then(|| preferred.clone())?,
            None => SerialSettings::scan_all(devices).into_iter().next()?,
        };
        if let Some(baud_rate) = self.baud_rate {
            settings.baud_rate = baud_rate;
        }
        Some(settings)
    }
}

/// Rescans until a keypad matching `target` is attached, or returns `None`
/// on shutdown.
async fn wait_for_keypad(
    target: &Target,
    monitor: &PresenceMonitor,
    shutdown: &CancellationToken,
) -> Option<SerialSettings> {
    let mut announced = false;
    loop {
        match monitor.enumerate() {
            Ok(devices) => {
                if let Some(settings) = target.pick(&devices) {
                    return Some(settings);
                }
            }
            Err(e) => warn!("port enumeration failed: {e}"),
        }

        if !announced {
            info!("waiting for a keypad to be connected");
            announced = true;
        }
        tokio::select! {
            _ = shutdown.cancelled() => return None,
            _ = tokio::time::sleep(RESCAN_INTERVAL) => {}
        }
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Runs one driver until the keypad goes away or shutdown is requested.
async fn run_session(
    settings: SerialSettings,
    monitor: &PresenceMonitor,
    shutdown: &CancellationToken,
) -> anyhow::Result<()> {
    let port = settings.port.clone();
    let driver = KeypadDriver::open_serial(settings, monitor)
        .with_context(|| format!("failed to open keypad on {port}"))?;
    driver.ping().await.context("initial ping failed")?;

    // Each key event is acknowledged with a ping, off the receive task.
    let weak = Arc::downgrade(&driver);
    let _keys = driver.subscribe_key_state(move |event| {
        info!(key = %event.key, state = ?event.state, "key event");
        if let Some(driver) = weak.upgrade() {
            tokio::spawn(async move {
                if let Err(e) = driver.ping().await {
                    debug!("ping after key event failed: {e}");
                }
            });
        }
    });

    info!(%port, "keypad ready.  Press Ctrl-C to exit.");
    tokio::select! {
        _ = driver.closed() => info!(%port, "keypad disconnected"),
        _ = shutdown.cancelled() => driver.dispose(),
    }
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config();

    // `RUST_LOG` wins over the configured level.
    let fallback_level = config
        .as_ref()
        .map(|c| c.driver.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_level)),
        )
        .init();

    let config = config?;
    let target = cli.target(&config);
    info!("SimpleNP keypad monitor starting");

    let monitor = PresenceMonitor::with_interval(
        Arc::new(SystemEnumerator),
        config.driver.poll_interval(),
    );

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                shutdown_clone.cancel();
            }
            Err(e) => error!("failed to listen for Ctrl-C: {e}"),
        }
    });

    // ── Connect / reconnect loop ──────────────────────────────────────────────
    while let Some(settings) = wait_for_keypad(&target, &monitor, &shutdown).await {
        if let Err(e) = run_session(settings, &monitor, &shutdown).await {
            warn!("{e:#}");
            // Avoid spinning on a port that is listed but cannot be opened.
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(RESCAN_INTERVAL) => {}
            }
        }
        if shutdown.is_cancelled() {
            break;
        }
    }

    info!("SimpleNP keypad monitor stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn keypad(port: &str) -> DeviceInfo {
        DeviceInfo::new(port, "8857", "0323")
    }

    #[test]
    fn test_cli_defaults_leave_everything_to_config() {
        let cli = Cli::parse_from(["numpad-monitor"]);
        assert_eq!(cli.port, None);
        assert_eq!(cli.baud_rate, None);
        assert_eq!(cli.poll_interval_ms, None);
    }

    #[test]
    fn test_cli_port_overrides_config_port_but_keeps_line_settings() {
        // Arrange
        let cli = Cli::parse_from(["numpad-monitor", "--port", "COM7"]);
        let config = AppConfig {
            serial: Some(SerialSettings {
                baud_rate: 9600,
                ..SerialSettings::for_port("COM5")
            }),
            ..AppConfig::default()
        };

        // Act
        let target = cli.target(&config);

        // Assert
        let preferred = target.preferred.expect("preferred port");
        assert_eq!(preferred.port, "COM7");
        assert_eq!(preferred.baud_rate, 9600);
    }

    #[test]
    fn test_pick_scans_for_recognised_keypad() {
        // Arrange
        let target = Target {
            preferred: None,
            baud_rate: None,
        };
        let devices = vec![DeviceInfo::new("COM3", "1234", "5678"), keypad("COM9")];

        // Act
        let settings = target.pick(&devices).expect("keypad found");

        // Assert
        assert_eq!(settings.port, "COM9");
        assert!(settings.recognition.is_some());
    }

    #[test]
    fn test_pick_preferred_port_requires_it_to_be_attached() {
        let target = Target {
            preferred: Some(SerialSettings::for_port("COM5")),
            baud_rate: None,
        };
        assert!(target.pick(&[keypad("COM9")]).is_none());
        assert_eq!(
            target.pick(&[keypad("COM5")]).map(|s| s.port),
            Some("COM5".to_string())
        );
    }

    #[test]
    fn test_pick_applies_baud_rate_override() {
        let target = Target {
            preferred: None,
            baud_rate: Some(57_600),
        };
        let settings = target.pick(&[keypad("COM9")]).expect("keypad found");
        assert_eq!(settings.baud_rate, 57_600);
    }

    #[test]
    fn test_load_config_applies_poll_interval_override() {
        // Arrange – a path that does not exist yields the defaults
        let cli = Cli::parse_from([
            "numpad-monitor",
            "--config",
            "/nonexistent/numpad/numpad.toml",
            "--poll-interval-ms",
            "250",
        ]);

        // Act
        let config = cli.load_config().expect("defaults");

        // Assert
        assert_eq!(config.driver.poll_interval_ms, 250);
        assert_eq!(config.driver.poll_interval(), Duration::from_millis(250));
    }
}
