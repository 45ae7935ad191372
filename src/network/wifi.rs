use crate::command::{run_command, CommandError};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const NETWORKSETUP: &str = "/usr/sbin/networksetup";
const SUDO: &str = "/usr/bin/sudo";

pub const DEFAULT_WIFI_DEVICE: &str = "en0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn as_arg(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

#[derive(Debug, Error)]
pub enum PowerError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("{path} отклонил запрос: {message}")]
    Rejected { path: &'static str, message: String },
}

pub trait PowerPath: Send + Sync {
    fn name(&self) -> &'static str;
    fn set_power(&self, device: &str, state: PowerState) -> Result<(), PowerError>;
}

pub struct NetworksetupPath {
    timeout: Duration,
}

impl NetworksetupPath {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl PowerPath for NetworksetupPath {
    fn name(&self) -> &'static str {
        "networksetup"
    }

    fn set_power(&self, device: &str, state: PowerState) -> Result<(), PowerError> {
        let out = run_command(
            NETWORKSETUP,
            &["-setairportpower", device, state.as_arg()],
            self.timeout,
        )?;
        check_output(self.name(), &out)
    }
}

/// Same command through `sudo -n`, so it fails fast instead of prompting.
pub struct SudoNetworksetupPath {
    timeout: Duration,
}

impl SudoNetworksetupPath {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl PowerPath for SudoNetworksetupPath {
    fn name(&self) -> &'static str {
        "sudo networksetup"
    }

    fn set_power(&self, device: &str, state: PowerState) -> Result<(), PowerError> {
        let out = run_command(
            SUDO,
            &["-n", NETWORKSETUP, "-setairportpower", device, state.as_arg()],
            self.timeout,
        )?;
        check_output(self.name(), &out)
    }
}

// networksetup exits 0 even when it refuses, and reports the problem on stdout.
fn check_output(path: &'static str, out: &str) -> Result<(), PowerError> {
    let text = out.trim();
    if text.contains("Error") || text.contains("error") {
        return Err(PowerError::Rejected {
            path,
            message: text.to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ToggleOutcome {
    Applied,
    FallbackApplied {
        primary_error: String,
    },
    Failed {
        primary_error: String,
        fallback_error: String,
    },
}

impl ToggleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::FallbackApplied { .. } => "fallback_applied",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Tries the primary path once, then the fallback once. No retries.
pub struct WifiToggler {
    primary: Box<dyn PowerPath>,
    fallback: Box<dyn PowerPath>,
}

impl WifiToggler {
    pub fn new(primary: Box<dyn PowerPath>, fallback: Box<dyn PowerPath>) -> Self {
        Self { primary, fallback }
    }

    pub fn host(timeout: Duration) -> Self {
        Self::new(
            Box::new(NetworksetupPath::new(timeout)),
            Box::new(SudoNetworksetupPath::new(timeout)),
        )
    }

    pub fn set_power(&self, device: Option<&str>, state: PowerState) -> ToggleOutcome {
        let device = device.unwrap_or(DEFAULT_WIFI_DEVICE);
        info!(device, %state, path = self.primary.name(), "переключение питания Wi-Fi");

        let primary_error = match self.primary.set_power(device, state) {
            Ok(()) => return ToggleOutcome::Applied,
            Err(err) => err.to_string(),
        };
        warn!(
            device,
            error = %primary_error,
            fallback = self.fallback.name(),
            "основной способ не сработал, пробуем запасной"
        );

        match self.fallback.set_power(device, state) {
            Ok(()) => ToggleOutcome::FallbackApplied { primary_error },
            Err(err) => ToggleOutcome::Failed {
                primary_error,
                fallback_error: err.to_string(),
            },
        }
    }
}
