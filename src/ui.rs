//! Progress reporting for long-running loads
//!
//! Loaders and the migrator report through [`Ui`] so the same code drives the
//! command line (logging via `tracing`) and the tests (silent).

use tracing::{debug, info};

/// Phases of a batch run
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Fetching,
    Downloading,
    Extracting,
    Loading,
    Migrating,
    Complete,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Fetching => write!(f, "Fetching Census data"),
            Phase::Downloading => write!(f, "Downloading boundaries"),
            Phase::Extracting => write!(f, "Extracting shapefile"),
            Phase::Loading => write!(f, "Loading tables"),
            Phase::Migrating => write!(f, "Migrating store"),
            Phase::Complete => write!(f, "Complete"),
        }
    }
}

/// Trait for UI implementations - allows both logging and silent/test modes
pub trait Ui {
    fn set_phase(&mut self, phase: Phase);
    fn set_info(&mut self, info: impl Into<String>);
    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>);
    fn clear_progress(&mut self);
    fn log(&mut self, message: impl Into<String>);
}

/// Forwards UI updates to `tracing`
#[derive(Default)]
pub struct LogUi {
    last_decile: Option<u64>,
}

impl LogUi {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ui for LogUi {
    fn set_phase(&mut self, phase: Phase) {
        self.last_decile = None;
        info!(%phase, "phase started");
    }

    fn set_info(&mut self, info: impl Into<String>) {
        info!("{}", info.into());
    }

    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>) {
        if total == 0 {
            return;
        }
        // One line per 10%, a shapefile download would flood the log otherwise
        let decile = (current * 10 / total).min(10);
        if self.last_decile != Some(decile) {
            self.last_decile = Some(decile);
            debug!(current, total, percent = decile * 10, "{}", label.into());
        }
    }

    fn clear_progress(&mut self) {
        self.last_decile = None;
    }

    fn log(&mut self, message: impl Into<String>) {
        info!("{}", message.into());
    }
}

/// Silent UI implementation for testing
#[derive(Default)]
pub struct SilentUi;

impl SilentUi {
    pub fn new() -> Self {
        Self
    }
}

impl Ui for SilentUi {
    fn set_phase(&mut self, _phase: Phase) {}
    fn set_info(&mut self, _info: impl Into<String>) {}
    fn set_progress(&mut self, _current: u64, _total: u64, _label: impl Into<String>) {}
    fn clear_progress(&mut self) {}
    fn log(&mut self, _message: impl Into<String>) {}
}

/// Records every log line, for asserting on what a run reported
#[cfg(test)]
#[derive(Default)]
pub struct RecordingUi {
    pub phases: Vec<Phase>,
    pub messages: Vec<String>,
}

#[cfg(test)]
impl Ui for RecordingUi {
    fn set_phase(&mut self, phase: Phase) {
        self.phases.push(phase);
    }
    fn set_info(&mut self, info: impl Into<String>) {
        self.messages.push(info.into());
    }
    fn set_progress(&mut self, _current: u64, _total: u64, _label: impl Into<String>) {}
    fn clear_progress(&mut self) {}
    fn log(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }
}
