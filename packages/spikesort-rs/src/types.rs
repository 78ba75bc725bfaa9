use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Zero-byte file whose presence marks a session as ready for processing.
pub const TRIGGER_MARKER: &str = "spikesort_me.flag";

/// Raw-data subdirectory of every session.
pub const RAW_DATA_DIR: &str = "raw_ephys_data";

/// Processing stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    RegisterRawSync,
    SyncPulses,
    PulseEvents,
    RawQc,
    Conditioning,
    Sorting,
    Classification,
    Export,
    UnitTypeCopy,
    ClockSync,
    ScratchCleanup,
    Compression,
    RawCleanup,
}

impl Stage {
    pub const ALL: [Stage; 13] = [
        Stage::RegisterRawSync,
        Stage::SyncPulses,
        Stage::PulseEvents,
        Stage::RawQc,
        Stage::Conditioning,
        Stage::Sorting,
        Stage::Classification,
        Stage::Export,
        Stage::UnitTypeCopy,
        Stage::ClockSync,
        Stage::ScratchCleanup,
        Stage::Compression,
        Stage::RawCleanup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::RegisterRawSync => "register_raw_sync",
            Stage::SyncPulses => "sync_pulses",
            Stage::PulseEvents => "pulse_events",
            Stage::RawQc => "raw_qc",
            Stage::Conditioning => "conditioning",
            Stage::Sorting => "sorting",
            Stage::Classification => "classification",
            Stage::Export => "export",
            Stage::UnitTypeCopy => "unit_type_copy",
            Stage::ClockSync => "clock_sync",
            Stage::ScratchCleanup => "scratch_cleanup",
            Stage::Compression => "compression",
            Stage::RawCleanup => "raw_cleanup",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str() == name)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one stage for one probe (or for the session, for sync registration).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum StageResult {
    /// Expected artifacts were already on disk.
    Skipped,
    Succeeded,
    Failed(String),
}

impl StageResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, StageResult::Failed(_))
    }
}

impl fmt::Display for StageResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageResult::Skipped => write!(f, "skipped"),
            StageResult::Succeeded => write!(f, "succeeded"),
            StageResult::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Positional probe label of the form `probeNN`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProbeLabel(String);

impl ProbeLabel {
    /// Accepts only canonical folder names (`probe` followed by two digits).
    pub fn from_dir_name(name: &str) -> Option<Self> {
        let digits = name.strip_prefix("probe")?;
        if digits.len() == 2 && digits.chars().all(|c| c.is_ascii_digit()) {
            Some(Self(name.to_string()))
        } else {
            None
        }
    }

    /// Canonical label for a hardware index, e.g. `3` -> `probe03`.
    pub fn from_index(index: u32) -> Self {
        Self(format!("probe0{}", index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hardware index taken from the trailing digit of the label.
    pub fn index(&self) -> u32 {
        self.0
            .chars()
            .last()
            .and_then(|c| c.to_digit(10))
            .unwrap_or(0)
    }

    /// Acquisition stream id of the probe's action-potential band.
    pub fn stream_id(&self) -> String {
        format!("imec{}.ap", self.index())
    }
}

impl fmt::Display for ProbeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A recording session, identified by its directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    path: PathBuf,
}

impl Session {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.path.join(RAW_DATA_DIR)
    }

    pub fn marker(&self) -> PathBuf {
        self.path.join(TRIGGER_MARKER)
    }

    pub fn has_marker(&self) -> bool {
        self.marker().is_file()
    }

    /// Probes under the (normalized) raw-data directory, sorted by label.
    pub fn probes(&self) -> std::io::Result<Vec<Probe>> {
        let mut probes = Vec::new();
        for entry in std::fs::read_dir(self.raw_dir())? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(label) = ProbeLabel::from_dir_name(&name.to_string_lossy()) {
                probes.push(Probe::new(self, label));
            }
        }
        probes.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(probes)
    }
}

/// One probe of a session and the paths derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub label: ProbeLabel,
    session_path: PathBuf,
    raw_dir: PathBuf,
}

impl Probe {
    pub fn new(session: &Session, label: ProbeLabel) -> Self {
        let raw_dir = session.raw_dir().join(label.as_str());
        Self {
            label,
            session_path: session.path().to_path_buf(),
            raw_dir,
        }
    }

    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    /// Raw recording folder, `raw_ephys_data/probeNN`.
    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    /// Final processed output, `<session>/probeNN`. Its existence marks the probe as done.
    pub fn output_dir(&self) -> PathBuf {
        self.session_path.join(self.label.as_str())
    }

    pub fn error_log(&self) -> PathBuf {
        self.raw_dir.join(crate::artifacts::ERROR_LOG)
    }

    /// Failure report of any stage other than sorting.
    pub fn stage_error_log(&self) -> PathBuf {
        self.raw_dir.join(crate::artifacts::STAGE_ERROR_LOG)
    }

    pub fn sorter_dir(&self, sorter_folder: &str) -> PathBuf {
        self.raw_dir.join(sorter_folder)
    }

    pub fn sorter_output(&self, sorter_folder: &str) -> PathBuf {
        self.sorter_dir(sorter_folder)
            .join(crate::artifacts::SORTER_OUTPUT_DIR)
    }

    pub fn classification_dir(&self, sorter_folder: &str) -> PathBuf {
        self.sorter_dir(sorter_folder)
            .join(crate::artifacts::CLASSIFICATION_DIR)
    }
}

/// Signal conditioning operations, applied in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditioningStep {
    HighpassFilter,
    PhaseShift,
    InterpolateBadChannels,
    HighpassSpatialFilter,
}

impl ConditioningStep {
    pub const STANDARD: [ConditioningStep; 4] = [
        ConditioningStep::HighpassFilter,
        ConditioningStep::PhaseShift,
        ConditioningStep::InterpolateBadChannels,
        ConditioningStep::HighpassSpatialFilter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditioningStep::HighpassFilter => "highpass_filter",
            ConditioningStep::PhaseShift => "phase_shift",
            ConditioningStep::InterpolateBadChannels => "interpolate_bad_channels",
            ConditioningStep::HighpassSpatialFilter => "highpass_spatial_filter",
        }
    }
}

/// Conditioned signal handle passed from conditioning straight into sorting.
///
/// The chain is lazy: the sorter applies the steps while it reads the stream,
/// so nothing is written to disk for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionedSignal {
    pub recording: PathBuf,
    pub stream_id: String,
    pub steps: Vec<ConditioningStep>,
}

impl ConditionedSignal {
    pub fn preprocessing_arg(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Named output artifacts a stage produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifacts {
    pub produced: Vec<PathBuf>,
    pub conditioned: Option<ConditionedSignal>,
}

impl Artifacts {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_files(produced: Vec<PathBuf>) -> Self {
        Self {
            produced,
            conditioned: None,
        }
    }

    pub fn conditioned(signal: ConditionedSignal) -> Self {
        Self {
            produced: Vec::new(),
            conditioned: Some(signal),
        }
    }
}

/// Terminal outcome of one probe within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// Output directory already existed; nothing was run.
    AlreadyProcessed,
    /// All stages reached; warnings are best-effort problems (e.g. raw file left behind).
    Completed { warnings: Vec<String> },
    SortFailed { reason: String },
    Failed { stage: Stage, reason: String },
}

impl ProbeOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ProbeOutcome::SortFailed { .. } | ProbeOutcome::Failed { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub label: ProbeLabel,
    pub outcome: ProbeOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Every probe was attempted.
    Processed { probes: Vec<ProbeReport> },
    /// Nothing to do yet (no raw data); retried on the next invocation.
    Deferred { reason: String },
    /// Layout could not be normalized safely.
    Refused { reason: String },
    /// Session-level work failed before any probe could run.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub path: PathBuf,
    pub outcome: SessionOutcome,
    pub marker_removed: bool,
}

impl SessionReport {
    pub fn failed_probes(&self) -> usize {
        match &self.outcome {
            SessionOutcome::Processed { probes } => {
                probes.iter().filter(|p| p.outcome.is_failure()).count()
            }
            _ => 0,
        }
    }

    pub fn succeeded_probes(&self) -> usize {
        match &self.outcome {
            SessionOutcome::Processed { probes } => {
                probes.iter().filter(|p| !p.outcome.is_failure()).count()
            }
            _ => 0,
        }
    }

    /// Refused and failed sessions need operator attention.
    pub fn is_failure(&self) -> bool {
        matches!(
            self.outcome,
            SessionOutcome::Refused { .. } | SessionOutcome::Failed { .. }
        ) || self.failed_probes() > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// No probe or session failed.
    Clean,
    /// Some work failed, some succeeded.
    Partial,
    /// Work failed and nothing succeeded.
    Failed,
}

/// Everything one orchestrator invocation did.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub sessions: Vec<SessionReport>,
}

impl RunSummary {
    pub fn status(&self) -> RunStatus {
        let failures: usize = self
            .sessions
            .iter()
            .map(|s| match s.outcome {
                SessionOutcome::Refused { .. } | SessionOutcome::Failed { .. } => 1,
                _ => s.failed_probes(),
            })
            .sum();
        let successes: usize = self.sessions.iter().map(|s| s.succeeded_probes()).sum();

        if failures == 0 {
            RunStatus::Clean
        } else if successes > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        }
    }
}
