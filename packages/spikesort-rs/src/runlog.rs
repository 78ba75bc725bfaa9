use crate::types::{ProbeLabel, Stage, StageResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One stage outcome.
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub session: PathBuf,
    pub probe: Option<ProbeLabel>,
    pub stage: Stage,
    pub result: StageResult,
}

/// Process-wide log of stage outcomes for one invocation.
///
/// Records are kept in memory, mirrored to the `log` facade and, when a file
/// is configured, appended to it as JSON lines.
pub struct RunLog {
    run_id: String,
    records: Vec<StageRecord>,
    sink: Option<File>,
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            records: Vec::new(),
            sink: None,
        }
    }

    pub fn with_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            sink: Some(file),
            ..Self::new()
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn record(
        &mut self,
        session: &Path,
        probe: Option<&ProbeLabel>,
        stage: Stage,
        result: StageResult,
    ) {
        let scope = match probe {
            Some(label) => format!("{} {}", session.display(), label),
            None => session.display().to_string(),
        };
        match &result {
            StageResult::Skipped => log::info!("[{}] {} already done, skipping", scope, stage),
            StageResult::Succeeded => log::info!("[{}] {} done", scope, stage),
            StageResult::Failed(reason) => log::error!("[{}] {} failed: {}", scope, stage, reason),
        }

        let record = StageRecord {
            run_id: self.run_id.clone(),
            timestamp: Utc::now(),
            session: session.to_path_buf(),
            probe: probe.cloned(),
            stage,
            result,
        };

        if let Err(e) = self.append(&record) {
            log::warn!("Failed to write run log: {}", e);
        }
        self.records.push(record);
    }

    fn append(&mut self, record: &StageRecord) -> io::Result<()> {
        let Some(file) = self.sink.as_mut() else {
            return Ok(());
        };
        let line = serde_json::to_string(record)?;
        writeln!(file, "{}", line)
    }

    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    /// Stage results for one probe of one session, in execution order.
    pub fn results_for(&self, session: &Path, probe: &ProbeLabel) -> Vec<(Stage, StageResult)> {
        self.records
            .iter()
            .filter(|r| r.session == session && r.probe.as_ref() == Some(probe))
            .map(|r| (r.stage, r.result.clone()))
            .collect()
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}
