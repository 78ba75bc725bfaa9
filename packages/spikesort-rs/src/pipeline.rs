use crate::adapters::{Delegates, StageContext};
use crate::artifacts;
use crate::config::Settings;
use crate::error::{FailureKind, StageFailure};
use crate::runlog::RunLog;
use crate::state::{infer_state, ArtifactInventory};
use crate::types::{
    Artifacts, ConditionedSignal, Probe, ProbeOutcome, ProbeReport, Session, Stage, StageResult,
};
use std::fs;
use std::io;
use std::path::PathBuf;

/// Drives each probe of a session through the ordered stage list.
///
/// Probes run strictly one after another. A failing stage ends its own probe
/// (error log written, remaining stages skipped) and the next probe starts as
/// if nothing happened.
pub struct StagePipeline<'a> {
    settings: &'a Settings,
    delegates: &'a Delegates,
    sorter_folder: String,
}

impl<'a> StagePipeline<'a> {
    pub fn new(settings: &'a Settings, delegates: &'a Delegates) -> Self {
        Self {
            settings,
            delegates,
            sorter_folder: settings.sorter_folder(),
        }
    }

    /// Attempt every probe of a normalized session.
    pub async fn run_session(
        &self,
        session: &Session,
        run_log: &mut RunLog,
    ) -> io::Result<Vec<ProbeReport>> {
        let probes = session.probes()?;
        log::info!(
            "{} probe(s) found in {}",
            probes.len(),
            session.raw_dir().display()
        );

        let mut reports = Vec::with_capacity(probes.len());
        for probe in probes {
            let outcome = self.run_probe(&probe, run_log).await;
            reports.push(ProbeReport {
                label: probe.label.clone(),
                outcome,
            });
        }
        Ok(reports)
    }

    pub async fn run_probe(&self, probe: &Probe, run_log: &mut RunLog) -> ProbeOutcome {
        if probe.output_dir().is_dir() {
            log::info!("{} already processed, moving on", probe.label);
            return ProbeOutcome::AlreadyProcessed;
        }

        match ArtifactInventory::scan(probe, &self.sorter_folder) {
            Ok(inv) => log::info!("{} resuming from state {}", probe.label, infer_state(&inv)),
            Err(e) => log::warn!("Could not inspect artifacts of {}: {}", probe.label, e),
        }
        clear_error_logs(probe);

        match self.run_stages(probe, run_log).await {
            Ok(warnings) => {
                log::info!("{} done", probe.label);
                ProbeOutcome::Completed { warnings }
            }
            Err(failure) => {
                write_error_log(probe, &failure);
                if failure.stage == Stage::Sorting {
                    ProbeOutcome::SortFailed {
                        reason: failure.message,
                    }
                } else {
                    ProbeOutcome::Failed {
                        stage: failure.stage,
                        reason: failure.message,
                    }
                }
            }
        }
    }

    async fn run_stages(
        &self,
        probe: &Probe,
        run_log: &mut RunLog,
    ) -> Result<Vec<String>, StageFailure> {
        let inv = self.inventory(probe, Stage::SyncPulses)?;
        self.gated(probe, Stage::SyncPulses, inv.sync_pulses, run_log)
            .await?;
        let inv = self.inventory(probe, Stage::PulseEvents)?;
        self.gated(probe, Stage::PulseEvents, inv.pulse_events, run_log)
            .await?;

        let inv = self.inventory(probe, Stage::RawQc)?;
        self.gated(probe, Stage::RawQc, inv.qc_spectrum, run_log)
            .await?;

        let conditioned = self
            .execute(probe, Stage::Conditioning, None, run_log)
            .await?
            .conditioned
            .ok_or_else(|| {
                self.fail(
                    probe,
                    Stage::Conditioning,
                    FailureKind::MissingInput,
                    "conditioning produced no signal handle",
                    run_log,
                )
            })?;

        log::info!("Starting {} spike sorting", probe.label);
        self.prepare_sorter_params(probe)
            .map_err(|e| self.fail(probe, Stage::Sorting, FailureKind::Io, e.to_string(), run_log))?;
        self.execute(probe, Stage::Sorting, Some(conditioned), run_log)
            .await?;

        let classified = self.settings.run_bombcell();
        if classified {
            log::info!("Running unit classification for {}", probe.label);
            self.execute(probe, Stage::Classification, None, run_log)
                .await?;
        }

        fs::create_dir_all(probe.output_dir())
            .map_err(|e| self.fail(probe, Stage::Export, FailureKind::Io, e.to_string(), run_log))?;
        match self.finish_output(probe, classified, run_log).await {
            Ok(warnings) => Ok(warnings),
            Err(failure) => {
                // A leftover output directory would make the next run skip this probe entirely.
                if let Err(e) = fs::remove_dir_all(probe.output_dir()) {
                    log::warn!("Could not remove partial output of {}: {}", probe.label, e);
                }
                Err(failure)
            }
        }
    }

    /// Stages that run once the output directory exists: export through raw cleanup.
    async fn finish_output(
        &self,
        probe: &Probe,
        classified: bool,
        run_log: &mut RunLog,
    ) -> Result<Vec<String>, StageFailure> {
        let mut warnings = Vec::new();

        self.execute(probe, Stage::Export, None, run_log).await?;

        if classified {
            let result = copy_unit_types(probe, &self.sorter_folder);
            self.record(probe, Stage::UnitTypeCopy, &result.as_ref().map(|_| ()), run_log);
            result?;
        }

        self.execute(probe, Stage::ClockSync, None, run_log)
            .await?;

        self.remove_scratch(probe, run_log, &mut warnings);

        let inv = self.inventory(probe, Stage::Compression)?;
        if inv.compressed == 0 {
            log::info!("Compressing raw binary file of {}", probe.label);
        }
        self.gated(probe, Stage::Compression, inv.compressed > 0, run_log)
            .await?;

        self.remove_uncompressed(probe, run_log, &mut warnings);

        Ok(warnings)
    }

    fn inventory(&self, probe: &Probe, stage: Stage) -> Result<ArtifactInventory, StageFailure> {
        ArtifactInventory::scan(probe, &self.sorter_folder)
            .map_err(|e| StageFailure::io(stage, e))
    }

    /// Run `stage` unless its artifact is already present.
    async fn gated(
        &self,
        probe: &Probe,
        stage: Stage,
        done: bool,
        run_log: &mut RunLog,
    ) -> Result<Artifacts, StageFailure> {
        if done {
            run_log.record(probe.session_path(), Some(&probe.label), stage, StageResult::Skipped);
            return Ok(Artifacts::none());
        }
        self.execute(probe, stage, None, run_log).await
    }

    async fn execute(
        &self,
        probe: &Probe,
        stage: Stage,
        conditioned: Option<ConditionedSignal>,
        run_log: &mut RunLog,
    ) -> Result<Artifacts, StageFailure> {
        log::info!("Starting {} for {}", stage, probe.label);
        let mut ctx = StageContext::for_probe_in(stage, probe, self.settings, &self.sorter_folder);
        if let Some(signal) = conditioned {
            ctx = ctx.with_conditioned(signal);
        }
        let result = self.delegates.run(&ctx).await;
        self.record(probe, stage, &result.as_ref().map(|_| ()), run_log);
        result
    }

    fn record(
        &self,
        probe: &Probe,
        stage: Stage,
        result: &Result<(), &StageFailure>,
        run_log: &mut RunLog,
    ) {
        let result = match result {
            Ok(()) => StageResult::Succeeded,
            Err(failure) => StageResult::Failed(failure.message.clone()),
        };
        run_log.record(probe.session_path(), Some(&probe.label), stage, result);
    }

    fn fail(
        &self,
        probe: &Probe,
        stage: Stage,
        kind: FailureKind,
        message: impl Into<String>,
        run_log: &mut RunLog,
    ) -> StageFailure {
        let failure = StageFailure::new(stage, kind, message);
        self.record(probe, stage, &Err(&failure), run_log);
        failure
    }

    /// Effective sorter parameters, written where the sorting delegate expects them.
    fn prepare_sorter_params(&self, probe: &Probe) -> io::Result<PathBuf> {
        let sorter_dir = probe.sorter_dir(&self.sorter_folder);
        fs::create_dir_all(&sorter_dir)?;
        let path = sorter_dir.join(artifacts::SORTER_PARAMS_FILE);
        let json = serde_json::to_string_pretty(&self.settings.sorter_params.to_json())?;
        fs::write(&path, json)?;
        Ok(path)
    }

    fn remove_scratch(&self, probe: &Probe, run_log: &mut RunLog, warnings: &mut Vec<String>) {
        let scratch = probe
            .sorter_output(&self.sorter_folder)
            .join(artifacts::SORTER_SCRATCH);
        let result = if !scratch.is_file() {
            StageResult::Skipped
        } else {
            match fs::remove_file(&scratch) {
                Ok(()) => StageResult::Succeeded,
                Err(e) => {
                    let msg = format!("Could not remove {}: {}", scratch.display(), e);
                    warnings.push(msg.clone());
                    StageResult::Failed(msg)
                }
            }
        };
        run_log.record(probe.session_path(), Some(&probe.label), Stage::ScratchCleanup, result);
    }

    /// Delete the original `*.ap.bin` once exactly one compressed stream exists.
    ///
    /// Best effort: a failure leaves the file for manual deletion and the probe
    /// still counts as complete.
    fn remove_uncompressed(
        &self,
        probe: &Probe,
        run_log: &mut RunLog,
        warnings: &mut Vec<String>,
    ) {
        let result = match (
            artifacts::compressed_ap_files(probe.raw_dir()),
            artifacts::uncompressed_ap_files(probe.raw_dir()),
        ) {
            (Ok(_), Ok(originals)) if originals.is_empty() => StageResult::Skipped,
            (Ok(compressed), Ok(originals)) if compressed.len() == 1 && originals.len() == 1 => {
                match fs::remove_file(&originals[0]) {
                    Ok(()) => StageResult::Succeeded,
                    Err(e) => StageResult::Failed(format!(
                        "Could not remove uncompressed ap bin file {}, delete manually: {}",
                        originals[0].display(),
                        e
                    )),
                }
            }
            (Ok(compressed), Ok(originals)) => StageResult::Failed(format!(
                "Expected one compressed and one uncompressed stream, found {} and {}; leaving raw data in place",
                compressed.len(),
                originals.len()
            )),
            (Err(e), _) | (_, Err(e)) => StageResult::Failed(e.to_string()),
        };
        if let StageResult::Failed(msg) = &result {
            warnings.push(msg.clone());
        }
        run_log.record(probe.session_path(), Some(&probe.label), Stage::RawCleanup, result);
    }
}

/// Copy the classifier's unit-type table into the output and persist its summary column.
fn copy_unit_types(probe: &Probe, sorter_folder: &str) -> Result<(), StageFailure> {
    let stage = Stage::UnitTypeCopy;
    let source = probe
        .sorter_output(sorter_folder)
        .join(artifacts::UNIT_TYPE_TABLE);
    if !source.is_file() {
        return Err(StageFailure::missing_input(
            stage,
            format!("{} not found", source.display()),
        ));
    }
    let table = probe.output_dir().join(artifacts::UNIT_TYPE_TABLE);
    fs::copy(&source, &table).map_err(|e| StageFailure::io(stage, e))?;

    let parse_err = |e: csv::Error| StageFailure::new(stage, FailureKind::Parse, e.to_string());
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(&table)
        .map_err(parse_err)?;
    let column = reader
        .headers()
        .map_err(parse_err)?
        .iter()
        .position(|h| h.trim() == artifacts::UNIT_TYPE_COLUMN)
        .ok_or_else(|| {
            StageFailure::new(
                stage,
                FailureKind::Parse,
                format!("column {} missing from {}", artifacts::UNIT_TYPE_COLUMN, table.display()),
            )
        })?;

    let mut unit_types = Vec::new();
    for record in reader.records() {
        let record = record.map_err(parse_err)?;
        unit_types.push(record.get(column).unwrap_or_default().trim().to_string());
    }

    let summary = probe.output_dir().join(artifacts::UNIT_TYPE_SUMMARY);
    let json = serde_json::to_string(&unit_types)
        .map_err(|e| StageFailure::new(stage, FailureKind::Parse, e.to_string()))?;
    fs::write(&summary, json).map_err(|e| StageFailure::io(stage, e))?;
    Ok(())
}

/// Sorting failures go to the error log verbatim; any other stage goes to the
/// stage error log, prefixed with the stage name.
fn write_error_log(probe: &Probe, failure: &StageFailure) {
    let (path, content) = if failure.stage == Stage::Sorting {
        (probe.error_log(), failure.message.clone())
    } else {
        (probe.stage_error_log(), failure.to_string())
    };
    match fs::write(&path, content) {
        Ok(()) => log::info!("Wrote {}", path.display()),
        Err(e) => log::error!("Could not write {}: {}", path.display(), e),
    }
}

/// Logs left by an earlier attempt no longer describe the probe once it is retried.
fn clear_error_logs(probe: &Probe) {
    for path in [probe.error_log(), probe.stage_error_log()] {
        match fs::remove_file(&path) {
            Ok(()) => log::debug!("Removed stale {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Could not remove {}: {}", path.display(), e),
        }
    }
}
