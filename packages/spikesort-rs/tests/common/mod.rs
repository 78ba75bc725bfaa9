#![allow(dead_code)]

use async_trait::async_trait;
use spikesort_rs::artifacts;
use spikesort_rs::config::ClassifierPaths;
use spikesort_rs::{
    Artifacts, Delegates, FailureKind, ProbeLabel, Settings, SignalConditioner, SorterParams,
    Stage, StageAdapter, StageContext, StageFailure, SyncDescriptor, RAW_DATA_DIR,
    TRIGGER_MARKER,
};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// One delegate invocation seen by the fake lab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub stage: Stage,
    pub session: PathBuf,
    pub probe: Option<ProbeLabel>,
}

/// Stand-in for every external delegate.
///
/// Records each call and writes the artifacts the real tool would leave
/// behind, unless the (stage, probe) pair was told to fail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FailureRule {
    stage: Stage,
    probe: Option<String>,
    session: Option<String>,
}

impl FailureRule {
    fn matches(&self, ctx: &StageContext) -> bool {
        let probe_ok = match &self.probe {
            Some(p) => ctx.probe.as_ref().map(|l| l.as_str()) == Some(p.as_str()),
            None => true,
        };
        let session_ok = match &self.session {
            Some(name) => ctx.session.file_name().map(|n| n.to_string_lossy() == name.as_str()) == Some(true),
            None => true,
        };
        self.stage == ctx.stage && probe_ok && session_ok
    }
}

#[derive(Clone, Default)]
pub struct FakeLab {
    calls: Arc<Mutex<Vec<Call>>>,
    failures: Arc<Mutex<HashSet<FailureRule>>>,
}

impl FakeLab {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `stage` fail for `probe` in every session.
    pub fn fail(self, stage: Stage, probe: &str) -> Self {
        self.add_rule(stage, Some(probe), None)
    }

    /// Make `stage` fail for every probe of the session directory named `session`.
    pub fn fail_in(self, stage: Stage, session: &str) -> Self {
        self.add_rule(stage, None, Some(session))
    }

    /// Make `stage` fail only for `probe` of `session`.
    pub fn fail_probe_in(self, stage: Stage, session: &str, probe: &str) -> Self {
        self.add_rule(stage, Some(probe), Some(session))
    }

    fn add_rule(self, stage: Stage, probe: Option<&str>, session: Option<&str>) -> Self {
        self.failures.lock().unwrap().insert(FailureRule {
            stage,
            probe: probe.map(str::to_string),
            session: session.map(str::to_string),
        });
        self
    }

    pub fn delegates(&self) -> Delegates {
        let mut delegates = Delegates::empty().with(Stage::Conditioning, SignalConditioner);
        for stage in [
            Stage::RegisterRawSync,
            Stage::SyncPulses,
            Stage::PulseEvents,
            Stage::RawQc,
            Stage::Sorting,
            Stage::Classification,
            Stage::Export,
            Stage::ClockSync,
            Stage::Compression,
        ] {
            delegates = delegates.with(stage, self.clone());
        }
        delegates
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, stage: Stage) -> usize {
        self.calls().iter().filter(|c| c.stage == stage).count()
    }

    pub fn count_for(&self, stage: Stage, probe: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.stage == stage && c.probe.as_ref().map(|p| p.as_str()) == Some(probe))
            .count()
    }

    /// Calls made on behalf of the session directory named `session`.
    pub fn calls_in(&self, session: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.session.file_name().map(|n| n.to_string_lossy() == session) == Some(true))
            .collect()
    }

    fn should_fail(&self, ctx: &StageContext) -> bool {
        self.failures.lock().unwrap().iter().any(|rule| rule.matches(ctx))
    }
}

fn touch(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, b"")
}

fn need<'a>(
    stage: Stage,
    value: &'a Option<PathBuf>,
    what: &str,
) -> Result<&'a PathBuf, StageFailure> {
    value
        .as_ref()
        .ok_or_else(|| StageFailure::missing_input(stage, format!("no {}", what)))
}

fn probe_dir(ctx: &StageContext) -> Result<&PathBuf, StageFailure> {
    need(ctx.stage, &ctx.probe_dir, "probe dir")
}

#[async_trait]
impl StageAdapter for FakeLab {
    async fn run(&self, ctx: &StageContext) -> Result<Artifacts, StageFailure> {
        self.calls.lock().unwrap().push(Call {
            stage: ctx.stage,
            session: ctx.session.clone(),
            probe: ctx.probe.clone(),
        });

        if self.should_fail(ctx) {
            return Err(StageFailure::new(
                ctx.stage,
                FailureKind::ExitStatus,
                format!("simulated {} failure", ctx.stage),
            ));
        }

        let io = |e: std::io::Error| StageFailure::io(ctx.stage, e);
        let produced = match ctx.stage {
            Stage::SyncPulses => vec![probe_dir(ctx)?.join(artifacts::SYNC_PULSES)],
            Stage::PulseEvents => vec![probe_dir(ctx)?.join(artifacts::PULSE_EVENTS)],
            Stage::RawQc => vec![probe_dir(ctx)?.join(artifacts::QC_POWER_SPECTRUM)],
            Stage::Sorting => {
                if ctx.conditioned.is_none() {
                    return Err(StageFailure::missing_input(ctx.stage, "no conditioned signal"));
                }
                let out = need(ctx.stage, &ctx.sorter_output, "sorter output")?;
                vec![out.join("spike_times.npy"), out.join(artifacts::SORTER_SCRATCH)]
            }
            Stage::Classification => {
                let out = need(ctx.stage, &ctx.sorter_output, "sorter output")?;
                need(ctx.stage, &ctx.ap_file, "uncompressed ap file")?;
                need(ctx.stage, &ctx.meta_file, "meta file")?;
                fs::write(
                    out.join(artifacts::UNIT_TYPE_TABLE),
                    "cluster_id\tbc_unitType\n0\tGOOD\n1\tMUA\n",
                )
                .map_err(io)?;
                vec![]
            }
            Stage::Export => vec![need(ctx.stage, &ctx.output_dir, "output dir")?.join(artifacts::EXPORTED_SPIKES)],
            Stage::ClockSync => {
                need(ctx.stage, &ctx.ap_stream, "ap stream")?;
                vec![need(ctx.stage, &ctx.output_dir, "output dir")?.join(artifacts::SYNCED_SPIKES)]
            }
            Stage::Compression => {
                let ap = need(ctx.stage, &ctx.ap_file, "uncompressed ap file")?;
                vec![ap.with_extension("cbin")]
            }
            _ => vec![],
        };

        for path in &produced {
            touch(path).map_err(io)?;
        }
        Ok(Artifacts::with_files(produced))
    }
}

pub fn settings(data_folder: &Path, run_bombcell: bool) -> Settings {
    let mut aux_wiring = SyncDescriptor {
        system: "3B".to_string(),
        ..Default::default()
    };
    aux_wiring
        .digital
        .insert("P0.0".to_string(), "imec_sync".to_string());
    let mut probe_wiring = SyncDescriptor {
        system: "3B".to_string(),
        ..Default::default()
    };
    probe_wiring
        .digital
        .insert("P0.6".to_string(), "imec_sync".to_string());

    Settings {
        data_folder: data_folder.to_path_buf(),
        spike_sorter: "kilosort4".to_string(),
        identifier: "_test".to_string(),
        classifier: run_bombcell.then(|| ClassifierPaths {
            bombcell_path: PathBuf::from("/opt/bombcell"),
            matlab_npy_path: PathBuf::from("/opt/npy-matlab"),
        }),
        sorter_params: SorterParams::DelegateDefaults,
        aux_wiring,
        probe_wiring,
        stage_commands: HashMap::new(),
        run_log: None,
    }
}

/// Canonical session with `n_probes` uncompressed probes and a trigger marker.
pub fn canonical_session(root: &Path, name: &str, n_probes: u32) -> PathBuf {
    let session = root.join(name);
    let raw = session.join(RAW_DATA_DIR);
    fs::create_dir_all(&raw).unwrap();
    fs::write(raw.join("run_g0_t0.nidq.bin"), "nidq").unwrap();
    fs::write(raw.join("run_g0_t0.nidq.meta"), "meta").unwrap();
    for i in 0..n_probes {
        let probe = raw.join(format!("probe0{}", i));
        fs::create_dir_all(&probe).unwrap();
        fs::write(probe.join(format!("run_g0_t0.imec{}.ap.bin", i)), "samples").unwrap();
        fs::write(probe.join(format!("run_g0_t0.imec{}.ap.meta", i)), "meta").unwrap();
    }
    fs::write(session.join(TRIGGER_MARKER), "").unwrap();
    session
}

/// Session as written by the acquisition software: one run folder with `imecN` subfolders.
pub fn legacy_session(root: &Path, name: &str, n_probes: u32) -> PathBuf {
    let session = root.join(name);
    let run = session.join(RAW_DATA_DIR).join("run_g0");
    fs::create_dir_all(&run).unwrap();
    fs::write(run.join("run_g0_t0.nidq.bin"), "nidq").unwrap();
    for i in 0..n_probes {
        let probe = run.join(format!("run_g0_imec{}", i));
        fs::create_dir_all(&probe).unwrap();
        fs::write(probe.join(format!("run_g0_t0.imec{}.ap.bin", i)), "samples").unwrap();
        fs::write(probe.join(format!("run_g0_t0.imec{}.ap.meta", i)), "meta").unwrap();
    }
    fs::write(session.join(TRIGGER_MARKER), "").unwrap();
    session
}

/// Relative path and contents of every entry under `dir`.
pub fn snapshot(dir: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            let rel = path.strip_prefix(dir).unwrap().to_path_buf();
            if path.is_dir() {
                out.push((rel, Vec::new()));
                stack.push(path);
            } else {
                out.push((rel, fs::read(&path).unwrap()));
            }
        }
    }
    out.sort();
    out
}
