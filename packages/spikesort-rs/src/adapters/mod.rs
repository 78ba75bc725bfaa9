// Stage adapters
//
// Every delegate stage is reached through the `StageAdapter` trait. The
// orchestrator only knows the trait and the artifact names each stage leaves
// behind; whether an adapter shells out, links a library or does the work
// natively is its own business. New delegates are added by:
// 1. Implementing StageAdapter
// 2. Registering it in `Delegates` for the stage it serves

mod command;
mod conditioning;

pub use command::CommandAdapter;
pub use conditioning::SignalConditioner;

use crate::artifacts;
use crate::config::{ClassifierPaths, Settings};
use crate::error::StageFailure;
use crate::types::{Artifacts, ConditionedSignal, Probe, ProbeLabel, Session, Stage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

/// One delegate capability: given input paths and a destination, produce artifacts or fail.
#[async_trait]
pub trait StageAdapter: Send + Sync {
    async fn run(&self, ctx: &StageContext) -> Result<Artifacts, StageFailure>;
}

/// Everything a stage may need, resolved up front by the pipeline.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub stage: Stage,
    pub session: PathBuf,
    pub raw_dir: PathBuf,
    pub sorter: String,
    pub probe: Option<ProbeLabel>,
    pub probe_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub sorter_dir: Option<PathBuf>,
    pub sorter_output: Option<PathBuf>,
    pub sorter_params: Option<PathBuf>,
    pub classification_dir: Option<PathBuf>,
    /// First uncompressed `*.ap.bin`
    pub ap_file: Option<PathBuf>,
    /// Compressed stream if present, otherwise the uncompressed one
    pub ap_stream: Option<PathBuf>,
    pub meta_file: Option<PathBuf>,
    pub conditioned: Option<ConditionedSignal>,
    pub classifier: Option<ClassifierPaths>,
}

impl StageContext {
    pub fn for_session(stage: Stage, session: &Session, settings: &Settings) -> Self {
        Self {
            stage,
            session: session.path().to_path_buf(),
            raw_dir: session.raw_dir(),
            sorter: settings.spike_sorter.clone(),
            probe: None,
            probe_dir: None,
            output_dir: None,
            sorter_dir: None,
            sorter_output: None,
            sorter_params: None,
            classification_dir: None,
            ap_file: None,
            ap_stream: None,
            meta_file: None,
            conditioned: None,
            classifier: settings.classifier.clone(),
        }
    }

    /// Probe-level context; raw stream paths are looked up on disk at call time.
    pub fn for_probe(stage: Stage, probe: &Probe, settings: &Settings) -> Self {
        Self::for_probe_in(stage, probe, settings, &settings.sorter_folder())
    }

    /// Same as [`for_probe`](Self::for_probe) with an already resolved sorter folder name.
    pub fn for_probe_in(stage: Stage, probe: &Probe, settings: &Settings, folder: &str) -> Self {
        let raw = probe.raw_dir();
        let sorter_dir = probe.sorter_dir(folder);

        Self {
            stage,
            session: probe.session_path().to_path_buf(),
            raw_dir: raw.parent().map(PathBuf::from).unwrap_or_default(),
            sorter: settings.spike_sorter.clone(),
            probe: Some(probe.label.clone()),
            probe_dir: Some(raw.to_path_buf()),
            output_dir: Some(probe.output_dir()),
            sorter_params: Some(sorter_dir.join(artifacts::SORTER_PARAMS_FILE)),
            sorter_output: Some(probe.sorter_output(folder)),
            classification_dir: Some(probe.classification_dir(folder)),
            sorter_dir: Some(sorter_dir),
            ap_file: first(artifacts::uncompressed_ap_files(raw)),
            ap_stream: artifacts::ap_stream(raw).ok().flatten(),
            meta_file: first(artifacts::ap_meta_files(raw)),
            conditioned: None,
            classifier: settings.classifier.clone(),
        }
    }

    pub fn with_conditioned(mut self, signal: ConditionedSignal) -> Self {
        self.conditioned = Some(signal);
        self
    }

    /// Value of a `{placeholder}` in a command template.
    pub fn placeholder(&self, name: &str) -> Result<String, String> {
        let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string());
        let value = match name {
            "session" => Some(self.session.display().to_string()),
            "raw_dir" => Some(self.raw_dir.display().to_string()),
            "sorter" => Some(self.sorter.clone()),
            "probe" => self.probe.as_ref().map(|l| l.to_string()),
            "probe_dir" => path(&self.probe_dir),
            "output_dir" => path(&self.output_dir),
            "sorter_dir" => path(&self.sorter_dir),
            "sorter_output" => path(&self.sorter_output),
            "sorter_params" => path(&self.sorter_params),
            "classification_dir" => path(&self.classification_dir),
            "ap_file" => path(&self.ap_file),
            "ap_stream" => path(&self.ap_stream),
            "meta_file" => path(&self.meta_file),
            "recording" => self
                .conditioned
                .as_ref()
                .map(|c| c.recording.display().to_string()),
            "stream_id" => self.conditioned.as_ref().map(|c| c.stream_id.clone()),
            "preprocessing" => self.conditioned.as_ref().map(|c| c.preprocessing_arg()),
            "bombcell_path" => self
                .classifier
                .as_ref()
                .map(|c| c.bombcell_path.display().to_string()),
            "matlab_npy_path" => self
                .classifier
                .as_ref()
                .map(|c| c.matlab_npy_path.display().to_string()),
            _ => return Err(format!("unknown placeholder {{{}}}", name)),
        };
        value.ok_or_else(|| format!("placeholder {{{}}} has no value for {}", name, self.stage))
    }
}

fn first(files: std::io::Result<Vec<PathBuf>>) -> Option<PathBuf> {
    files.ok().and_then(|f| f.into_iter().next())
}

/// Adapter registered for each stage.
pub struct Delegates {
    adapters: HashMap<Stage, Box<dyn StageAdapter>>,
}

impl Delegates {
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Command adapters for every delegate stage, honouring `STAGE_COMMANDS`,
    /// plus the built-in signal conditioner.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut delegates = Self::empty();
        for stage in Stage::ALL {
            let adapter = match settings.stage_commands.get(&stage) {
                Some(argv) => Some(CommandAdapter::new(argv.clone())),
                None => CommandAdapter::default_for(stage),
            };
            if let Some(adapter) = adapter {
                delegates = delegates.with(stage, adapter);
            }
        }
        delegates.with(Stage::Conditioning, SignalConditioner)
    }

    pub fn with<A: StageAdapter + 'static>(mut self, stage: Stage, adapter: A) -> Self {
        self.adapters.insert(stage, Box::new(adapter));
        self
    }

    pub fn has(&self, stage: Stage) -> bool {
        self.adapters.contains_key(&stage)
    }

    pub async fn run(&self, ctx: &StageContext) -> Result<Artifacts, StageFailure> {
        match self.adapters.get(&ctx.stage) {
            Some(adapter) => adapter.run(ctx).await,
            None => Err(StageFailure::missing_input(
                ctx.stage,
                format!("no adapter registered for {}", ctx.stage),
            )),
        }
    }
}
