use crate::error::ConfigError;
use crate::types::Stage;
use crate::wiring::{read_config_file, SyncDescriptor};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.json";
pub const AUX_WIRING_FILE: &str = "nidq.wiring.json";

/// Parameters handed to the sorting delegate.
#[derive(Debug, Clone, PartialEq)]
pub enum SorterParams {
    /// Values from `<SORTER>_params.json`, passed on as-is.
    Overrides(serde_json::Map<String, serde_json::Value>),
    /// No override file: the sorter uses its documented defaults.
    DelegateDefaults,
}

impl SorterParams {
    /// Document written for the delegate. An empty object means "all defaults".
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SorterParams::Overrides(map) => serde_json::Value::Object(map.clone()),
            SorterParams::DelegateDefaults => serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

/// Paths needed by the optional unit classification engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierPaths {
    pub bombcell_path: PathBuf,
    pub matlab_npy_path: PathBuf,
}

/// Immutable process settings, loaded once at start-up.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root scanned for trigger markers
    pub data_folder: PathBuf,
    /// Sorting delegate identifier, e.g. `kilosort4`
    pub spike_sorter: String,
    /// Suffix namespacing per-run sorter folders
    pub identifier: String,
    /// Present only when unit classification is enabled
    pub classifier: Option<ClassifierPaths>,
    pub sorter_params: SorterParams,
    /// Descriptor for the auxiliary (NI) sync device
    pub aux_wiring: SyncDescriptor,
    /// Descriptor for the probe hardware family named by `aux_wiring.system`
    pub probe_wiring: SyncDescriptor,
    /// Argv templates overriding the default delegate commands
    pub stage_commands: HashMap<Stage, Vec<String>>,
    /// JSON-lines file receiving every stage record
    pub run_log: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(rename = "DATA_FOLDER")]
    data_folder: Option<PathBuf>,
    #[serde(rename = "SPIKE_SORTER")]
    spike_sorter: Option<String>,
    #[serde(rename = "IDENTIFIER")]
    identifier: Option<String>,
    #[serde(rename = "RUN_BOMBCELL")]
    run_bombcell: Option<bool>,
    #[serde(rename = "BOMBCELL_PATH")]
    bombcell_path: Option<PathBuf>,
    #[serde(rename = "MATLAB_NPY_PATH")]
    matlab_npy_path: Option<PathBuf>,
    #[serde(rename = "STAGE_COMMANDS", default)]
    stage_commands: HashMap<String, Vec<String>>,
    #[serde(rename = "RUN_LOG")]
    run_log: Option<PathBuf>,
}

/// Stages the orchestrator performs itself; these cannot be redirected to a command.
const NATIVE_STAGES: [Stage; 4] = [
    Stage::Conditioning,
    Stage::UnitTypeCopy,
    Stage::ScratchCleanup,
    Stage::RawCleanup,
];

impl Settings {
    /// Load settings, wiring descriptors and sorter parameters from `config_dir`.
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let settings_path = config_dir.join(SETTINGS_FILE);
        let raw: RawSettings = parse_json(&settings_path)?;

        let data_folder = require(raw.data_folder, "DATA_FOLDER")?;
        let spike_sorter = require(raw.spike_sorter, "SPIKE_SORTER")?;
        let identifier = require(raw.identifier, "IDENTIFIER")?;
        let run_bombcell = require(raw.run_bombcell, "RUN_BOMBCELL")?;

        if spike_sorter.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "SPIKE_SORTER".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        let classifier = if run_bombcell {
            Some(ClassifierPaths {
                bombcell_path: require(raw.bombcell_path, "BOMBCELL_PATH")?,
                matlab_npy_path: require(raw.matlab_npy_path, "MATLAB_NPY_PATH")?,
            })
        } else {
            None
        };

        let stage_commands = parse_stage_commands(raw.stage_commands)?;

        let aux_wiring = SyncDescriptor::load(&config_dir.join(AUX_WIRING_FILE))?;
        if aux_wiring.system.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "SYSTEM".to_string(),
                reason: format!("{} must name the probe hardware family", AUX_WIRING_FILE),
            });
        }
        let probe_wiring =
            SyncDescriptor::load(&config_dir.join(format!("{}.wiring.json", aux_wiring.system)))?;

        let params_path = config_dir.join(format!("{}_params.json", spike_sorter));
        let sorter_params = if params_path.is_file() {
            SorterParams::Overrides(parse_json(&params_path)?)
        } else {
            log::info!(
                "No {} found, {} will use its default parameters",
                params_path.display(),
                spike_sorter
            );
            SorterParams::DelegateDefaults
        };

        Ok(Self {
            data_folder,
            spike_sorter,
            identifier,
            classifier,
            sorter_params,
            aux_wiring,
            probe_wiring,
            stage_commands,
            run_log: raw.run_log,
        })
    }

    pub fn run_bombcell(&self) -> bool {
        self.classifier.is_some()
    }

    /// Name of the per-run sorter folder inside each probe directory.
    pub fn sorter_folder(&self) -> String {
        format!("{}{}", self.spike_sorter, self.identifier)
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = read_config_file(path)?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

fn require<T>(value: Option<T>, key: &str) -> Result<T, ConfigError> {
    value.ok_or_else(|| ConfigError::MissingKey(key.to_string()))
}

fn parse_stage_commands(
    raw: HashMap<String, Vec<String>>,
) -> Result<HashMap<Stage, Vec<String>>, ConfigError> {
    let mut commands = HashMap::new();
    for (name, argv) in raw {
        let stage = Stage::from_name(&name).ok_or_else(|| ConfigError::InvalidValue {
            key: "STAGE_COMMANDS".to_string(),
            reason: format!("unknown stage '{}'", name),
        })?;
        if NATIVE_STAGES.contains(&stage) {
            return Err(ConfigError::InvalidValue {
                key: "STAGE_COMMANDS".to_string(),
                reason: format!("stage '{}' is built in and takes no command", name),
            });
        }
        if argv.is_empty() || argv[0].trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "STAGE_COMMANDS".to_string(),
                reason: format!("command for '{}' is empty", name),
            });
        }
        commands.insert(stage, argv);
    }
    Ok(commands)
}
