use crate::adapters::{StageAdapter, StageContext};
use crate::config::{Settings, SorterParams};
use crate::error::{FailureKind, StageFailure};
use crate::types::Artifacts;
use crate::wiring::SyncDescriptor;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) fn test_settings() -> Settings {
    Settings {
        data_folder: PathBuf::from("/data"),
        spike_sorter: "kilosort4".to_string(),
        identifier: "_v1".to_string(),
        classifier: None,
        sorter_params: SorterParams::DelegateDefaults,
        aux_wiring: SyncDescriptor::default(),
        probe_wiring: SyncDescriptor::default(),
        stage_commands: HashMap::new(),
        run_log: None,
    }
}

/// Adapter that counts its calls and either succeeds or fails with a fixed message.
#[derive(Clone)]
pub(crate) struct RecordingAdapter {
    calls: Arc<AtomicUsize>,
    failure: Option<String>,
}

impl RecordingAdapter {
    pub(crate) fn succeeding() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            failure: None,
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            failure: Some(message.to_string()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StageAdapter for RecordingAdapter {
    async fn run(&self, ctx: &StageContext) -> Result<Artifacts, StageFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(StageFailure::new(
                ctx.stage,
                FailureKind::ExitStatus,
                message.clone(),
            )),
            None => Ok(Artifacts::none()),
        }
    }
}
