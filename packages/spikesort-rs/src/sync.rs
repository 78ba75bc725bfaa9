use crate::adapters::{Delegates, StageContext};
use crate::artifacts;
use crate::config::Settings;
use crate::error::SyncError;
use crate::runlog::RunLog;
use crate::types::{Session, Stage, StageResult};
use crate::wiring::SyncDescriptor;
use std::path::{Path, PathBuf};

/// Writes sync sidecars and registers the session-level sync stream.
pub struct SyncProvisioner<'a> {
    settings: &'a Settings,
}

impl<'a> SyncProvisioner<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Write the auxiliary descriptor next to the NI stream and the probe-family
    /// descriptor next to every compressed probe stream.
    pub fn write_descriptors(&self, session: &Session) -> Result<Vec<PathBuf>, SyncError> {
        let raw_dir = session.raw_dir();
        let aux_stream = artifacts::matching_files(&raw_dir, artifacts::AUX_STREAM_PATTERN)
            .ok()
            .and_then(|files| files.into_iter().next())
            .ok_or_else(|| SyncError::MissingAuxStream(raw_dir.clone()))?;

        let mut written = vec![write_sidecar(&aux_stream, &self.settings.aux_wiring)?];

        let pattern = format!(
            "{}/**/{}",
            glob::Pattern::escape(&raw_dir.to_string_lossy()),
            artifacts::AP_COMPRESSED_PATTERN
        );
        for entry in glob::glob(&pattern)? {
            match entry {
                Ok(ap_file) => written.push(write_sidecar(&ap_file, &self.settings.probe_wiring)?),
                Err(e) => log::warn!("Skipping unreadable path: {}", e),
            }
        }

        Ok(written)
    }

    /// Sidecars first, then the session-level sync registration.
    ///
    /// Must complete before any probe-level work; a failure here is fatal to the session.
    pub async fn provision(
        &self,
        session: &Session,
        delegates: &Delegates,
        run_log: &mut RunLog,
    ) -> Result<(), SyncError> {
        let written = self.write_descriptors(session)?;
        log::info!("Wrote {} sync descriptor(s)", written.len());

        let ctx = StageContext::for_session(Stage::RegisterRawSync, session, self.settings);
        match delegates.run(&ctx).await {
            Ok(_) => {
                run_log.record(session.path(), None, Stage::RegisterRawSync, StageResult::Succeeded);
                Ok(())
            }
            Err(failure) => {
                run_log.record(
                    session.path(),
                    None,
                    Stage::RegisterRawSync,
                    StageResult::Failed(failure.message.clone()),
                );
                Err(SyncError::Registration(failure))
            }
        }
    }
}

fn write_sidecar(stream: &Path, descriptor: &SyncDescriptor) -> Result<PathBuf, SyncError> {
    let path = artifacts::sidecar_path(stream);
    let json = descriptor.to_json().map_err(|e| SyncError::DescriptorWrite {
        path: path.clone(),
        source: e.into(),
    })?;
    std::fs::write(&path, json).map_err(|source| SyncError::DescriptorWrite {
        path: path.clone(),
        source,
    })?;
    log::debug!("Wrote sync descriptor {}", path.display());
    Ok(path)
}
