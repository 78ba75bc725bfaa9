use crate::adapters::Delegates;
use crate::completion;
use crate::config::Settings;
use crate::discovery::SessionDiscoverer;
use crate::error::{Result, SpikesortError};
use crate::layout::{self, LayoutOutcome};
use crate::pipeline::StagePipeline;
use crate::runlog::RunLog;
use crate::sync::SyncProvisioner;
use crate::types::{RunSummary, Session, SessionOutcome, SessionReport};
use std::sync::Arc;

/// One invocation: discover → normalize → provision sync → run probes → close session.
///
/// Sessions are handled one at a time and independently; nothing that goes
/// wrong inside a session stops the discovery loop.
pub struct Orchestrator {
    settings: Arc<Settings>,
    delegates: Delegates,
}

impl Orchestrator {
    pub fn new(settings: Arc<Settings>, delegates: Delegates) -> Self {
        Self {
            settings,
            delegates,
        }
    }

    /// Orchestrator wired to the command delegates described by `settings`.
    pub fn from_settings(settings: Arc<Settings>) -> Self {
        let delegates = Delegates::from_settings(&settings);
        Self::new(settings, delegates)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn discoverer(&self) -> SessionDiscoverer {
        SessionDiscoverer::new(&self.settings.data_folder)
    }

    pub async fn run(&self, run_log: &mut RunLog) -> Result<RunSummary> {
        let root = &self.settings.data_folder;
        if !root.is_dir() {
            return Err(SpikesortError::DataFolderNotFound(root.clone()));
        }

        log::info!("Looking for trigger markers in {}", root.display());
        let mut sessions = Vec::new();
        for session in self.discoverer().sessions() {
            sessions.push(self.process_session(&session, run_log).await);
        }

        if sessions.is_empty() {
            log::info!("No sessions waiting for processing");
        }

        Ok(RunSummary {
            run_id: run_log.run_id().to_string(),
            sessions,
        })
    }

    pub async fn process_session(&self, session: &Session, run_log: &mut RunLog) -> SessionReport {
        log::info!("Found trigger marker in {}", session.path().display());
        log::info!("Starting pipeline");

        let outcome = self.run_session(session, run_log).await;

        let marker_removed = match &outcome {
            SessionOutcome::Processed { .. } => match completion::remove_marker(session) {
                Ok(removed) => removed,
                Err(e) => {
                    log::error!(
                        "Could not remove trigger marker from {}: {}",
                        session.path().display(),
                        e
                    );
                    false
                }
            },
            _ => false,
        };

        SessionReport {
            path: session.path().to_path_buf(),
            outcome,
            marker_removed,
        }
    }

    async fn run_session(&self, session: &Session, run_log: &mut RunLog) -> SessionOutcome {
        match layout::normalize(session) {
            Ok(LayoutOutcome::AlreadyCanonical) => {}
            Ok(LayoutOutcome::Flattened { run_folder, probes }) => {
                log::info!("Restructured {} into {} probe folder(s)", run_folder, probes.len());
            }
            Err(e) if e.is_deferral() => {
                log::warn!("{}; leaving the session for a later run", e);
                return SessionOutcome::Deferred {
                    reason: e.to_string(),
                };
            }
            Err(e) => {
                log::warn!("{}; leaving the session untouched", e);
                return SessionOutcome::Refused {
                    reason: e.to_string(),
                };
            }
        }

        if let Err(e) = SyncProvisioner::new(&self.settings)
            .provision(session, &self.delegates, run_log)
            .await
        {
            log::error!("Sync provisioning failed for {}: {}", session.path().display(), e);
            return SessionOutcome::Failed {
                reason: e.to_string(),
            };
        }

        match StagePipeline::new(&self.settings, &self.delegates)
            .run_session(session, run_log)
            .await
        {
            Ok(probes) => SessionOutcome::Processed { probes },
            Err(e) => {
                log::error!("Could not list probes of {}: {}", session.path().display(), e);
                SessionOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
