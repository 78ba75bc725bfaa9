use super::load_settings;
use crate::cli::RunArgs;
use crate::exit_codes;
use crate::output;
use spikesort_rs::{Orchestrator, RunLog, RunStatus, SpikesortError};
use std::path::Path;
use std::sync::Arc;

pub async fn execute(config_dir: &Path, args: RunArgs) -> i32 {
    let settings = match load_settings(config_dir) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let mut run_log = match &settings.run_log {
        Some(path) => match RunLog::with_file(path) {
            Ok(log) => log,
            Err(e) => {
                eprintln!("Error: cannot open run log {}: {}", path.display(), e);
                return exit_codes::EXECUTION_ERROR;
            }
        },
        None => RunLog::new(),
    };
    log::info!("Run {} started", run_log.run_id());

    let orchestrator = Orchestrator::from_settings(Arc::new(settings));
    let summary = match orchestrator.run(&mut run_log).await {
        Ok(summary) => summary,
        Err(SpikesortError::DataFolderNotFound(path)) => {
            eprintln!("Error: data folder not found: {}", path.display());
            return exit_codes::DATA_FOLDER_NOT_FOUND;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    };

    if args.json || args.output.is_some() {
        if let Err(e) = output::emit_json(&summary, args.compact, args.output.as_deref()) {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    } else {
        output::print_run_summary(&summary);
    }

    match summary.status() {
        RunStatus::Clean => exit_codes::SUCCESS,
        RunStatus::Partial => exit_codes::PARTIAL_FAILURE,
        RunStatus::Failed => exit_codes::EXECUTION_ERROR,
    }
}
