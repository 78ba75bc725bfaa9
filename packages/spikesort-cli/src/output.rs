use spikesort_rs::{ProbeOutcome, RunSummary, SessionOutcome};
use std::io::Write;
use std::path::Path;

/// Serialize `value` and write it to `output_path`, or stdout when `None`.
pub fn emit_json<T: serde::Serialize>(
    value: &T,
    compact: bool,
    output_path: Option<&str>,
) -> Result<(), String> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .map_err(|e| format!("JSON serialization failed: {}", e))?;

    match output_path {
        Some(path) => std::fs::write(Path::new(path), json)
            .map_err(|e| format!("Failed to write output file '{}': {}", path, e)),
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", json).map_err(|e| format!("Failed to write to stdout: {}", e))
        }
    }
}

/// Human-readable run summary: one block per session, one line per probe.
pub fn print_run_summary(summary: &RunSummary) {
    if summary.sessions.is_empty() {
        println!("No triggered sessions found");
        return;
    }

    for session in &summary.sessions {
        println!("{}", session.path.display());
        match &session.outcome {
            SessionOutcome::Processed { probes } => {
                for probe in probes {
                    let status = match &probe.outcome {
                        ProbeOutcome::AlreadyProcessed => "already processed".to_string(),
                        ProbeOutcome::Completed { warnings } if warnings.is_empty() => {
                            "completed".to_string()
                        }
                        ProbeOutcome::Completed { warnings } => {
                            format!("completed with warnings: {}", warnings.join("; "))
                        }
                        ProbeOutcome::SortFailed { reason } => format!("sorting failed: {}", reason),
                        ProbeOutcome::Failed { stage, reason } => {
                            format!("{} failed: {}", stage, reason)
                        }
                    };
                    println!("  {:<8} {}", probe.label.as_str(), status);
                }
            }
            SessionOutcome::Deferred { reason } => println!("  deferred: {}", reason),
            SessionOutcome::Refused { reason } => println!("  refused: {}", reason),
            SessionOutcome::Failed { reason } => println!("  failed: {}", reason),
        }
        if session.marker_removed {
            println!("  trigger marker removed");
        }
    }

    let failed: usize = summary.sessions.iter().map(|s| s.failed_probes()).sum();
    let succeeded: usize = summary.sessions.iter().map(|s| s.succeeded_probes()).sum();
    println!(
        "{} session(s), {} probe(s) succeeded, {} failed",
        summary.sessions.len(),
        succeeded,
        failed
    );
}
