use super::{StageAdapter, StageContext};
use crate::error::{FailureKind, StageFailure};
use crate::types::{Artifacts, Stage};
use async_trait::async_trait;
use std::time::Instant;
use tokio::process::Command;

/// Runs an external program for a stage.
///
/// The argv template may contain `{placeholder}`s which are filled from the
/// [`StageContext`] right before the process is spawned.
#[derive(Debug, Clone)]
pub struct CommandAdapter {
    argv: Vec<String>,
}

impl CommandAdapter {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    /// Default `spikesort-<stage>` command, or `None` for stages handled in-process.
    pub fn default_for(stage: Stage) -> Option<Self> {
        let args: &[&str] = match stage {
            Stage::RegisterRawSync => &["--session", "{session}", "--sync-collection", "raw_ephys_data"],
            Stage::SyncPulses | Stage::PulseEvents | Stage::Compression => {
                &["--session", "{session}", "--probe", "{probe}"]
            }
            Stage::RawQc => &["--session", "{session}", "--probe-dir", "{probe_dir}"],
            Stage::Sorting => &[
                "--sorter", "{sorter}",
                "--recording", "{recording}",
                "--stream-id", "{stream_id}",
                "--preprocessing", "{preprocessing}",
                "--params", "{sorter_params}",
                "--output", "{sorter_dir}",
            ],
            Stage::Classification => &[
                "{sorter_output}",
                "{ap_file}",
                "{meta_file}",
                "{classification_dir}",
                "{probe_dir}",
                "--bombcell", "{bombcell_path}",
                "--npy-matlab", "{matlab_npy_path}",
            ],
            Stage::Export => &["{sorter_output}", "{probe_dir}", "{output_dir}"],
            Stage::ClockSync => &["{ap_stream}", "{output_dir}"],
            Stage::Conditioning
            | Stage::UnitTypeCopy
            | Stage::ScratchCleanup
            | Stage::RawCleanup => return None,
        };

        let mut argv = vec![format!("spikesort-{}", stage.as_str().replace('_', "-"))];
        argv.extend(args.iter().map(|a| a.to_string()));
        Some(Self::new(argv))
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Fill every `{placeholder}` in the template.
    pub fn render(&self, ctx: &StageContext) -> Result<Vec<String>, StageFailure> {
        self.argv
            .iter()
            .map(|arg| render_arg(arg, ctx))
            .collect::<Result<Vec<_>, String>>()
            .map_err(|msg| StageFailure::missing_input(ctx.stage, msg))
    }
}

fn render_arg(arg: &str, ctx: &StageContext) -> Result<String, String> {
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg;
    while let Some(open) = rest.find('{') {
        let Some(len) = rest[open..].find('}') else {
            break;
        };
        out.push_str(&rest[..open]);
        out.push_str(&ctx.placeholder(&rest[open + 1..open + len])?);
        rest = &rest[open + len + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[async_trait]
impl StageAdapter for CommandAdapter {
    async fn run(&self, ctx: &StageContext) -> Result<Artifacts, StageFailure> {
        let argv = self.render(ctx)?;
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| StageFailure::missing_input(ctx.stage, "empty command"))?;

        let mut command = Command::new(program);
        command.args(args).current_dir(&ctx.session);

        log::debug!("Executing {} command: {:?}", ctx.stage, command);

        let start_time = Instant::now();
        let output = command.output().await.map_err(|e| {
            StageFailure::new(
                ctx.stage,
                FailureKind::Spawn,
                format!("Failed to execute {}: {}", program, e),
            )
        })?;

        log::debug!(
            "{} finished in {:.2}s",
            ctx.stage,
            start_time.elapsed().as_secs_f64()
        );

        if !output.status.success() {
            let stdout_str = String::from_utf8_lossy(&output.stdout);
            let stderr_str = String::from_utf8_lossy(&output.stderr);

            log::debug!("{} stdout: {}", ctx.stage, stdout_str);
            log::error!("{} stderr: {}", ctx.stage, stderr_str);

            return Err(StageFailure::new(
                ctx.stage,
                FailureKind::ExitStatus,
                format!("{} exited with {}: {}", program, output.status, stderr_str.trim()),
            ));
        }

        Ok(Artifacts::none())
    }
}
