use super::{StageAdapter, StageContext};
use crate::error::StageFailure;
use crate::types::{Artifacts, ConditionedSignal, ConditioningStep};
use async_trait::async_trait;

/// Builds the conditioned-signal handle for a probe.
///
/// High-pass filter, phase correction, bad-channel interpolation and spatial
/// high-pass are evaluated lazily by the sorting delegate while it streams
/// the recording, so this stage only resolves the input stream and the chain.
pub struct SignalConditioner;

#[async_trait]
impl StageAdapter for SignalConditioner {
    async fn run(&self, ctx: &StageContext) -> Result<Artifacts, StageFailure> {
        let probe = ctx.probe.as_ref().ok_or_else(|| {
            StageFailure::missing_input(ctx.stage, "signal conditioning needs a probe")
        })?;
        let recording = ctx.ap_stream.clone().ok_or_else(|| {
            StageFailure::missing_input(
                ctx.stage,
                format!("no action-potential stream found for {}", probe),
            )
        })?;

        Ok(Artifacts::conditioned(ConditionedSignal {
            recording,
            stream_id: probe.stream_id(),
            steps: ConditioningStep::STANDARD.to_vec(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_settings;
    use crate::types::{Probe, ProbeLabel, Session, Stage};
    use std::fs;

    #[tokio::test]
    async fn test_conditions_existing_stream() {
        let tmp = tempfile::tempdir().unwrap();
        let session = Session::new(tmp.path());
        let probe = Probe::new(&session, ProbeLabel::from_index(1));
        fs::create_dir_all(probe.raw_dir()).unwrap();
        fs::write(probe.raw_dir().join("r_g0_t0.imec1.ap.cbin"), "").unwrap();

        let ctx = StageContext::for_probe(Stage::Conditioning, &probe, &test_settings());
        let artifacts = SignalConditioner.run(&ctx).await.unwrap();
        let signal = artifacts.conditioned.unwrap();
        assert_eq!(signal.stream_id, "imec1.ap");
        assert!(signal.recording.ends_with("r_g0_t0.imec1.ap.cbin"));
        assert_eq!(signal.steps.len(), 4);
        assert!(artifacts.produced.is_empty());
    }

    #[tokio::test]
    async fn test_missing_stream_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let session = Session::new(tmp.path());
        let probe = Probe::new(&session, ProbeLabel::from_index(0));
        fs::create_dir_all(probe.raw_dir()).unwrap();

        let ctx = StageContext::for_probe(Stage::Conditioning, &probe, &test_settings());
        let err = SignalConditioner.run(&ctx).await.unwrap_err();
        assert!(err.message.contains("probe00"));
    }
}
