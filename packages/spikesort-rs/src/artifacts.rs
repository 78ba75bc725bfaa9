//! Stable artifact names shared with every delegate.
//!
//! Resumption relies on these names: a stage is skipped when its artifact is
//! already on disk, so renaming any of them forces work to be redone.

use glob::Pattern;
use std::io;
use std::path::{Path, PathBuf};

pub const ERROR_LOG: &str = "error_log.txt";
pub const STAGE_ERROR_LOG: &str = "stage_error_log.txt";

pub const SYNC_PULSES: &str = "_spikeglx_sync.times.npy";
pub const PULSE_EVENTS: &str = "_spikeglx_sync.events.npy";
pub const QC_POWER_SPECTRUM: &str = "_iblqc_ephysSpectralDensityAP.power.npy";

pub const SORTER_OUTPUT_DIR: &str = "sorter_output";
pub const SORTER_PARAMS_FILE: &str = "sorter_params.json";
pub const SORTER_SCRATCH: &str = "recording.dat";

pub const CLASSIFICATION_DIR: &str = "bombcell_qc";
pub const UNIT_TYPE_TABLE: &str = "cluster_bc_unitType.tsv";
pub const UNIT_TYPE_COLUMN: &str = "bc_unitType";
pub const UNIT_TYPE_SUMMARY: &str = "clusters.bcUnitType.json";

pub const EXPORTED_SPIKES: &str = "spikes.samples.npy";
pub const SYNCED_SPIKES: &str = "spikes.times.npy";

pub const AUX_STREAM_PATTERN: &str = "*.nidq.*bin";
pub const AP_UNCOMPRESSED_PATTERN: &str = "*.ap.bin";
pub const AP_COMPRESSED_PATTERN: &str = "*.ap.cbin";
pub const AP_META_PATTERN: &str = "*.ap.meta";

/// Sidecar descriptor next to a raw stream: `x.nidq.bin` -> `x.nidq.wiring.json`.
pub fn sidecar_path(stream: &Path) -> PathBuf {
    stream.with_extension("wiring.json")
}

/// Files directly inside `dir` whose name matches `pattern`, sorted.
///
/// A missing directory yields an empty list.
pub fn matching_files(dir: &Path, pattern: &str) -> io::Result<Vec<PathBuf>> {
    let pattern = Pattern::new(pattern)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if pattern.matches(&entry.file_name().to_string_lossy()) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

pub fn uncompressed_ap_files(probe_dir: &Path) -> io::Result<Vec<PathBuf>> {
    matching_files(probe_dir, AP_UNCOMPRESSED_PATTERN)
}

pub fn compressed_ap_files(probe_dir: &Path) -> io::Result<Vec<PathBuf>> {
    matching_files(probe_dir, AP_COMPRESSED_PATTERN)
}

pub fn ap_meta_files(probe_dir: &Path) -> io::Result<Vec<PathBuf>> {
    matching_files(probe_dir, AP_META_PATTERN)
}

/// The probe's action-potential stream, preferring the compressed container.
pub fn ap_stream(probe_dir: &Path) -> io::Result<Option<PathBuf>> {
    if let Some(cbin) = compressed_ap_files(probe_dir)?.into_iter().next() {
        return Ok(Some(cbin));
    }
    Ok(uncompressed_ap_files(probe_dir)?.into_iter().next())
}
