//! Per-probe state inferred from the artifacts already on disk.
//!
//! There is no separate state file: what a probe has been through is read
//! back from the files each stage leaves behind.

use crate::artifacts;
use crate::types::Probe;
use serde::Serialize;
use std::fmt;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeState {
    Discovered,
    Normalized,
    SyncPulsesReady,
    QcComputed,
    /// Held in memory only; never inferred from disk.
    Conditioned,
    SortFailed,
    Sorted,
    Classified,
    Exported,
    ClockSynced,
    Compressed,
    Cleaned,
}

impl ProbeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProbeState::SortFailed | ProbeState::Cleaned)
    }
}

impl fmt::Display for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProbeState::Discovered => "discovered",
            ProbeState::Normalized => "normalized",
            ProbeState::SyncPulsesReady => "sync_pulses_ready",
            ProbeState::QcComputed => "qc_computed",
            ProbeState::Conditioned => "conditioned",
            ProbeState::SortFailed => "sort_failed",
            ProbeState::Sorted => "sorted",
            ProbeState::Classified => "classified",
            ProbeState::Exported => "exported",
            ProbeState::ClockSynced => "clock_synced",
            ProbeState::Compressed => "compressed",
            ProbeState::Cleaned => "cleaned",
        };
        f.write_str(name)
    }
}

/// Which expected artifacts exist for one probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactInventory {
    pub raw_dir: bool,
    pub sync_pulses: bool,
    pub pulse_events: bool,
    pub qc_spectrum: bool,
    pub error_log: bool,
    pub sorter_output: bool,
    pub classification: bool,
    pub output_dir: bool,
    pub exported: bool,
    pub clock_synced: bool,
    pub scratch: bool,
    pub compressed: usize,
    pub uncompressed: usize,
}

impl ArtifactInventory {
    pub fn scan(probe: &Probe, sorter_folder: &str) -> io::Result<Self> {
        let raw = probe.raw_dir();
        let output = probe.output_dir();
        let sorter_output = probe.sorter_output(sorter_folder);

        Ok(Self {
            raw_dir: raw.is_dir(),
            sync_pulses: raw.join(artifacts::SYNC_PULSES).is_file(),
            pulse_events: raw.join(artifacts::PULSE_EVENTS).is_file(),
            qc_spectrum: raw.join(artifacts::QC_POWER_SPECTRUM).is_file(),
            error_log: probe.error_log().is_file(),
            sorter_output: sorter_output.is_dir(),
            classification: sorter_output.join(artifacts::UNIT_TYPE_TABLE).is_file(),
            output_dir: output.is_dir(),
            exported: output.join(artifacts::EXPORTED_SPIKES).is_file(),
            clock_synced: output.join(artifacts::SYNCED_SPIKES).is_file(),
            scratch: sorter_output.join(artifacts::SORTER_SCRATCH).is_file(),
            compressed: artifacts::compressed_ap_files(raw)?.len(),
            uncompressed: artifacts::uncompressed_ap_files(raw)?.len(),
        })
    }
}

/// Furthest state the artifacts prove a probe has reached.
pub fn infer_state(inv: &ArtifactInventory) -> ProbeState {
    if !inv.raw_dir {
        return ProbeState::Discovered;
    }
    if inv.clock_synced && inv.compressed > 0 {
        if inv.uncompressed == 0 && !inv.scratch {
            return ProbeState::Cleaned;
        }
        return ProbeState::Compressed;
    }
    if inv.clock_synced {
        return ProbeState::ClockSynced;
    }
    if inv.exported {
        return ProbeState::Exported;
    }
    if inv.sorter_output && inv.classification {
        return ProbeState::Classified;
    }
    if inv.sorter_output {
        return ProbeState::Sorted;
    }
    if inv.error_log {
        return ProbeState::SortFailed;
    }
    if inv.qc_spectrum {
        return ProbeState::QcComputed;
    }
    if inv.sync_pulses && inv.pulse_events {
        return ProbeState::SyncPulsesReady;
    }
    ProbeState::Normalized
}
