use crate::error::LayoutError;
use crate::types::{ProbeLabel, Session};
use std::fs;
use std::path::{Path, PathBuf};

/// What normalization did to a session's raw-data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutOutcome {
    /// At least one `probeNN` folder was already present; nothing was touched.
    AlreadyCanonical,
    /// A single run folder was flattened and its probe folders renamed.
    Flattened {
        run_folder: String,
        probes: Vec<ProbeLabel>,
    },
}

/// Canonicalize `raw_ephys_data` into the `probeNN` layout.
///
/// A SpikeGLX run folder (`run_g0/run_g0_imec0`, `run_g0/run_g0_t0.nidq.bin`, ...)
/// is flattened one level and every `*imec<N>` folder becomes `probe0<N>`.
/// Running this on an already canonical session is a no-op.
pub fn normalize(session: &Session) -> Result<LayoutOutcome, LayoutError> {
    let raw_dir = session.raw_dir();
    if !raw_dir.is_dir() {
        return Err(LayoutError::NoData(raw_dir));
    }

    let entries = list_entries(&raw_dir)?;
    if entries
        .iter()
        .any(|p| p.is_dir() && ProbeLabel::from_dir_name(&file_name(p)).is_some())
    {
        log::debug!("{} is already canonical", raw_dir.display());
        return Ok(LayoutOutcome::AlreadyCanonical);
    }

    match entries.len() {
        0 => return Err(LayoutError::NoData(raw_dir)),
        1 => {}
        count => {
            return Err(LayoutError::MultipleRuns {
                path: raw_dir,
                count,
            })
        }
    }

    let run_dir = entries[0].clone();
    if !run_dir.is_dir() {
        return Err(LayoutError::NotADirectory(run_dir));
    }
    let run_folder = file_name(&run_dir);

    // Check every destination before moving anything so a conflict leaves the tree intact.
    let children = list_entries(&run_dir)?;
    for child in &children {
        let target = raw_dir.join(file_name(child));
        if target.exists() {
            return Err(LayoutError::Conflict {
                from: child.clone(),
                to: target,
            });
        }
    }

    for child in &children {
        fs::rename(child, raw_dir.join(file_name(child)))?;
    }
    fs::remove_dir(&run_dir)?;
    log::info!(
        "Flattened run folder {} into {}",
        run_folder,
        raw_dir.display()
    );

    let mut probes = Vec::new();
    for entry in list_entries(&raw_dir)? {
        if !entry.is_dir() {
            continue;
        }
        let name = file_name(&entry);
        let Some(label) = probe_label_for(&name) else {
            continue;
        };
        let target = raw_dir.join(label.as_str());
        if target.exists() {
            return Err(LayoutError::Conflict {
                from: entry,
                to: target,
            });
        }
        fs::rename(&entry, &target)?;
        log::info!("Renamed {} to {}", name, label);
        probes.push(label);
    }
    probes.sort();

    Ok(LayoutOutcome::Flattened { run_folder, probes })
}

/// `run_g0_imec1` -> `probe01`. Only names containing `imec` and ending in a digit qualify.
fn probe_label_for(name: &str) -> Option<ProbeLabel> {
    if !name.contains("imec") {
        return None;
    }
    let index = name.chars().last()?.to_digit(10)?;
    Some(ProbeLabel::from_index(index))
}

fn list_entries(dir: &Path) -> Result<Vec<PathBuf>, LayoutError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        entries.push(entry?.path());
    }
    entries.sort();
    Ok(entries)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
