use super::{load_settings, print_json};
use crate::cli::DiscoverArgs;
use crate::exit_codes;
use serde::Serialize;
use spikesort_rs::SessionDiscoverer;
use std::path::Path;

#[derive(Serialize)]
struct DiscoveredSession {
    path: String,
    has_raw_data: bool,
    probes: Vec<String>,
}

pub fn execute(config_dir: &Path, args: DiscoverArgs) -> i32 {
    let settings = match load_settings(config_dir) {
        Ok(s) => s,
        Err(code) => return code,
    };

    if !settings.data_folder.is_dir() {
        eprintln!(
            "Error: data folder not found: {}",
            settings.data_folder.display()
        );
        return exit_codes::DATA_FOLDER_NOT_FOUND;
    }

    let sessions: Vec<DiscoveredSession> = SessionDiscoverer::new(&settings.data_folder)
        .sessions()
        .map(|session| {
            let probes: Vec<String> = session
                .probes()
                .map(|probes| probes.iter().map(|p| p.label.to_string()).collect())
                .unwrap_or_default();
            DiscoveredSession {
                path: session.path().display().to_string(),
                has_raw_data: session.raw_dir().is_dir(),
                probes,
            }
        })
        .collect();

    if args.json {
        return print_json(&sessions);
    }

    if sessions.is_empty() {
        println!("No triggered sessions under {}", settings.data_folder.display());
        return exit_codes::SUCCESS;
    }

    println!("{:<60} PROBES", "SESSION");
    println!("{}", "-".repeat(72));
    for session in &sessions {
        let probes = if !session.has_raw_data {
            "(no raw data)".to_string()
        } else if session.probes.is_empty() {
            "(not normalized)".to_string()
        } else {
            session.probes.join(", ")
        };
        println!("{:<60} {}", session.path, probes);
    }

    exit_codes::SUCCESS
}
