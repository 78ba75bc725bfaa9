use super::{load_settings, print_json};
use crate::cli::ValidateArgs;
use crate::exit_codes;
use serde::Serialize;
use spikesort_rs::{CommandAdapter, Settings, SorterParams, Stage};
use std::path::Path;

#[derive(Serialize)]
struct ValidateOutput {
    config_dir: String,
    data_folder: String,
    data_folder_exists: bool,
    spike_sorter: String,
    sorter_folder: String,
    sorter_params: String,
    run_bombcell: bool,
    system: String,
    run_log: Option<String>,
    commands: Vec<StageCommand>,
}

#[derive(Serialize)]
struct StageCommand {
    stage: Stage,
    argv: Vec<String>,
    overridden: bool,
}

pub fn execute(config_dir: &Path, args: ValidateArgs) -> i32 {
    let settings = match load_settings(config_dir) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let result = describe(config_dir, &settings);

    if args.json {
        let code = print_json(&result);
        if code != exit_codes::SUCCESS {
            return code;
        }
    } else {
        println!("Configuration in '{}' is valid", result.config_dir);
        let missing = if result.data_folder_exists { "" } else { " (missing)" };
        println!("  Data folder:   {}{}", result.data_folder, missing);
        println!("  Sorter:        {} -> {}", result.spike_sorter, result.sorter_folder);
        println!("  Parameters:    {}", result.sorter_params);
        let bombcell = if result.run_bombcell { "enabled" } else { "disabled" };
        println!("  Bombcell:      {}", bombcell);
        println!("  Sync system:   {}", result.system);
        if let Some(ref run_log) = result.run_log {
            println!("  Run log:       {}", run_log);
        }
        for command in &result.commands {
            let marker = if command.overridden { "*" } else { " " };
            println!("  {}{:<16} {}", marker, command.stage.as_str(), command.argv.join(" "));
        }
    }

    if result.data_folder_exists {
        exit_codes::SUCCESS
    } else {
        exit_codes::DATA_FOLDER_NOT_FOUND
    }
}

fn describe(config_dir: &Path, settings: &Settings) -> ValidateOutput {
    let commands = Stage::ALL
        .iter()
        .filter_map(|&stage| {
            let overridden = settings.stage_commands.get(&stage);
            let adapter = match overridden {
                Some(argv) => Some(CommandAdapter::new(argv.clone())),
                None => CommandAdapter::default_for(stage),
            }?;
            Some(StageCommand {
                stage,
                argv: adapter.argv().to_vec(),
                overridden: overridden.is_some(),
            })
        })
        .collect();

    ValidateOutput {
        config_dir: config_dir.display().to_string(),
        data_folder: settings.data_folder.display().to_string(),
        data_folder_exists: settings.data_folder.is_dir(),
        spike_sorter: settings.spike_sorter.clone(),
        sorter_folder: settings.sorter_folder(),
        sorter_params: match &settings.sorter_params {
            SorterParams::Overrides(map) => format!("{} override(s)", map.len()),
            SorterParams::DelegateDefaults => "delegate defaults".to_string(),
        },
        run_bombcell: settings.run_bombcell(),
        system: settings.aux_wiring.system.clone(),
        run_log: settings.run_log.as_ref().map(|p| p.display().to_string()),
        commands,
    }
}
