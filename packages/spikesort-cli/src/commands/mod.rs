pub mod discover;
pub mod run;
pub mod validate;

use crate::exit_codes;
use spikesort_rs::Settings;
use std::path::Path;

/// Load settings or report the configuration error with its exit code.
pub(crate) fn load_settings(config_dir: &Path) -> Result<Settings, i32> {
    Settings::load(config_dir).map_err(|e| {
        eprintln!("Configuration error: {}", e);
        exit_codes::CONFIG_ERROR
    })
}

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match crate::output::emit_json(value, false, None) {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_codes::EXECUTION_ERROR
        }
    }
}
