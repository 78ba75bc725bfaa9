pub const SUCCESS: i32 = 0;
/// Work failed and nothing succeeded, or the run could not start.
pub const EXECUTION_ERROR: i32 = 1;
/// Some probes or sessions failed while others succeeded.
pub const PARTIAL_FAILURE: i32 = 2;
pub const CONFIG_ERROR: i32 = 3;
pub const DATA_FOLDER_NOT_FOUND: i32 = 4;
