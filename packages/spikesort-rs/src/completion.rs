use crate::types::Session;
use std::io;

/// Remove the trigger marker, closing the session for external tooling.
///
/// Returns `false` when the marker was already gone. There is no rollback.
pub fn remove_marker(session: &Session) -> io::Result<bool> {
    match std::fs::remove_file(session.marker()) {
        Ok(()) => {
            log::info!("Removed trigger marker from {}", session.path().display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
