use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

/// Default location Kubernetes reads a container's final message from.
pub const DEFAULT_TERMINATION_LOG: &str = "/dev/termination-log";

/// Render a document twice: pretty for the operator, compact (one line) for
/// the termination log.
pub fn render<T: Serialize>(doc: &T) -> serde_json::Result<(String, String)> {
    let pretty = serde_json::to_string_pretty(doc)?;
    let compact = serde_json::to_string(doc)?;
    Ok((pretty, compact))
}

/// Persist the compact document. Outside a container the path usually does
/// not exist, so failures are only logged.
pub fn write_termination_log(path: &Path, compact: &str) -> bool {
    match fs::write(path, format!("{compact}\n")) {
        Ok(()) => {
            debug!("wrote result document to {}", path.display());
            true
        }
        Err(err) => {
            warn!("could not write termination log {}: {err}", path.display());
            false
        }
    }
}

/// Print the document on stdout and mirror it into the termination log.
pub fn emit<T: Serialize>(doc: &T, termination_log: &Path) -> serde_json::Result<()> {
    let (pretty, compact) = render(doc)?;
    println!("{pretty}");
    write_termination_log(termination_log, &compact);
    Ok(())
}
