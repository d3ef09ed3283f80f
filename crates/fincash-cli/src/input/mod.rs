pub mod file;
pub mod stdin;

use serde_json::Value;
use tracing::debug;

/// Parameters from `--input` when given, otherwise from piped stdin.
/// Returns None when neither source is present so flags apply.
pub fn read_params(path: Option<&str>) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        debug!(path, "reading parameters from file");
        return Ok(Some(file::read_value(path)?));
    }
    let piped = stdin::read_stdin()?;
    if piped.is_some() {
        debug!("reading parameters from stdin");
    }
    Ok(piped)
}
