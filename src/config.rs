/// Parameter loading
/// Every engine's parameter record has textbook defaults; a JSON file overrides any subset of fields

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{SimError, SimResult};

/// Defaults when `path` is None, otherwise the parsed JSON file.
pub fn load_params<T>(path: Option<&Path>) -> SimResult<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        return Ok(T::default());
    };
    let content = std::fs::read_to_string(path).map_err(|source| SimError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let params = serde_json::from_str(&content)?;
    log::debug!("loaded parameters from {}", path.display());
    Ok(params)
}
