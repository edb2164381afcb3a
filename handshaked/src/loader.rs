//! Reads the three well-known documents from a working copy.

use handshake_common::{
    CONTRACT_FILE, ConfigTriplet, HandshakeError, INTERFACE_FILE, SERVICE_FILE,
};
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Load the config triplet at `path`.
///
/// Each document is independent: a missing file is `None`, an unreadable or
/// unparsable one fails the whole load. A file holding only whitespace or
/// comments counts as missing.
pub async fn load(path: &Path) -> Result<ConfigTriplet, HandshakeError> {
    let triplet = ConfigTriplet {
        contract: read_document(path, CONTRACT_FILE).await?,
        interface: read_document(path, INTERFACE_FILE).await?,
        service: read_document(path, SERVICE_FILE).await?,
    };
    debug!(
        path = %path.display(),
        contract = triplet.contract.is_some(),
        interface = triplet.interface.is_some(),
        service = triplet.service.is_some(),
        "loaded config triplet"
    );
    Ok(triplet)
}

async fn read_document<T: DeserializeOwned>(
    dir: &Path,
    document: &'static str,
) -> Result<Option<T>, HandshakeError> {
    let path = dir.join(document);
    let malformed = |detail: String| HandshakeError::MalformedConfig {
        document,
        path: path.clone(),
        detail,
    };

    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(malformed(e.to_string())),
    };

    let value: serde_yaml_ng::Value =
        serde_yaml_ng::from_str(&text).map_err(|e| malformed(e.to_string()))?;
    if value.is_null() {
        return Ok(None);
    }
    serde_yaml_ng::from_value(value)
        .map(Some)
        .map_err(|e| malformed(e.to_string()))
}
