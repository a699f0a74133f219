use std::collections::HashSet;
use std::path::Path;

use crate::types::{ApiDescriptor, McpError};

/// Load API descriptors from a JSON file on disk.
pub fn load_apis(path: impl AsRef<Path>) -> Result<Vec<ApiDescriptor>, McpError> {
    let data = std::fs::read(path)?;
    parse_apis(&data)
}

/// Parse API descriptors from raw JSON bytes.
///
/// Order is preserved; it is the order `resources/list` reports them in.
pub fn parse_apis(data: &[u8]) -> Result<Vec<ApiDescriptor>, McpError> {
    let apis: Vec<ApiDescriptor> = serde_json::from_slice(data)?;
    let mut seen = HashSet::with_capacity(apis.len());

    for api in &apis {
        validate_id(&api.id)?;
        if !seen.insert(api.id.as_str()) {
            return Err(McpError::Config(format!("duplicate API id \"{}\"", api.id)));
        }
    }

    Ok(apis)
}

/// Ids end up as a URI segment and a file name.
fn validate_id(id: &str) -> Result<(), McpError> {
    if id.is_empty() {
        return Err(McpError::Config("API id must not be empty".into()));
    }
    if id == "." || id == ".." || id.contains(['/', '\\']) {
        return Err(McpError::Config(format!("invalid API id \"{}\"", id)));
    }
    Ok(())
}
