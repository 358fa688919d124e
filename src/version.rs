//! Release version lookup

use std::path::Path;
use tracing::debug;

/// Version reported when no release marker is available
pub const DEVELOPMENT_VERSION: &str = "development";

/// Read the version from the release marker file, falling back to `"development"`
pub async fn read_version(release_file_path: Option<&Path>) -> String {
    let Some(path) = release_file_path else {
        return DEVELOPMENT_VERSION.to_string();
    };

    match tokio::fs::read_to_string(path).await {
        Ok(content) => content.trim().to_string(),
        Err(e) => {
            debug!("Release file {:?} not readable: {}", path, e);
            DEVELOPMENT_VERSION.to_string()
        }
    }
}
