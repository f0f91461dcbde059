//! `pyissues version`.

use serde::Serialize;

use crate::error::Result;
use crate::remote::DEFAULT_BASE_URL;

/// Archive container layout version written by this build.
const CONTAINER_FORMAT: &str = "json-v1";

#[derive(Debug, Serialize)]
struct VersionInfo {
    version: &'static str,
    container: &'static str,
    text_transform: &'static str,
    tracker: &'static str,
}

fn info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION"),
        container: CONTAINER_FORMAT,
        text_transform: "base64",
        tracker: DEFAULT_BASE_URL,
    }
}

/// Print the version and the archive format this build reads and writes.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let info = info();
    if json {
        println!("{}", serde_json::to_string(&info)?);
    } else {
        println!(
            "pyissues version {} (archive {}, {} text, tracker {})",
            info.version, info.container, info.text_transform, info.tracker
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info_names_archive_format() {
        let value = serde_json::to_value(info()).unwrap();
        assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(value["container"], "json-v1");
        assert_eq!(value["tracker"], "https://bugs.python.org/");
    }
}
