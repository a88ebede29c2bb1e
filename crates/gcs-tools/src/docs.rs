//! The documentation tool's backing file.

use std::path::Path;

/// Return the reference document verbatim, or a descriptive error string.
pub async fn read_documentation(path: &Path) -> String {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            format!("Error: The documentation file '{}' was not found.", name)
        }
        Err(e) => format!(
            "An unexpected error occurred while reading the documentation: {}",
            e
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_file_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DOCS.md");
        std::fs::write(&path, "# Tools\n\n- list_gcs_objects\n").unwrap();
        assert_eq!(
            read_documentation(&path).await,
            "# Tools\n\n- list_gcs_objects\n"
        );
    }

    #[tokio::test]
    async fn test_missing_file_message() {
        let dir = tempfile::tempdir().unwrap();
        let msg = read_documentation(&dir.path().join("MCP_DOCUMENTATION.md")).await;
        assert_eq!(
            msg,
            "Error: The documentation file 'MCP_DOCUMENTATION.md' was not found."
        );
    }

    #[tokio::test]
    async fn test_directory_is_unexpected_error() {
        let dir = tempfile::tempdir().unwrap();
        let msg = read_documentation(dir.path()).await;
        assert!(msg.starts_with("An unexpected error occurred"), "{}", msg);
    }
}
