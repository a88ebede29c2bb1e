//! Startup configuration helpers.

/// Clean up a credentials path taken from the environment.
///
/// Deployment tooling tends to hand over values like `" '/keys/sa.json' "`.
/// Surrounding whitespace is trimmed first, then surrounding quote characters.
pub fn normalize_credentials_path(raw: &str) -> String {
    let cleaned = raw.trim().trim_matches(|c: char| c == '\'' || c == '"');
    if cleaned != raw {
        tracing::info!(
            "Normalized credentials path from '{}' to '{}'.",
            raw,
            cleaned
        );
    }
    cleaned.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_credentials_path() {
        assert_eq!(normalize_credentials_path("/keys/sa.json"), "/keys/sa.json");
        assert_eq!(normalize_credentials_path("  /keys/sa.json\n"), "/keys/sa.json");
        assert_eq!(normalize_credentials_path("'/keys/sa.json'"), "/keys/sa.json");
        assert_eq!(normalize_credentials_path(" \"/keys/sa.json\" "), "/keys/sa.json");
        assert_eq!(normalize_credentials_path("\"'/k.json'\""), "/k.json");
    }

    #[test]
    fn test_inner_quotes_untouched() {
        assert_eq!(normalize_credentials_path("/it's/sa.json"), "/it's/sa.json");
    }
}
