//! Per-user path sandboxing.
//!
//! Every authenticated caller sees a private namespace: the caller-visible
//! path `reports/q1.csv` is stored as `<user_id>/reports/q1.csv`. Listings strip
//! the prefix again so callers never see their own or anyone else's user id.
//!
//! Anonymous callers (auth disabled) get the identity mapping.

use crate::identity::Identity;

/// Maps caller-visible paths to storage paths for one identity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sandbox {
    prefix: Option<String>,
}

impl Sandbox {
    /// Create the sandbox for `identity`, or an unsandboxed one for `None`.
    pub fn new(identity: Option<&Identity>) -> Self {
        Self {
            prefix: identity.map(|id| format!("{}/", id.user_id)),
        }
    }

    /// The storage prefix, including the trailing separator.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Map a caller path to its storage path.
    pub fn to_storage(&self, path: &str) -> String {
        match &self.prefix {
            Some(prefix) => {
                let storage = format!("{}{}", prefix, path);
                tracing::debug!("Sandboxing path '{}' -> '{}'", path, storage);
                storage
            }
            None => path.to_string(),
        }
    }

    /// Map a storage path back to what the caller should see.
    pub fn to_caller<'a>(&self, path: &'a str) -> &'a str {
        match &self.prefix {
            Some(prefix) => path.strip_prefix(prefix.as_str()).unwrap_or(path),
            None => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;

    const PATHS: &[&str] = &[
        "",
        "f.txt",
        "dir/",
        "dir/f.txt",
        "a/b/c/",
        "with space/and-dash_.bin",
        "user-1",
        "/leading",
    ];

    #[test]
    fn test_round_trip_with_identity() {
        let id = Identity::new("user-1", Role::Agent);
        let sandbox = Sandbox::new(Some(&id));
        for path in PATHS {
            let storage = sandbox.to_storage(path);
            assert!(storage.starts_with("user-1/"), "{} not prefixed", storage);
            assert_eq!(sandbox.to_caller(&storage), *path);
        }
    }

    #[test]
    fn test_round_trip_anonymous() {
        let sandbox = Sandbox::new(None);
        assert!(sandbox.prefix().is_none());
        for path in PATHS {
            assert_eq!(sandbox.to_storage(path), *path);
            assert_eq!(sandbox.to_caller(path), *path);
        }
    }

    #[test]
    fn test_directory_paths_prefixed_like_files() {
        let id = Identity::new("u", Role::AgentAdmin);
        let sandbox = Sandbox::new(Some(&id));
        assert_eq!(sandbox.to_storage("dir/"), "u/dir/");
        assert_eq!(sandbox.to_storage("dir/f"), "u/dir/f");
        assert_eq!(sandbox.to_storage(""), "u/");
    }

    #[test]
    fn test_to_caller_leaves_foreign_paths() {
        let id = Identity::new("alice", Role::Agent);
        let sandbox = Sandbox::new(Some(&id));
        assert_eq!(sandbox.to_caller("alice/x"), "x");
        assert_eq!(sandbox.to_caller("bob/x"), "bob/x");
        assert_eq!(sandbox.to_caller("alicex/y"), "alicex/y");
    }
}
