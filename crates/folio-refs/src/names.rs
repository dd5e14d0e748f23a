//! Branch name validation and canonical ref names.
//!
//! Branch names follow git's conventions so that every name is also a safe
//! relative path below `refs/heads/`. Quarantine branches generated at commit
//! time (`conflict-<uuid>`) always pass.

use crate::error::{RefError, Result};

/// Namespace prefix for branch refs.
pub const HEADS_PREFIX: &str = "refs/heads/";

const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

fn invalid(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidBranchName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a branch name, returning `Ok(())` if valid.
///
/// ```
/// use folio_refs::names::validate_branch_name;
///
/// assert!(validate_branch_name("main").is_ok());
/// assert!(validate_branch_name("conflict-0b7e").is_ok());
/// assert!(validate_branch_name("bad..name").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "branch name must not be empty"));
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }
    for (pattern, reason) in [
        ("..", "must not contain '..'"),
        ("@{", "must not contain '@{'"),
        ("//", "must not contain consecutive slashes"),
    ] {
        if name.contains(pattern) {
            return Err(invalid(name, reason));
        }
    }
    if name.ends_with(".lock") {
        return Err(invalid(name, "must not end with '.lock'"));
    }
    if name.starts_with('/') || name.ends_with('/') || name.ends_with('.') {
        return Err(invalid(name, "must not start or end with '/' or end with '.'"));
    }
    if let Some(component) = name.split('/').find(|c| c.starts_with('.')) {
        return Err(invalid(
            name,
            format!("component must not start with '.': {component:?}"),
        ));
    }
    Ok(())
}

/// Canonical ref name for a branch (`main` -> `refs/heads/main`).
pub fn branch_ref_name(branch: &str) -> String {
    format!("{HEADS_PREFIX}{branch}")
}

/// Inverse of [`branch_ref_name`]; `None` for refs outside `refs/heads/`.
pub fn branch_from_ref_name(name: &str) -> Option<&str> {
    name.strip_prefix(HEADS_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        for name in ["main", "my-branch", "v1.0", "feature/auth", "conflict-1f2e"] {
            assert!(validate_branch_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_malformed_names() {
        for name in [
            "",
            "bad..name",
            "has space",
            "a~b",
            "a:b",
            "a[b",
            ".hidden",
            "trailing.",
            "/leading",
            "trailing/",
            "a//b",
            "main.lock",
            "ref@{0}",
            "feature/.hidden",
        ] {
            assert!(validate_branch_name(name).is_err(), "{name:?}");
        }
    }

    #[test]
    fn ref_name_roundtrip() {
        let full = branch_ref_name("feature/x");
        assert_eq!(full, "refs/heads/feature/x");
        assert_eq!(branch_from_ref_name(&full), Some("feature/x"));
        assert_eq!(branch_from_ref_name("refs/tags/v1"), None);
    }
}
