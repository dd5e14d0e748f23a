//! Path normalization helpers.

use crate::error::{FsError, FsResult};

/// Normalize a repository path: strip surrounding slashes and reject empty,
/// `.` and `..` components. The root normalizes to `""`.
pub fn normalize(path: &str) -> FsResult<String> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    for component in trimmed.split('/') {
        let reason = match component {
            "" => "empty component",
            "." | ".." => "relative component",
            _ => continue,
        };
        return Err(FsError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Parent of a normalized path; `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    Some(path.rsplit_once('/').map_or("", |(dir, _)| dir))
}

/// Last component of a normalized path.
pub fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

/// Join a normalized directory and a child name.
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// `true` if `path` lies strictly below `dir`.
pub fn is_descendant(path: &str, dir: &str) -> bool {
    if dir.is_empty() {
        return !path.is_empty();
    }
    path.len() > dir.len() && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/'
}
