//! Entry-path checks: nothing may name a path outside the extraction root.

use crate::error::{Error, Result};

fn unsafe_entry(entry: &str, reason: &str) -> Error {
    Error::UnsafeArchiveEntry {
        entry: entry.to_string(),
        reason: reason.to_string(),
    }
}

/// Components of an archive path, splitting on both separators so that a
/// `..\` written on one OS is caught on every OS.
fn components(name: &str) -> impl Iterator<Item = &str> {
    name.split(['/', '\\']).filter(|c| !c.is_empty() && *c != ".")
}

fn is_absolute(name: &str) -> bool {
    let bytes = name.as_bytes();
    name.starts_with('/')
        || name.starts_with('\\')
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

/// Reject absolute names and any `..` component.
pub(super) fn check_entry_name(name: &str) -> Result<()> {
    if name.contains('\0') {
        return Err(unsafe_entry(name, "contains NUL"));
    }
    if is_absolute(name) {
        return Err(unsafe_entry(name, "absolute path"));
    }
    if components(name).any(|c| c == "..") {
        return Err(unsafe_entry(name, "path traversal (`..`)"));
    }
    Ok(())
}

/// Symlink at `entry` pointing at `target` (relative to the link's directory)
/// must stay inside the root.
pub(super) fn check_symlink_target(entry: &str, target: &str) -> Result<()> {
    if target.is_empty() {
        return Err(unsafe_entry(entry, "empty link target"));
    }
    if is_absolute(target) {
        return Err(unsafe_entry(entry, "link to absolute path"));
    }
    let parent: Vec<&str> = {
        let mut c: Vec<&str> = components(entry).collect();
        c.pop();
        c
    };
    let mut depth = parent.len() as i64;
    for c in components(target) {
        if c == ".." {
            depth -= 1;
            if depth < 0 {
                return Err(unsafe_entry(entry, "link escapes extraction root"));
            }
        } else {
            depth += 1;
        }
    }
    Ok(())
}

/// Hard links name their target relative to the archive root.
pub(super) fn check_hardlink_target(entry: &str, target: &str) -> Result<()> {
    check_entry_name(target).map_err(|_| unsafe_entry(entry, "hard link escapes extraction root"))
}

/// Last path component, for payload matching.
pub(super) fn file_name(name: &str) -> Option<&str> {
    components(name).last()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_ok() {
        assert!(check_entry_name("yo").is_ok());
        assert!(check_entry_name("./yo").is_ok());
        assert!(check_entry_name("yo-1.3.5/bin/yo").is_ok());
        assert!(check_entry_name("dir/").is_ok());
    }

    #[test]
    fn traversal_rejected() {
        for bad in ["../yo", "a/../../yo", "a\\..\\..\\yo", "/usr/bin/yo", "\\yo", "C:\\yo", "C:/yo"] {
            assert!(
                matches!(check_entry_name(bad), Err(Error::UnsafeArchiveEntry { .. })),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn inner_dotdot_that_stays_inside_still_rejected() {
        // a/b/../yo resolves inside, but `..` is refused outright
        assert!(check_entry_name("a/b/../yo").is_err());
    }

    #[test]
    fn symlink_targets() {
        assert!(check_symlink_target("bin/yo", "../libexec/yo").is_ok());
        assert!(check_symlink_target("yo", "yo-real").is_ok());
        assert!(check_symlink_target("yo", "../etc/passwd").is_err());
        assert!(check_symlink_target("bin/yo", "../../x").is_err());
        assert!(check_symlink_target("yo", "/etc/passwd").is_err());
        assert!(check_symlink_target("yo", "").is_err());
    }

    #[test]
    fn hardlink_targets() {
        assert!(check_hardlink_target("yo2", "dir/yo").is_ok());
        assert!(check_hardlink_target("yo2", "../yo").is_err());
    }

    #[test]
    fn file_name_last_component() {
        assert_eq!(file_name("yo-1.3.5/yo"), Some("yo"));
        assert_eq!(file_name("yo"), Some("yo"));
        assert_eq!(file_name("dir/"), Some("dir"));
        assert_eq!(file_name(""), None);
    }
}
