//! Path syntax: absolute, single-component names.
//!
//! TFS has no nested directories (spec.md Non-goals), so a valid path is
//! `/` followed by at least one byte that is itself not `/`.

use crate::error::{Result, TfsError};
use crate::param::MAX_FILE_NAME;

/// Validates `path` and returns the single component name following the
/// leading `/`.
///
/// Fails if the path does not start with `/`, has nothing after the `/`,
/// contains a nested component (a second `/`), or the component is too
/// long to fit a directory entry (spec.md section 4.3 truncates to
/// `MAX_FILE_NAME - 1` bytes plus a terminator, but an oversized *lookup*
/// path can never have matched anything created through `open`, so it is
/// rejected up front instead of silently truncated).
pub fn parse_absolute(path: &str) -> Result<&str> {
    let rest = path
        .strip_prefix('/')
        .ok_or(TfsError::InvalidArgument("path must be absolute"))?;
    if rest.is_empty() {
        return Err(TfsError::InvalidArgument(
            "path must have a component after '/'",
        ));
    }
    if rest.contains('/') {
        return Err(TfsError::InvalidArgument(
            "nested directories are not supported",
        ));
    }
    if rest.len() >= MAX_FILE_NAME {
        return Err(TfsError::InvalidArgument("file name too long"));
    }
    Ok(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_absolute_path() {
        assert_eq!(parse_absolute("/a").unwrap(), "a");
    }

    #[test]
    fn rejects_relative_path() {
        assert!(parse_absolute("a").is_err());
    }

    #[test]
    fn rejects_bare_root() {
        assert!(parse_absolute("/").is_err());
    }

    #[test]
    fn rejects_nested_path() {
        assert!(parse_absolute("/a/b").is_err());
    }

    #[test]
    fn rejects_oversized_name() {
        let long_name = "x".repeat(MAX_FILE_NAME);
        let path = format!("/{long_name}");
        assert!(parse_absolute(&path).is_err());
    }
}
