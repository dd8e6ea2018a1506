//! Name-pattern filtering for listings
//!
//! Patterns use shell glob syntax and match against the entry name only,
//! never the full path. Include patterns apply to files; omit patterns
//! apply to files and directories alike. The metadata sidecar is always
//! excluded regardless of patterns.

use driftsync_target::is_sidecar_name;
use driftsync_types::{Entry, Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled include/omit filter for one run
#[derive(Debug)]
pub struct PathFilter {
    include: Option<GlobSet>,
    omit: Option<GlobSet>,
}

impl PathFilter {
    /// Compile patterns; an invalid glob is a configuration error
    pub fn new(include_files: &[String], omit: &[String]) -> Result<Self> {
        Ok(Self {
            include: build_set(include_files)?,
            omit: build_set(omit)?,
        })
    }

    /// Filter that passes everything except sidecars
    pub fn allow_all() -> Self {
        Self {
            include: None,
            omit: None,
        }
    }

    /// Whether `entry` participates in synchronization
    pub fn matches(&self, entry: &Entry) -> bool {
        if is_sidecar_name(&entry.name) {
            return false;
        }
        if let Some(omit) = &self.omit {
            if omit.is_match(&entry.name) {
                return false;
            }
        }
        if entry.is_directory {
            return true;
        }
        match &self.include {
            Some(include) => include.is_match(&entry.name),
            None => true,
        }
    }
}

fn build_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::config(format!("invalid pattern '{pattern}': {e}")))?;
        builder.add(glob);
    }
    let set = builder
        .build()
        .map_err(|e| Error::config(e.to_string()))?;
    Ok(Some(set))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> Entry {
        Entry::file(name, "", 1, 0.0)
    }

    fn dir(name: &str) -> Entry {
        Entry::directory(name, "", 0, 0.0)
    }

    #[test]
    fn test_empty_filter_passes_all_but_sidecar() {
        let filter = PathFilter::allow_all();
        assert!(filter.matches(&file("a.txt")));
        assert!(filter.matches(&dir("folder")));
        assert!(!filter.matches(&file("_driftsync-meta.json")));
    }

    #[test]
    fn test_include_applies_to_files_only() {
        let filter = PathFilter::new(&["*.txt".to_string()], &[]).unwrap();
        assert!(filter.matches(&file("a.txt")));
        assert!(!filter.matches(&file("a.jpg")));
        assert!(filter.matches(&dir("photos")));
    }

    #[test]
    fn test_omit_applies_to_dirs_too() {
        let filter = PathFilter::new(&[], &["*.tmp".to_string(), ".git".to_string()]).unwrap();
        assert!(!filter.matches(&file("scratch.tmp")));
        assert!(!filter.matches(&dir(".git")));
        assert!(filter.matches(&file("keep.txt")));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = PathFilter::new(&["[".to_string()], &[]).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
