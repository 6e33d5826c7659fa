//! Manifest collection.
//!
//! Gathers the YAML files under one top-level directory of the working copy,
//! recursively, in a stable order. The order matters: it is the document
//! order inside the bundle, and identical input must produce an identical
//! apply.

use std::path::Path;

use globset::{Glob, GlobMatcher};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{CollectionError, Namespace};

/// File-name patterns that identify a manifest. Each is checked on its own.
pub const MANIFEST_PATTERNS: [&str; 2] = ["*.yml", "*.yaml"];

/// Collects the manifests under `root/<directory>`.
///
/// Returns one string per matching file, each ending in a newline. Subtrees
/// that cannot be listed and files that cannot be read are skipped with a
/// warning; only a malformed pattern is an error.
pub fn collect(root: &Path, directory: &Namespace) -> Result<Vec<String>, CollectionError> {
    collect_matching(root, directory, &MANIFEST_PATTERNS)
}

/// [`collect`] with caller-supplied file-name patterns.
pub fn collect_matching(
    root: &Path,
    directory: &Namespace,
    patterns: &[&str],
) -> Result<Vec<String>, CollectionError> {
    let matchers = compile(patterns)?;
    let walker = WalkDir::new(root.join(directory.as_str()))
        .follow_links(false)
        .sort_by_file_name();
    Ok(gather(walker, directory, &matchers))
}

fn gather(walker: WalkDir, directory: &Namespace, matchers: &[GlobMatcher]) -> Vec<String> {
    let mut documents = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                // can't walk here, keep walking elsewhere
                warn!(directory = %directory, error = %err, "skipping unreadable path");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        for matcher in matchers {
            if !matcher.is_match(entry.file_name()) {
                continue;
            }
            match std::fs::read_to_string(entry.path()) {
                Ok(mut text) => {
                    if !text.ends_with('\n') {
                        text.push('\n');
                    }
                    debug!(path = %entry.path().display(), "collected manifest");
                    documents.push(text);
                }
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "skipping unreadable manifest");
                }
            }
        }
    }
    documents
}

fn compile(patterns: &[&str]) -> Result<Vec<GlobMatcher>, CollectionError> {
    patterns
        .iter()
        .map(|pattern| {
            Glob::new(pattern)
                .map(|glob| glob.compile_matcher())
                .map_err(|source| CollectionError::Pattern {
                    pattern: (*pattern).to_string(),
                    source,
                })
        })
        .collect()
}
