//! Recursive file lookup used as the fallback resolution strategy.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Extension of RTFD bundles, directories that Mail stores as one attachment.
pub const BUNDLE_EXT: &str = "rtfd";

/// Finds a file somewhere below a directory.
///
/// The locator only knows the top of a mailbox tree; the layout beneath it
/// varies by account type and Mail version, so it asks an implementation of
/// this trait to look. Tests substitute a fake.
pub trait FileSearch {
    /// First regular file or RTFD bundle below `root` (in a stable order)
    /// for which `accept` returns `true`.
    fn find(&self, root: &Path, accept: &dyn Fn(&Path) -> bool) -> Option<PathBuf>;
}

/// [`FileSearch`] backed by a depth-limited directory walk.
#[derive(Debug, Clone)]
pub struct WalkDirSearch {
    max_depth: usize,
}

impl WalkDirSearch {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }
}

impl Default for WalkDirSearch {
    fn default() -> Self {
        Self::new(16)
    }
}

impl FileSearch for WalkDirSearch {
    fn find(&self, root: &Path, accept: &dyn Fn(&Path) -> bool) -> Option<PathBuf> {
        if !root.is_dir() {
            return None;
        }
        debug!(root = %root.display(), max_depth = self.max_depth, "Scanning directory tree");
        WalkDir::new(root)
            .max_depth(self.max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable entry");
                    None
                }
            })
            .filter(is_candidate)
            .map(walkdir::DirEntry::into_path)
            .find(|p| accept(p.as_path()))
    }
}

fn is_candidate(entry: &DirEntry) -> bool {
    entry.file_type().is_file() || (entry.file_type().is_dir() && is_bundle(entry.path()))
}

/// `true` if `path` is named like an RTFD bundle.
pub fn is_bundle(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(BUNDLE_EXT))
}
