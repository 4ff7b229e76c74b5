use std::path::{Path, PathBuf};
use std::time::Instant;

use walkdir::WalkDir;

use crate::{CancelToken, IndexError, IndexReport, PathCatalog};

const DEFAULT_PROGRESS_INTERVAL: usize = 500;

/// Walks a directory tree into a fresh [`PathCatalog`].
#[derive(Debug, Clone)]
pub struct Indexer {
    follow_symlinks: bool,
    progress_interval: usize,
}

impl Default for Indexer {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl Indexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Followed links that lead back to an ancestor are skipped, not walked.
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    pub fn progress_interval(mut self, every: usize) -> Self {
        self.progress_interval = every.max(1);
        self
    }

    /// Checks that `root` is an existing directory and returns it as an absolute path.
    pub fn validate_root(root: &Path) -> Result<PathBuf, IndexError> {
        let is_dir = std::fs::metadata(root)
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(IndexError::InvalidRoot(root.to_path_buf()));
        }

        std::path::absolute(root).map_err(|_| IndexError::InvalidRoot(root.to_path_buf()))
    }

    pub fn build(&self, root: &Path) -> Result<(PathCatalog, IndexReport), IndexError> {
        self.build_with(root, &CancelToken::new(), |_| {})
    }

    /// Builds a catalog of every regular file below `root`.
    ///
    /// `on_progress` receives the running file count every `progress_interval` files.
    /// Unreadable entries are skipped and counted in the report.
    pub fn build_with(
        &self,
        root: &Path,
        cancel: &CancelToken,
        mut on_progress: impl FnMut(usize),
    ) -> Result<(PathCatalog, IndexReport), IndexError> {
        let root = Self::validate_root(root)?;
        let started = Instant::now();
        tracing::debug!(root = %root.display(), follow_symlinks = self.follow_symlinks, "index walk start");

        let mut catalog = PathCatalog::new();
        let mut files = 0usize;
        let mut skipped = 0usize;

        for entry in WalkDir::new(&root).follow_links(self.follow_symlinks) {
            if cancel.is_cancelled() {
                tracing::debug!(root = %root.display(), files, "index walk cancelled");
                return Err(IndexError::Cancelled);
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    skipped += 1;
                    tracing::debug!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            if !catalog.insert(entry.file_name(), entry.path()) {
                continue;
            }
            files += 1;

            if files % self.progress_interval == 0 {
                on_progress(files);
            }
        }

        let report = IndexReport {
            root,
            files,
            names: catalog.name_count(),
            skipped,
            elapsed: started.elapsed(),
        };
        tracing::debug!(
            root = %report.root.display(),
            files = report.files,
            names = report.names,
            skipped = report.skipped,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "index walk finished"
        );

        Ok((catalog, report))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn sample_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("one/deeper")).unwrap();
        fs::create_dir_all(dir.path().join("two")).unwrap();
        fs::write(dir.path().join("one/a.txt"), "1").unwrap();
        fs::write(dir.path().join("two/a.txt"), "2").unwrap();
        fs::write(dir.path().join("b.txt"), "3").unwrap();
        fs::write(dir.path().join("one/deeper/c.log"), "4").unwrap();
        dir
    }

    #[test]
    fn indexes_every_regular_file_under_its_name() {
        let dir = sample_tree();
        let (catalog, report) = Indexer::new().build(dir.path()).unwrap();

        assert_eq!(report.files, 4);
        assert_eq!(report.names, 3);
        assert_eq!(catalog.path_count(), 4);
        assert_eq!(catalog.paths_for("b.txt").count(), 1);
        assert_eq!(catalog.paths_for("c.log").count(), 1);
        // directories are not catalogued
        assert_eq!(catalog.paths_for("deeper").count(), 0);
    }

    #[test]
    fn same_name_in_two_directories_keeps_both_paths() {
        let dir = sample_tree();
        let (catalog, _) = Indexer::new().build(dir.path()).unwrap();

        let paths: Vec<&Path> = catalog.paths_for("a.txt").collect();
        assert_eq!(paths.len(), 2);
        assert_ne!(paths[0], paths[1]);
        for path in paths {
            assert!(path.is_absolute());
            assert!(path.ends_with("a.txt"));
        }
    }

    #[test]
    fn rejects_missing_root_and_plain_file() {
        let dir = sample_tree();

        let missing = dir.path().join("nope");
        assert!(matches!(
            Indexer::new().build(&missing),
            Err(IndexError::InvalidRoot(p)) if p == missing
        ));

        let file = dir.path().join("b.txt");
        assert!(matches!(
            Indexer::new().build(&file),
            Err(IndexError::InvalidRoot(_))
        ));
    }

    #[test]
    fn cancelled_token_stops_the_walk() {
        let dir = sample_tree();
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = Indexer::new().build_with(dir.path(), &cancel, |_| {});
        assert!(matches!(result, Err(IndexError::Cancelled)));
    }

    #[test]
    fn reports_progress_at_interval() {
        let dir = sample_tree();
        let mut seen = Vec::new();

        Indexer::new()
            .progress_interval(2)
            .build_with(dir.path(), &CancelToken::new(), |n| seen.push(n))
            .unwrap();

        assert_eq!(seen, vec![2, 4]);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_terminates_when_following_links() {
        let dir = sample_tree();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("one/loop")).unwrap();

        let (catalog, report) = Indexer::new()
            .follow_symlinks(true)
            .build(dir.path())
            .unwrap();

        assert_eq!(catalog.paths_for("b.txt").count(), 1);
        assert!(report.skipped >= 1);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_followed_by_default() {
        let dir = sample_tree();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("elsewhere.txt"), "x").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("linked")).unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("elsewhere.txt"),
            dir.path().join("alias.txt"),
        )
        .unwrap();

        let (catalog, report) = Indexer::new().build(dir.path()).unwrap();
        assert_eq!(catalog.paths_for("elsewhere.txt").count(), 0);
        assert_eq!(catalog.paths_for("alias.txt").count(), 0);
        assert_eq!(report.files, 4);

        let (followed, _) = Indexer::new()
            .follow_symlinks(true)
            .build(dir.path())
            .unwrap();
        assert_eq!(followed.paths_for("elsewhere.txt").count(), 1);
        assert_eq!(followed.paths_for("alias.txt").count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_is_skipped_and_counted() {
        use std::os::unix::fs::PermissionsExt;

        let dir = sample_tree();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("secret.txt"), "s").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // root ignores directory permissions, nothing to observe there
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = Indexer::new().build(dir.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        let (catalog, report) = result.unwrap();

        assert_eq!(report.files, 4);
        assert_eq!(report.skipped, 1);
        assert_eq!(catalog.paths_for("secret.txt").count(), 0);
        assert_eq!(catalog.paths_for("b.txt").count(), 1);
        assert_eq!(catalog.paths_for("c.log").count(), 1);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_file_name_is_catalogued_exactly() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = sample_tree();
        let name = OsStr::from_bytes(b"budget\xff.xlsx");
        fs::write(dir.path().join(name), "b").unwrap();

        let (catalog, _) = Indexer::new().build(dir.path()).unwrap();
        let paths: Vec<&Path> = catalog.paths_for(name).collect();

        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].file_name(), Some(name));
        assert!(paths[0].is_file());
    }
}
