//! Resolution of file name collisions at the destination.
//!
//! The resolver never looks at the filesystem itself. Callers pass an
//! occupancy predicate so that paths already claimed by earlier entries of
//! the same plan count as taken, not only files that exist on disk.

use crate::config::DuplicateStrategy;
use crate::error::{OrganizeError, OrganizeResult};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How many numbered names RENAME tries before falling back to a timestamp.
pub const MAX_RENAME_ATTEMPTS: usize = 1000;

/// Folder under the target that receives MERGE_TO_DUPLICATES files.
pub const DUPLICATES_DIR: &str = "Duplicates";

/// Where a colliding file ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Move to this free path.
    MoveTo(PathBuf),
    /// Overwrite whatever is at this path.
    Replace(PathBuf),
    /// Leave the file where it is.
    Skip,
}

impl Resolution {
    /// The path the file occupies after the resolution is applied.
    pub fn final_path<'a>(&'a self, source: &'a Path) -> &'a Path {
        match self {
            Resolution::MoveTo(path) | Resolution::Replace(path) => path,
            Resolution::Skip => source,
        }
    }
}

/// Applies a [`DuplicateStrategy`] to colliding destinations.
#[derive(Debug, Clone)]
pub struct DuplicateResolver {
    strategy: DuplicateStrategy,
    duplicates_dir: PathBuf,
    max_attempts: usize,
}

impl DuplicateResolver {
    pub fn new(strategy: DuplicateStrategy, target: &Path) -> Self {
        Self {
            strategy,
            duplicates_dir: target.join(DUPLICATES_DIR),
            max_attempts: MAX_RENAME_ATTEMPTS,
        }
    }

    /// Overrides the numbered-name attempt cap.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn strategy(&self) -> DuplicateStrategy {
        self.strategy
    }

    /// Decides the final location for a file whose `destination` is taken.
    pub fn resolve<F>(&self, destination: &Path, is_taken: F) -> OrganizeResult<Resolution>
    where
        F: Fn(&Path) -> bool,
    {
        let resolution = match self.strategy {
            DuplicateStrategy::Rename => {
                Resolution::MoveTo(self.free_name(destination, &is_taken)?)
            }
            DuplicateStrategy::Skip => Resolution::Skip,
            DuplicateStrategy::Replace => Resolution::Replace(destination.to_path_buf()),
            DuplicateStrategy::MergeToDuplicates => {
                let file_name =
                    destination
                        .file_name()
                        .ok_or_else(|| OrganizeError::CollisionExhausted {
                            path: destination.to_path_buf(),
                            attempts: 0,
                        })?;
                let candidate = self.duplicates_dir.join(file_name);
                if is_taken(&candidate) {
                    Resolution::MoveTo(self.free_name(&candidate, &is_taken)?)
                } else {
                    Resolution::MoveTo(candidate)
                }
            }
        };

        debug!(
            destination = %destination.display(),
            ?resolution,
            "Resolved name collision"
        );
        Ok(resolution)
    }

    /// Finds `name_N.ext` for the first free N, then a timestamped name.
    fn free_name<F>(&self, destination: &Path, is_taken: &F) -> OrganizeResult<PathBuf>
    where
        F: Fn(&Path) -> bool,
    {
        let exhausted = || OrganizeError::CollisionExhausted {
            path: destination.to_path_buf(),
            attempts: self.max_attempts,
        };

        let stem = destination
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(exhausted)?;
        let extension = destination
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let parent = destination.parent().unwrap_or_else(|| Path::new(""));

        for i in 1..=self.max_attempts {
            let candidate = parent.join(format!("{}_{}{}", stem, i, extension));
            if !is_taken(&candidate) {
                return Ok(candidate);
            }
        }

        let timestamp = Local::now().format("%Y%m%d-%H%M%S");
        let candidate = parent.join(format!("{}_{}{}", stem, timestamp, extension));
        if is_taken(&candidate) {
            return Err(exhausted());
        }
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    fn taken(paths: &[&str]) -> HashSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_rename_appends_first_free_suffix() {
        let resolver = DuplicateResolver::new(DuplicateStrategy::Rename, Path::new("/out"));
        let occupied = taken(&["/out/Documents/a.txt", "/out/Documents/a_1.txt"]);

        let resolution = resolver
            .resolve(Path::new("/out/Documents/a.txt"), |p| occupied.contains(p))
            .unwrap();
        assert_eq!(
            resolution,
            Resolution::MoveTo(PathBuf::from("/out/Documents/a_2.txt"))
        );
    }

    #[test]
    fn test_rename_without_extension() {
        let resolver = DuplicateResolver::new(DuplicateStrategy::Rename, Path::new("/out"));
        let resolution = resolver
            .resolve(Path::new("/out/NoExtension/README"), |p| {
                p == Path::new("/out/NoExtension/README")
            })
            .unwrap();
        assert_eq!(
            resolution,
            Resolution::MoveTo(PathBuf::from("/out/NoExtension/README_1"))
        );
    }

    #[test]
    fn test_rename_gives_distinct_paths_for_many_collisions() {
        let resolver = DuplicateResolver::new(DuplicateStrategy::Rename, Path::new("/out"));
        let claimed = RefCell::new(taken(&["/out/Images/photo.jpg"]));

        for _ in 0..25 {
            let resolution = resolver
                .resolve(Path::new("/out/Images/photo.jpg"), |p| {
                    claimed.borrow().contains(p)
                })
                .unwrap();
            let Resolution::MoveTo(path) = resolution else {
                panic!("rename must move");
            };
            assert!(claimed.borrow_mut().insert(path), "path handed out twice");
        }
        assert_eq!(claimed.borrow().len(), 26);
    }

    #[test]
    fn test_rename_falls_back_to_timestamp_after_cap() {
        let resolver =
            DuplicateResolver::new(DuplicateStrategy::Rename, Path::new("/out")).with_max_attempts(2);
        let occupied = taken(&["/out/a.txt", "/out/a_1.txt", "/out/a_2.txt"]);

        let Resolution::MoveTo(path) = resolver
            .resolve(Path::new("/out/a.txt"), |p| occupied.contains(p))
            .unwrap()
        else {
            panic!("rename must move");
        };
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("a_2"), "{name}");
        assert!(name.ends_with(".txt"));
        assert!(!occupied.contains(&path));
        assert_eq!(name.len(), "a_YYYYMMDD-HHMMSS.txt".len());
    }

    #[test]
    fn test_rename_exhausted_when_everything_is_taken() {
        let resolver =
            DuplicateResolver::new(DuplicateStrategy::Rename, Path::new("/out")).with_max_attempts(5);
        let result = resolver.resolve(Path::new("/out/a.txt"), |_| true);
        assert!(matches!(
            result,
            Err(OrganizeError::CollisionExhausted { attempts: 5, .. })
        ));
    }

    #[test]
    fn test_skip_keeps_source() {
        let resolver = DuplicateResolver::new(DuplicateStrategy::Skip, Path::new("/out"));
        let resolution = resolver.resolve(Path::new("/out/a.txt"), |_| true).unwrap();
        assert_eq!(resolution, Resolution::Skip);
        assert_eq!(
            resolution.final_path(Path::new("/src/a.txt")),
            Path::new("/src/a.txt")
        );
    }

    #[test]
    fn test_replace_keeps_destination() {
        let resolver = DuplicateResolver::new(DuplicateStrategy::Replace, Path::new("/out"));
        let resolution = resolver.resolve(Path::new("/out/a.txt"), |_| true).unwrap();
        assert_eq!(resolution, Resolution::Replace(PathBuf::from("/out/a.txt")));
    }

    #[test]
    fn test_merge_goes_to_duplicates_folder() {
        let resolver =
            DuplicateResolver::new(DuplicateStrategy::MergeToDuplicates, Path::new("/out"));
        let occupied = taken(&["/out/Images/cat.png"]);

        let resolution = resolver
            .resolve(Path::new("/out/Images/cat.png"), |p| occupied.contains(p))
            .unwrap();
        assert_eq!(
            resolution,
            Resolution::MoveTo(PathBuf::from("/out/Duplicates/cat.png"))
        );
    }

    #[test]
    fn test_merge_renames_inside_duplicates_folder() {
        let resolver =
            DuplicateResolver::new(DuplicateStrategy::MergeToDuplicates, Path::new("/out"));
        let occupied = taken(&["/out/Images/cat.png", "/out/Duplicates/cat.png"]);

        let resolution = resolver
            .resolve(Path::new("/out/Images/cat.png"), |p| occupied.contains(p))
            .unwrap();
        assert_eq!(
            resolution,
            Resolution::MoveTo(PathBuf::from("/out/Duplicates/cat_1.png"))
        );
    }
}
