//! Content hashing for duplicate analysis.
//!
//! Files are first grouped by size; only files that share a size are read
//! and hashed with xxHash3. Empty files are ignored.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use xxhash_rust::xxh3::Xxh3;

/// Read buffer size for hashing.
const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Computes the xxHash3 of a whole file, streaming it in chunks.
pub fn file_hash(path: &Path) -> io::Result<u64> {
    let mut file = File::open(path)?;
    let mut hasher = Xxh3::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    let hash = hasher.digest();
    trace!(?path, hash, "Computed file hash");
    Ok(hash)
}

/// Groups files with identical content.
///
/// `files` pairs each path with its size. Only groups of two or more are
/// returned, each sorted by path, and the groups are ordered by their first path.
/// Files that cannot be read are left out.
pub fn find_duplicate_groups(files: &[(PathBuf, u64)]) -> Vec<Vec<PathBuf>> {
    let mut by_size: HashMap<u64, Vec<&Path>> = HashMap::new();
    for (path, size) in files {
        if *size > 0 {
            by_size.entry(*size).or_default().push(path);
        }
    }

    let mut by_hash: HashMap<(u64, u64), Vec<PathBuf>> = HashMap::new();
    for (size, paths) in by_size.into_iter().filter(|(_, paths)| paths.len() > 1) {
        for path in paths {
            match file_hash(path) {
                Ok(hash) => by_hash.entry((size, hash)).or_default().push(path.to_path_buf()),
                Err(e) => debug!(path = %path.display(), error = %e, "Could not hash file"),
            }
        }
    }

    let groups: BTreeMap<PathBuf, Vec<PathBuf>> = by_hash
        .into_values()
        .filter(|group| group.len() > 1)
        .map(|mut group| {
            group.sort();
            (group[0].clone(), group)
        })
        .collect();
    groups.into_values().collect()
}
