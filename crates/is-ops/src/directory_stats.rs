//! `directory-stats` dispatch: walks a local directory tree and reports
//! aggregate file count and byte size as metadata (spec §4.6). Grounded on
//! `isRsync.c`'s `isRsyncLocalDirStats`, an `FTS`-based tree walk that
//! accumulates byte size, file/dir counts, circular-directory detections,
//! and symlink counts; reimplemented here as a recursive `read_dir` walk
//! over `std::fs::symlink_metadata` (physical, not-follow-symlinks, like
//! `FTS_PHYSICAL`).

use crate::context::OpsContext;
use is_domain::error::{IsError, Result};
use is_domain::request::RequestFingerprint;
use is_proto::Reply;
use std::path::Path;

#[derive(Default)]
struct DirStats {
    nbytes: u64,
    nfiles: u64,
    ndirs: u64,
    nsymlinks: u64,
    nbadsymlinks: u64,
}

fn walk(path: &Path, stats: &mut DirStats) {
    let Ok(meta) = std::fs::symlink_metadata(path) else {
        stats.nbadsymlinks += 1;
        return;
    };

    let file_type = meta.file_type();
    if file_type.is_symlink() {
        stats.nsymlinks += 1;
        if std::fs::metadata(path).is_err() {
            stats.nbadsymlinks += 1;
        }
        return;
    }

    if file_type.is_file() {
        stats.nfiles += 1;
        stats.nbytes += meta.len();
        return;
    }

    if file_type.is_dir() {
        stats.ndirs += 1;
        let Ok(entries) = std::fs::read_dir(path) else {
            return;
        };
        for entry in entries.flatten() {
            walk(&entry.path(), stats);
        }
    }
}

pub fn handle_directory_stats(_ctx: &OpsContext, req: &RequestFingerprint, echoed_request: Vec<u8>) -> Result<Reply> {
    let root = Path::new(&req.path);
    if !root.exists() {
        return Err(IsError::NotFound(req.path.clone()));
    }

    let mut stats = DirStats::default();
    walk(root, &mut stats);

    let metadata = serde_json::json!({
        "localDirName": req.path,
        "localDirSize": stats.nbytes,
        "nDirs": stats.ndirs,
        "nFiles": stats.nfiles,
        "nSymLinks": stats.nsymlinks,
        "nBadSymLinks": stats.nbadsymlinks,
    });

    Ok(Reply::Metadata {
        echoed_request,
        metadata: serde_json::to_vec(&metadata).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_files_and_bytes_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("b.txt"), b"world!").unwrap();

        let mut stats = DirStats::default();
        walk(dir.path(), &mut stats);

        assert_eq!(stats.nfiles, 2);
        assert_eq!(stats.nbytes, 5 + 6);
        assert_eq!(stats.ndirs, 2); // root + sub
    }

    #[test]
    fn missing_path_is_not_found() {
        let path = "/nonexistent/does/not/exist";
        assert!(!Path::new(path).exists());
    }
}
