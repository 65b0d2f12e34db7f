//! Indexer-specific staging (spec §4.5 "Indexer specifics"). Grounded on
//! `isIndex.c`'s `isIndexImages`: a scratch directory, symlinks to the
//! input file(s), and a small shell wrapper invoking the real indexer
//! binary with its json/progress file descriptors passed as arguments.

use is_domain::error::{IsError, Result};
use std::io::Write;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};

pub struct IndexerStaging {
    pub dir: PathBuf,
    pub wrapper_script: PathBuf,
}

/// Create a temporary working directory, symlink `inputs` into it by their
/// basename, and write an executable wrapper script that forwards to
/// `indexer_bin` with the json/progress fd numbers as trailing arguments.
pub fn stage(indexer_bin: &str, inputs: &[&str], json_fd: i32, progress_fd: i32) -> Result<IndexerStaging> {
    let dir = std::env::temp_dir().join(format!("isIndex-{}", std::process::id()));
    std::fs::create_dir_all(&dir)
        .map_err(|e| IsError::SubprocessLaunchError(format!("mkdtemp equivalent failed: {e}")))?;

    for input in inputs {
        let name = Path::new(input)
            .file_name()
            .ok_or_else(|| IsError::BadRequest(format!("input path has no file name: {input}")))?;
        let link = dir.join(name);
        symlink(input, &link)
            .map_err(|e| IsError::SubprocessLaunchError(format!("symlink {input} failed: {e}")))?;
    }

    let wrapper_script = dir.join("indexing_script.sh");
    let mut f = std::fs::File::create(&wrapper_script)
        .map_err(|e| IsError::SubprocessLaunchError(format!("create wrapper script failed: {e}")))?;
    writeln!(f, "#!/bin/sh")
        .and_then(|_| writeln!(f, "exec {indexer_bin} {json_fd} {progress_fd}"))
        .map_err(|e| IsError::SubprocessLaunchError(format!("write wrapper script failed: {e}")))?;

    let mut perms = f
        .metadata()
        .map_err(|e| IsError::SubprocessLaunchError(e.to_string()))?
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&wrapper_script, perms)
        .map_err(|e| IsError::SubprocessLaunchError(format!("chmod wrapper script failed: {e}")))?;

    Ok(IndexerStaging { dir, wrapper_script })
}
