//! Take-off file discovery.
//!
//! Take-offs live at `.../{job}/{file}.xml`. The job id comes from the parent
//! directory name only; document content never supplies it. A file placed
//! directly in the walked root takes the root directory's own name as its job.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use framecount_takeoff::job_path;
use framecount_takeoff::FrameError;

/// A take-off file read from disk, not yet parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TakeoffDocument {
    pub path: PathBuf,
    pub job_id: String,
    pub file_name: String,
    pub text: String,
}

/// A path that was found but could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPath {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub documents: Vec<TakeoffDocument>,
    pub skipped: Vec<SkippedPath>,
}

pub fn is_takeoff_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xml"))
}

/// Walk `root` and read every take-off file, in path order.
pub fn discover(root: &Path) -> Result<Discovery, FrameError> {
    if !root.is_dir() {
        return Err(FrameError::Io(format!("{}: not a directory", root.display())));
    }

    // Absolute so a root of "." still has a named directory above its files
    let root = root
        .canonicalize()
        .map_err(|e| FrameError::Io(format!("{}: {e}", root.display())))?;

    let mut discovery = Discovery::default();

    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                discovery.skipped.push(SkippedPath {
                    path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone()),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_takeoff_file(entry.path()) {
            continue;
        }

        let path = entry.into_path();
        let Some((job_id, file_name)) = job_path(&path.to_string_lossy()) else {
            discovery.skipped.push(SkippedPath {
                path,
                reason: "no parent directory to take a job id from".into(),
            });
            continue;
        };

        match crate::csv::read_file_as_utf8(&path) {
            Ok(text) => discovery.documents.push(TakeoffDocument {
                path,
                job_id,
                file_name,
                text,
            }),
            Err(e) => discovery.skipped.push(SkippedPath {
                path,
                reason: e.to_string(),
            }),
        }
    }

    Ok(discovery)
}
