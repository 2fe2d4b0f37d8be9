// Per-problem working directories and source materialization

use crate::error::EvaluationError;
use std::io;
use std::path::Path;
use tempfile::TempDir;
use tracing::debug;

/// Scoped working directory for a single problem evaluation
///
/// The directory is removed when this guard is dropped, on every exit path.
/// `close` does the same but surfaces a failed removal to the caller.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn allocate() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("proq-eval-").tempdir()?;
        debug!(path = %dir.path().display(), "Allocated working directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}

/// Write `source` to `path`, truncating any previous variant
pub async fn materialize(source: &str, path: &Path) -> Result<(), EvaluationError> {
    tokio::fs::write(path, source)
        .await
        .map_err(|source| EvaluationError::Materialize {
            path: path.to_path_buf(),
            source,
        })
}
