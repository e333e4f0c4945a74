use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A configuration file in a temporary directory, removed on drop.
pub struct ConfigFixture {
    _dir: TempDir,
    path: PathBuf,
}

impl ConfigFixture {
    pub fn new(yaml: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, yaml).unwrap();

        Self { _dir: dir, path }
    }

    pub fn path(&self) -> PathBuf {
        self.path.clone()
    }
}

/// A path that no configuration file lives at.
#[allow(dead_code)]
pub fn missing_config() -> PathBuf {
    PathBuf::from("/definitely/not/a/keel/config.yaml")
}

/// An in-memory log output that the test keeps a handle to.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

#[allow(dead_code)]
impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    /// Counts the captured lines containing the given text.
    pub fn lines_with(&self, needle: &str) -> usize {
        self.contents()
            .lines()
            .filter(|line| line.contains(needle))
            .count()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
