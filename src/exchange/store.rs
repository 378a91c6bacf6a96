use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use tracing::{instrument, trace};

/// Where the snapshot, query and response artifacts live.
///
/// Writes overwrite whatever was there before. `clear_response` must succeed when there is
/// no response yet, and `read_response` reports a missing response as
/// [`io::ErrorKind::NotFound`].
pub trait ExchangeStore {
    fn write_snapshot(&mut self, text: &str) -> io::Result<()>;
    fn write_query(&mut self, text: &str) -> io::Result<()>;
    fn clear_response(&mut self) -> io::Result<()>;
    fn read_response(&self) -> io::Result<String>;
    fn read_snapshot(&self) -> io::Result<String>;
}

/// Artifacts stored as files in one directory, as the external programs expect them.
#[derive(Debug, Clone)]
pub struct FileExchangeStore {
    dir: PathBuf,
}

impl FileExchangeStore {
    pub const SNAPSHOT_FILE: &'static str = "current_state.txt";
    pub const QUERY_FILE: &'static str = "move_query.txt";
    pub const RESPONSE_FILE: &'static str = "move_response.txt";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates the directory if needed and removes artifacts left by a previous run.
    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    pub fn prepare(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        for path in [self.snapshot_path(), self.query_path(), self.response_path()] {
            remove_if_exists(&path)?;
        }
        trace!("exchange directory ready");
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(Self::SNAPSHOT_FILE)
    }

    pub fn query_path(&self) -> PathBuf {
        self.dir.join(Self::QUERY_FILE)
    }

    pub fn response_path(&self) -> PathBuf {
        self.dir.join(Self::RESPONSE_FILE)
    }

    pub fn read_query(&self) -> io::Result<String> {
        fs::read_to_string(self.query_path())
    }
}

impl ExchangeStore for FileExchangeStore {
    fn write_snapshot(&mut self, text: &str) -> io::Result<()> {
        fs::write(self.snapshot_path(), text)
    }

    fn write_query(&mut self, text: &str) -> io::Result<()> {
        fs::write(self.query_path(), text)
    }

    fn clear_response(&mut self) -> io::Result<()> {
        remove_if_exists(&self.response_path())
    }

    fn read_response(&self) -> io::Result<String> {
        fs::read_to_string(self.response_path())
    }

    fn read_snapshot(&self) -> io::Result<String> {
        fs::read_to_string(self.snapshot_path())
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        res => res,
    }
}

#[derive(Debug, Default)]
struct MemoryArtifacts {
    snapshot: Option<String>,
    query: Option<String>,
    response: Option<String>,
}

/// In-memory artifacts.
///
/// Clones share the same artifacts, so a stand-in for an external process can hold a clone
/// and answer through [`MemoryExchangeStore::set_response`].
#[derive(Debug, Clone, Default)]
pub struct MemoryExchangeStore {
    artifacts: Arc<Mutex<MemoryArtifacts>>,
}

impl MemoryExchangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_response(&self, text: impl Into<String>) {
        self.lock().response = Some(text.into());
    }

    pub fn snapshot(&self) -> Option<String> {
        self.lock().snapshot.clone()
    }

    pub fn query(&self) -> Option<String> {
        self.lock().query.clone()
    }

    pub fn response(&self) -> Option<String> {
        self.lock().response.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryArtifacts> {
        // artifacts stay consistent even if a holder panicked
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ExchangeStore for MemoryExchangeStore {
    fn write_snapshot(&mut self, text: &str) -> io::Result<()> {
        self.lock().snapshot = Some(text.to_owned());
        Ok(())
    }

    fn write_query(&mut self, text: &str) -> io::Result<()> {
        self.lock().query = Some(text.to_owned());
        Ok(())
    }

    fn clear_response(&mut self) -> io::Result<()> {
        self.lock().response = None;
        Ok(())
    }

    fn read_response(&self) -> io::Result<String> {
        self.response()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no response"))
    }

    fn read_snapshot(&self) -> io::Result<String> {
        self.snapshot()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no snapshot"))
    }
}
