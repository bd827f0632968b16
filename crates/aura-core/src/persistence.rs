use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::state::AppState;

pub const SNAPSHOT_VERSION: u8 = 1;
const SNAPSHOT_FILE: &str = "state.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    pub version: u8,
    pub saved_at_ms: i64,
    pub state: AppState,
}

/// Saves and restores the durable snapshot between sessions.
#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl SnapshotStore {
    pub fn open(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(SNAPSHOT_FILE);
        let tmp_path = dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        Ok(Self { path, tmp_path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> std::io::Result<Option<AppState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&self.path)?;
        let snapshot = serde_json::from_slice::<PersistedSnapshot>(&bytes)
            .map_err(|err| std::io::Error::other(format!("parse snapshot: {err}")))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(std::io::Error::other(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        debug!(path = %self.path.display(), "loaded snapshot");
        Ok(Some(snapshot.state))
    }

    /// Writes to a temp file first so a crash never leaves a torn snapshot.
    pub fn save(&self, state: &AppState) -> std::io::Result<()> {
        let snapshot = PersistedSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at_ms: chrono::Utc::now().timestamp_millis(),
            state: state.clone(),
        };
        let encoded = serde_json::to_vec_pretty(&snapshot)
            .map_err(|err| std::io::Error::other(format!("serialize snapshot: {err}")))?;
        write_private(&self.tmp_path, &encoded)?;
        std::fs::rename(&self.tmp_path, &self.path)
    }
}

fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut opts = OpenOptions::new();
    opts.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut file = opts.open(path)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_all()
}
