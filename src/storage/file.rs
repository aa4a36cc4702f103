use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::debug;

use super::{apply_to_map, Mutation, StorageBackend, StorageError};

const FILE_NAME: &str = "credentials.json";

/// JSON-file storage. The whole map is rewritten on every batch via a temp file and an
/// atomic rename, so a crash mid-write leaves the previous file intact.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    map: RwLock<HashMap<String, String>>,
}

impl FileBackend {
    /// Open (or lazily create) `<dir>/credentials.json`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(FILE_NAME);
        let map = if path.exists() {
            let bytes = std::fs::read(&path)?;
            if bytes.iter().all(|b| b.is_ascii_whitespace()) {
                HashMap::new()
            } else {
                serde_json::from_slice::<HashMap<String, String>>(&bytes)?
            }
        } else {
            HashMap::new()
        };
        debug!(target: "careway::storage", "opened {} ({} keys)", path.display(), map.len());
        Ok(Self { path, map: RwLock::new(map) })
    }

    pub fn path(&self) -> &Path { &self.path }

    fn persist(&self, map: &HashMap<String, String>) -> Result<(), StorageError> {
        // sorted for stable diffs
        let sorted: BTreeMap<&String, &String> = map.iter().collect();
        let bytes = serde_json::to_vec_pretty(&sorted)?;
        let tmp = self.path.with_extension("json.tmp");
        write_private(&tmp, &bytes)?;
        std::fs::rename(tmp, &self.path)?;
        Ok(())
    }
}

/// Write `bytes` to `path`, readable by the owner only where the platform supports it.
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut opts = std::fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        opts.mode(0o600);
        let mut file = opts.open(path)?;
        // mode only applies on create; a leftover temp file keeps its old bits
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        file.write_all(bytes)?;
        file.sync_all()
    }
    #[cfg(not(unix))]
    {
        let mut file = opts.open(path)?;
        file.write_all(bytes)?;
        file.sync_all()
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, keys: &[&str]) -> Vec<Option<String>> {
        let r = self.map.read();
        keys.iter().map(|k| r.get(*k).cloned()).collect()
    }

    fn apply(&self, batch: &[Mutation]) -> Result<(), StorageError> {
        // Hold the write lock across persist so batches hit disk in lock order.
        let mut w = self.map.write();
        let mut next = w.clone();
        apply_to_map(&mut next, batch);
        self.persist(&next)?;
        *w = next;
        Ok(())
    }
}
