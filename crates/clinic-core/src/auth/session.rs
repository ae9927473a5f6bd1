use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::store::{TokenKind, TokenStore};

/// Token file name in cache directory
const TOKEN_FILE: &str = "tokens.json";

/// On-disk layout of the token file. Field names match the persisted keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredTokens {
    #[serde(rename = "accessToken", default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(rename = "refreshToken", default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl StoredTokens {
    fn slot(&mut self, kind: TokenKind) -> &mut Option<String> {
        match kind {
            TokenKind::Access => &mut self.access_token,
            TokenKind::Refresh => &mut self.refresh_token,
        }
    }

    fn value(&self, kind: TokenKind) -> Option<&String> {
        match kind {
            TokenKind::Access => self.access_token.as_ref(),
            TokenKind::Refresh => self.refresh_token.as_ref(),
        }
    }
}

/// Token store persisted as a JSON file in the cache directory.
///
/// Every read goes back to disk so that tokens written by another process
/// (e.g. a second `clinic` invocation) are picked up.
pub struct FileTokenStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            path: cache_dir.as_ref().join(TOKEN_FILE),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StoredTokens> {
        if !self.path.exists() {
            return Ok(StoredTokens::default());
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read token file")?;
        serde_json::from_str(&contents).context("Failed to parse token file")
    }

    /// Write to a sibling temp file created `0600`, then rename it over the
    /// token file so readers never observe a partial or world-readable file.
    fn save(&self, tokens: &StoredTokens) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(tokens)?;

        let tmp_path = self.tmp_path();
        // A stale temp file would keep its old mode through `truncate`
        let _ = std::fs::remove_file(&tmp_path);
        let written = write_private(&tmp_path, contents.as_bytes())
            .and_then(|()| {
                std::fs::rename(&tmp_path, &self.path).context("Failed to replace token file")
            });
        if written.is_err() {
            let _ = std::fs::remove_file(&tmp_path);
        }
        written
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".tmp.{}", std::process::id()));
        PathBuf::from(name)
    }

    fn remove(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove token file")?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .context("Failed to create token file")?;
    file.write_all(contents).context("Failed to write token file")?;
    file.sync_all().context("Failed to flush token file")?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    std::fs::write(path, contents).context("Failed to write token file")
}

impl TokenStore for FileTokenStore {
    fn store(&self, kind: TokenKind, value: &str) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut tokens = self.load().unwrap_or_else(|e| {
            warn!(error = %e, "Discarding unreadable token file");
            StoredTokens::default()
        });
        *tokens.slot(kind) = Some(value.to_string());
        if let Err(e) = self.save(&tokens) {
            warn!(error = %e, token = %kind, "Failed to persist token");
        }
    }

    fn get(&self, kind: TokenKind) -> Option<String> {
        match self.load() {
            Ok(tokens) => tokens.value(kind).cloned(),
            Err(e) => {
                warn!(error = %e, "Failed to load token file");
                None
            }
        }
    }

    fn clear(&self) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = self.remove() {
            warn!(error = %e, "Failed to clear token file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cache_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "clinic-core-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = temp_cache_dir("round-trip");
        let store = FileTokenStore::new(&dir);
        assert_eq!(store.get(TokenKind::Access), None);

        store.store(TokenKind::Access, "A1");
        store.store(TokenKind::Refresh, "R1");

        // A fresh handle on the same directory sees the persisted values
        let reopened = FileTokenStore::new(&dir);
        assert_eq!(reopened.get(TokenKind::Access).as_deref(), Some("A1"));
        assert_eq!(reopened.get(TokenKind::Refresh).as_deref(), Some("R1"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_layout_uses_persisted_keys() {
        let dir = temp_cache_dir("layout");
        let store = FileTokenStore::new(&dir);
        store.store(TokenKind::Access, "A1");

        let raw = std::fs::read_to_string(store.path()).expect("token file written");
        let json: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
        assert_eq!(json["accessToken"], "A1");
        assert!(json.get("refreshToken").is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_store_clear_twice() {
        let dir = temp_cache_dir("clear");
        let store = FileTokenStore::new(&dir);
        store.store(TokenKind::Access, "A1");
        store.store(TokenKind::Refresh, "R1");

        store.clear();
        store.clear();
        assert_eq!(store.get(TokenKind::Access), None);
        assert_eq!(store.get(TokenKind::Refresh), None);
        assert!(!store.path().exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = temp_cache_dir("no-temp");
        let store = FileTokenStore::new(&dir);
        store.store(TokenKind::Access, "A1");
        store.store(TokenKind::Refresh, "R1");

        let entries: Vec<_> = std::fs::read_dir(&dir)
            .expect("read dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec![TOKEN_FILE.to_string()]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = temp_cache_dir("private");
        let store = FileTokenStore::new(&dir);
        store.store(TokenKind::Access, "A1");

        let mode = std::fs::metadata(store.path())
            .expect("token file metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);

        // A leftover world-readable file is replaced, not reused
        std::fs::set_permissions(store.path(), std::fs::Permissions::from_mode(0o644))
            .expect("loosen permissions");
        store.store(TokenKind::Refresh, "R1");
        let mode = std::fs::metadata(store.path()).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.get(TokenKind::Access).as_deref(), Some("A1"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_corrupt_file_reads_as_absent() {
        let dir = temp_cache_dir("corrupt");
        std::fs::create_dir_all(&dir).expect("create dir");
        let store = FileTokenStore::new(&dir);
        std::fs::write(store.path(), "not json").expect("write");

        assert_eq!(store.get(TokenKind::Access), None);

        // Writing over a corrupt file starts from an empty token set
        store.store(TokenKind::Refresh, "R1");
        assert_eq!(store.get(TokenKind::Refresh).as_deref(), Some("R1"));
        assert_eq!(store.get(TokenKind::Access), None);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
