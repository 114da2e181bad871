// store.rs — Persistence for the routing table.
//
// The authoritative table lives outside this process. Stores only load and
// save whole tables; `RouteManager` re-reads before every mutation so no
// caller ever works from a stale local copy.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::RouteError;
use crate::table::RoutingTable;

pub trait RoutingStore {
    fn load(&self) -> Result<RoutingTable, RouteError>;
    fn save(&self, table: &RoutingTable) -> Result<(), RouteError>;
}

/// In-process store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryRoutingStore {
    table: Mutex<RoutingTable>,
}

impl MemoryRoutingStore {
    pub fn new(table: RoutingTable) -> Self {
        Self {
            table: Mutex::new(table),
        }
    }
}

impl RoutingStore for MemoryRoutingStore {
    fn load(&self) -> Result<RoutingTable, RouteError> {
        self.table
            .lock()
            .map(|t| t.clone())
            .map_err(|_| RouteError::transport("load_routes", "store lock poisoned"))
    }

    fn save(&self, table: &RoutingTable) -> Result<(), RouteError> {
        let mut current = self
            .table
            .lock()
            .map_err(|_| RouteError::transport("save_routes", "store lock poisoned"))?;
        *current = table.clone();
        Ok(())
    }
}

/// The table as a single JSON file, replaced by persisting a staged temp file.
#[derive(Debug, Clone)]
pub struct FileRoutingStore {
    path: PathBuf,
}

impl FileRoutingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RoutingStore for FileRoutingStore {
    /// A missing file is an empty table.
    fn load(&self) -> Result<RoutingTable, RouteError> {
        if !self.path.exists() {
            return Ok(RoutingTable::new());
        }
        let data = fs::read_to_string(&self.path).map_err(|source| RouteError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&self, table: &RoutingTable) -> Result<(), RouteError> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|source| RouteError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
        let json = serde_json::to_string_pretty(table)?;
        let mut staging =
            tempfile::NamedTempFile::new_in(parent).map_err(|source| RouteError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        staging
            .write_all(json.as_bytes())
            .map_err(|source| RouteError::Io {
                path: staging.path().to_path_buf(),
                source,
            })?;
        staging.persist(&self.path).map_err(|e| RouteError::Io {
            path: self.path.clone(),
            source: e.error,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{RouteBinding, RouteKey};
    use crate::protocol::Protocol;

    fn sample() -> RoutingTable {
        let mut table = RoutingTable::new();
        table
            .register(
                RouteKey::new("docs", "search"),
                RouteBinding::new(Protocol::Approval, "appr-1", "https://gov.example/approval"),
            )
            .unwrap();
        table
    }

    #[test]
    fn missing_file_loads_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRoutingStore::new(dir.path().join("routes.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRoutingStore::new(dir.path().join("state").join("routes.json"));
        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), sample());
        let entries: Vec<_> = fs::read_dir(dir.path().join("state"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("routes.json")]);
    }

    #[test]
    fn corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            FileRoutingStore::new(&path).load(),
            Err(RouteError::Serialization(_))
        ));
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryRoutingStore::default();
        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), sample());
    }
}
