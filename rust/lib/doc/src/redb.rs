use std::path::Path;
use std::sync::Arc;

use linetrack_core::ServiceError;
use redb::{Database, ReadableTable, TableDefinition};

use crate::error::DocError;
use crate::traits::{DocStore, DocTxn};

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("docs");

fn doc_key(collection: &str, id: &str) -> String {
    format!("{}/{}", collection, id)
}

/// RedbStore is a DocStore backed by redb — a pure-Rust embedded database.
///
/// Documents live in a single table keyed `collection/id`. A `transact`
/// body runs against one redb write transaction; redb serializes writers,
/// so a body always observes the previous writer's committed state.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open(path: &Path) -> Result<Self, DocError> {
        let db = Database::create(path).map_err(|e| DocError::Storage(e.to_string()))?;

        // Ensure the table exists by doing a write transaction.
        let write_txn = db
            .begin_write()
            .map_err(|e| DocError::Storage(e.to_string()))?;
        {
            let _table = write_txn
                .open_table(TABLE)
                .map_err(|e| DocError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| DocError::Storage(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

struct RedbTxn<'t> {
    table: redb::Table<'t, &'static str, &'static [u8]>,
}

impl DocTxn for RedbTxn<'_> {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Vec<u8>>, DocError> {
        let key = doc_key(collection, id);
        match self.table.get(key.as_str()) {
            Ok(Some(val)) => Ok(Some(val.value().to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(DocError::Storage(e.to_string())),
        }
    }

    fn set(&mut self, collection: &str, id: &str, value: &[u8]) -> Result<(), DocError> {
        let key = doc_key(collection, id);
        self.table
            .insert(key.as_str(), value)
            .map_err(|e| DocError::Storage(e.to_string()))?;
        Ok(())
    }

    fn delete(&mut self, collection: &str, id: &str) -> Result<(), DocError> {
        let key = doc_key(collection, id);
        self.table
            .remove(key.as_str())
            .map_err(|e| DocError::Storage(e.to_string()))?;
        Ok(())
    }
}

impl DocStore for RedbStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Vec<u8>>, DocError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| DocError::Storage(e.to_string()))?;
        let table = read_txn
            .open_table(TABLE)
            .map_err(|e| DocError::Storage(e.to_string()))?;

        let key = doc_key(collection, id);
        match table.get(key.as_str()) {
            Ok(Some(val)) => Ok(Some(val.value().to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(DocError::Storage(e.to_string())),
        }
    }

    fn set(&self, collection: &str, id: &str, value: &[u8]) -> Result<(), DocError> {
        self.transact(&mut |txn| txn.set(collection, id, value).map_err(Into::into))
            .map_err(|e| DocError::Storage(e.to_string()))
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), DocError> {
        self.transact(&mut |txn| txn.delete(collection, id).map_err(Into::into))
            .map_err(|e| DocError::Storage(e.to_string()))
    }

    fn scan(&self, collection: &str) -> Result<Vec<(String, Vec<u8>)>, DocError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| DocError::Storage(e.to_string()))?;
        let table = read_txn
            .open_table(TABLE)
            .map_err(|e| DocError::Storage(e.to_string()))?;

        let prefix = format!("{}/", collection);
        let mut results = Vec::new();
        let iter = table
            .range(prefix.as_str()..)
            .map_err(|e| DocError::Storage(e.to_string()))?;

        for entry in iter {
            let entry = entry.map_err(|e| DocError::Storage(e.to_string()))?;
            let key = entry.0.value().to_string();
            if !key.starts_with(&prefix) {
                break;
            }
            let value = entry.1.value().to_vec();
            results.push((key[prefix.len()..].to_string(), value));
        }

        Ok(results)
    }

    fn transact(
        &self,
        body: &mut dyn FnMut(&mut dyn DocTxn) -> Result<(), ServiceError>,
    ) -> Result<(), ServiceError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        let result = (|| {
            let table = write_txn
                .open_table(TABLE)
                .map_err(|e| ServiceError::Storage(e.to_string()))?;
            let mut view = RedbTxn { table };
            body(&mut view)
        })();

        match result {
            Ok(()) => write_txn
                .commit()
                .map_err(|e| ServiceError::Storage(e.to_string())),
            Err(e) => {
                // Drop every staged write; the caller's error is what matters.
                tracing::debug!("aborting document transaction: {}", e);
                let _ = write_txn.abort();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, RedbStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(&dir.path().join("docs.redb")).unwrap();
        (dir, store)
    }

    #[test]
    fn set_get_delete_roundtrip() {
        let (_dir, store) = open_temp();
        store.set("units", "X1", b"a").unwrap();
        assert_eq!(store.get("units", "X1").unwrap(), Some(b"a".to_vec()));

        store.delete("units", "X1").unwrap();
        assert_eq!(store.get("units", "X1").unwrap(), None);
    }

    #[test]
    fn scan_is_ordered_and_collection_scoped() {
        let (_dir, store) = open_temp();
        store.set("units", "B", b"2").unwrap();
        store.set("units", "A", b"1").unwrap();
        store.set("zones", "1", b"z").unwrap();

        let docs = store.scan("units").unwrap();
        let ids: Vec<&str> = docs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn transact_commits_across_collections() {
        let (_dir, store) = open_temp();
        store
            .transact(&mut |txn| {
                txn.set("units", "X1", b"a")?;
                txn.set("zones", "5", b"z")?;
                Ok(())
            })
            .unwrap();

        assert_eq!(store.get("units", "X1").unwrap(), Some(b"a".to_vec()));
        assert_eq!(store.get("zones", "5").unwrap(), Some(b"z".to_vec()));
    }

    #[test]
    fn transact_error_aborts_cleanly() {
        let (_dir, store) = open_temp();
        store.set("units", "X1", b"old").unwrap();

        let result = store.transact(&mut |txn| {
            txn.set("units", "X1", b"new")?;
            Err(ServiceError::Validation("abort".into()))
        });

        assert!(result.is_err());
        assert_eq!(store.get("units", "X1").unwrap(), Some(b"old".to_vec()));
    }

    #[test]
    fn reopen_preserves_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            store.set("units", "X1", b"a").unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.get("units", "X1").unwrap(), Some(b"a".to_vec()));
    }
}
