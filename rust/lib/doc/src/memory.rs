use std::collections::BTreeMap;
use std::sync::RwLock;

use linetrack_core::ServiceError;

use crate::error::DocError;
use crate::traits::{DocStore, DocTxn};

fn doc_key(collection: &str, id: &str) -> String {
    format!("{}/{}", collection, id)
}

/// MemoryStore is a DocStore backed by an in-process ordered map.
///
/// Used by tests and by callers that do not need persistence. Transactions
/// stage their writes in an overlay and apply them under the write lock
/// only on commit, so a failed body leaves the map untouched. Holding the
/// write lock for the duration of a transaction serializes writers, which
/// is all the isolation the DocStore contract asks for.
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Transaction view: reads fall through the staged overlay to the base
/// map; writes only touch the overlay.
struct MemoryTxn<'a> {
    base: &'a BTreeMap<String, Vec<u8>>,
    // None marks a staged deletion.
    staged: BTreeMap<String, Option<Vec<u8>>>,
}

impl DocTxn for MemoryTxn<'_> {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Vec<u8>>, DocError> {
        let key = doc_key(collection, id);
        match self.staged.get(&key) {
            Some(staged) => Ok(staged.clone()),
            None => Ok(self.base.get(&key).cloned()),
        }
    }

    fn set(&mut self, collection: &str, id: &str, value: &[u8]) -> Result<(), DocError> {
        self.staged.insert(doc_key(collection, id), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, collection: &str, id: &str) -> Result<(), DocError> {
        self.staged.insert(doc_key(collection, id), None);
        Ok(())
    }
}

impl DocStore for MemoryStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Vec<u8>>, DocError> {
        let values = self
            .values
            .read()
            .map_err(|e| DocError::Storage(e.to_string()))?;
        Ok(values.get(&doc_key(collection, id)).cloned())
    }

    fn set(&self, collection: &str, id: &str, value: &[u8]) -> Result<(), DocError> {
        let mut values = self
            .values
            .write()
            .map_err(|e| DocError::Storage(e.to_string()))?;
        values.insert(doc_key(collection, id), value.to_vec());
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), DocError> {
        let mut values = self
            .values
            .write()
            .map_err(|e| DocError::Storage(e.to_string()))?;
        values.remove(&doc_key(collection, id));
        Ok(())
    }

    fn scan(&self, collection: &str) -> Result<Vec<(String, Vec<u8>)>, DocError> {
        let values = self
            .values
            .read()
            .map_err(|e| DocError::Storage(e.to_string()))?;
        let prefix = format!("{}/", collection);
        Ok(values
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, v)| (k[prefix.len()..].to_string(), v.clone()))
            .collect())
    }

    fn transact(
        &self,
        body: &mut dyn FnMut(&mut dyn DocTxn) -> Result<(), ServiceError>,
    ) -> Result<(), ServiceError> {
        let mut values = self
            .values
            .write()
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        let mut txn = MemoryTxn {
            base: &*values,
            staged: BTreeMap::new(),
        };
        body(&mut txn)?;

        let staged = txn.staged;
        for (key, value) in staged {
            match value {
                Some(v) => {
                    values.insert(key, v);
                }
                None => {
                    values.remove(&key);
                }
            }
        }
        Ok(())
    }
}
