use std::path::Path;

use redb::{
    Database, MultimapTableDefinition, ReadableMultimapTable, ReadableTable, TableDefinition,
    WriteTransaction,
};
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::{CanonicalThread, Document};
use crate::{ThreadStore, WriteSession};

const THREADS: TableDefinition<u128, &[u8]> = TableDefinition::new("threads");
const DOCUMENTS: TableDefinition<u128, &[u8]> = TableDefinition::new("documents");
const FILE_NAME_INDEX: TableDefinition<&str, u128> = TableDefinition::new("file_name_index");
const THREADS_BY_LENGTH: MultimapTableDefinition<u32, u128> =
    MultimapTableDefinition::new("threads_by_length");
const DOCS_BY_CANO_ID: MultimapTableDefinition<u128, u128> =
    MultimapTableDefinition::new("docs_by_cano_id");
const CHILDREN_BY_PARENT: MultimapTableDefinition<u128, u128> =
    MultimapTableDefinition::new("children_by_parent");

/// Production backend built on the embedded `redb` key-value store. One
/// `redb::WriteTransaction` is the commit boundary for every unit of work
/// opened through [`RedbBackend::begin_write`].
pub struct RedbBackend {
    db: Database,
}

impl RedbBackend {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(StoreError::backend)?;
        let txn = db.begin_write().map_err(StoreError::backend)?;
        {
            txn.open_table(THREADS).map_err(StoreError::backend)?;
            txn.open_table(DOCUMENTS).map_err(StoreError::backend)?;
            txn.open_table(FILE_NAME_INDEX).map_err(StoreError::backend)?;
            txn.open_multimap_table(THREADS_BY_LENGTH).map_err(StoreError::backend)?;
            txn.open_multimap_table(DOCS_BY_CANO_ID).map_err(StoreError::backend)?;
            txn.open_multimap_table(CHILDREN_BY_PARENT).map_err(StoreError::backend)?;
        }
        txn.commit().map_err(StoreError::backend)?;
        Ok(Self { db })
    }

    fn sorted(mut rows: Vec<CanonicalThread>) -> Vec<CanonicalThread> {
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.cano_id.cmp(&b.cano_id)));
        rows
    }
}

impl ThreadStore for RedbBackend {
    fn begin_write(&self) -> Result<Box<dyn WriteSession + '_>, StoreError> {
        let txn = self.db.begin_write().map_err(StoreError::backend)?;
        Ok(Box::new(RedbSession { txn }))
    }

    fn get_cano_id_by_file_name(&self, name: &str) -> Result<Option<Uuid>, StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::backend)?;
        let file_index = txn.open_table(FILE_NAME_INDEX).map_err(StoreError::backend)?;
        let doc_id = match file_index.get(name).map_err(StoreError::backend)? {
            Some(guard) => guard.value(),
            None => return Ok(None),
        };
        let documents = txn.open_table(DOCUMENTS).map_err(StoreError::backend)?;
        let doc: Document = match documents.get(doc_id).map_err(StoreError::backend)? {
            Some(guard) => bincode::deserialize(guard.value())?,
            None => return Ok(None),
        };
        Ok(Some(doc.cano_id))
    }

    fn get_file_names_by_cano_id(&self, id: Uuid) -> Result<Vec<String>, StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::backend)?;
        let docs_by_cano = txn.open_multimap_table(DOCS_BY_CANO_ID).map_err(StoreError::backend)?;
        let documents = txn.open_table(DOCUMENTS).map_err(StoreError::backend)?;

        let mut names = Vec::new();
        for doc_id in docs_by_cano.get(id.as_u128()).map_err(StoreError::backend)? {
            let doc_id = doc_id.map_err(StoreError::backend)?.value();
            if let Some(guard) = documents.get(doc_id).map_err(StoreError::backend)? {
                let doc: Document = bincode::deserialize(guard.value())?;
                names.push(doc.file_name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn get_parent_id(&self, id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::backend)?;
        let threads = txn.open_table(THREADS).map_err(StoreError::backend)?;
        match threads.get(id.as_u128()).map_err(StoreError::backend)? {
            Some(guard) => {
                let t: CanonicalThread = bincode::deserialize(guard.value())?;
                Ok(t.parent_id)
            }
            None => Ok(None),
        }
    }

    fn get_children_ids(&self, id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::backend)?;
        let children_by_parent =
            txn.open_multimap_table(CHILDREN_BY_PARENT).map_err(StoreError::backend)?;
        let threads = txn.open_table(THREADS).map_err(StoreError::backend)?;

        let mut rows = Vec::new();
        for child_id in children_by_parent.get(id.as_u128()).map_err(StoreError::backend)? {
            let child_id = child_id.map_err(StoreError::backend)?.value();
            if let Some(guard) = threads.get(child_id).map_err(StoreError::backend)? {
                rows.push(bincode::deserialize::<CanonicalThread>(guard.value())?);
            }
        }
        Ok(Self::sorted(rows).into_iter().map(|t| t.cano_id).collect())
    }
}

/// One `redb::WriteTransaction` held open across every call a caller makes
/// through this session. Every table is reopened per method against `&self.txn`
/// (tables borrow the transaction, not consume it, so this is safe to do
/// repeatedly) and nothing is durable until [`WriteSession::commit`] runs.
struct RedbSession {
    txn: WriteTransaction,
}

impl WriteSession for RedbSession {
    fn find_candidates_by_length(&self, length: u32) -> Result<Vec<CanonicalThread>, StoreError> {
        let by_length =
            self.txn.open_multimap_table(THREADS_BY_LENGTH).map_err(StoreError::backend)?;
        let threads = self.txn.open_table(THREADS).map_err(StoreError::backend)?;

        let mut rows = Vec::new();
        for id in by_length.get(length).map_err(StoreError::backend)? {
            let id = id.map_err(StoreError::backend)?.value();
            if let Some(guard) = threads.get(id).map_err(StoreError::backend)? {
                rows.push(bincode::deserialize(guard.value())?);
            }
        }
        Ok(RedbBackend::sorted(rows))
    }

    fn find_orphan_candidates_by_length(
        &self,
        length: u32,
    ) -> Result<Vec<CanonicalThread>, StoreError> {
        let rows = self.find_candidates_by_length(length)?;
        Ok(rows.into_iter().filter(|t| t.is_orphan_candidate()).collect())
    }

    fn insert_canonical_thread(&mut self, ct: CanonicalThread) -> Result<(), StoreError> {
        let mut threads = self.txn.open_table(THREADS).map_err(StoreError::backend)?;
        if threads.get(ct.cano_id.as_u128()).map_err(StoreError::backend)?.is_some() {
            return Err(StoreError::DuplicateCanonicalThread(ct.cano_id));
        }
        let bytes = bincode::serialize(&ct)?;
        threads.insert(ct.cano_id.as_u128(), bytes.as_slice()).map_err(StoreError::backend)?;
        drop(threads);

        let mut by_length =
            self.txn.open_multimap_table(THREADS_BY_LENGTH).map_err(StoreError::backend)?;
        by_length.insert(ct.length, ct.cano_id.as_u128()).map_err(StoreError::backend)?;
        Ok(())
    }

    fn insert_document(&mut self, doc: Document) -> Result<(), StoreError> {
        let mut file_index = self.txn.open_table(FILE_NAME_INDEX).map_err(StoreError::backend)?;
        if file_index.get(doc.file_name.as_str()).map_err(StoreError::backend)?.is_some() {
            return Err(StoreError::DuplicateFileName(doc.file_name.clone()));
        }
        file_index
            .insert(doc.file_name.as_str(), doc.doc_id.as_u128())
            .map_err(StoreError::backend)?;
        drop(file_index);

        let mut documents = self.txn.open_table(DOCUMENTS).map_err(StoreError::backend)?;
        let bytes = bincode::serialize(&doc)?;
        documents.insert(doc.doc_id.as_u128(), bytes.as_slice()).map_err(StoreError::backend)?;
        drop(documents);

        let mut docs_by_cano =
            self.txn.open_multimap_table(DOCS_BY_CANO_ID).map_err(StoreError::backend)?;
        docs_by_cano
            .insert(doc.cano_id.as_u128(), doc.doc_id.as_u128())
            .map_err(StoreError::backend)?;
        Ok(())
    }

    fn set_parent(&mut self, child_id: Uuid, parent_id: Uuid) -> Result<(), StoreError> {
        let mut threads = self.txn.open_table(THREADS).map_err(StoreError::backend)?;
        let mut child: CanonicalThread = match threads.get(child_id.as_u128()).map_err(StoreError::backend)? {
            Some(guard) => bincode::deserialize(guard.value())?,
            None => return Err(StoreError::ThreadNotFound(child_id)),
        };

        match child.parent_id {
            Some(existing) if existing == parent_id => return Ok(()),
            Some(existing) => {
                return Err(StoreError::ConflictingParent {
                    child: child_id,
                    existing,
                    attempted: parent_id,
                })
            }
            None => {}
        }

        child.parent_id = Some(parent_id);
        let bytes = bincode::serialize(&child)?;
        threads.insert(child_id.as_u128(), bytes.as_slice()).map_err(StoreError::backend)?;
        drop(threads);

        let mut children_by_parent =
            self.txn.open_multimap_table(CHILDREN_BY_PARENT).map_err(StoreError::backend)?;
        children_by_parent
            .insert(parent_id.as_u128(), child_id.as_u128())
            .map_err(StoreError::backend)?;
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.txn.commit().map_err(StoreError::backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn thread(length: u32, fp: u64, parent_fp: Option<u64>) -> CanonicalThread {
        CanonicalThread {
            cano_id: Uuid::new_v4(),
            fp,
            parent_fp,
            length,
            parent_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn round_trips_canonical_thread_through_redb() {
        let dir = tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("test.redb")).unwrap();
        let ct = thread(1, 7, None);
        let mut session = backend.begin_write().unwrap();
        session.insert_canonical_thread(ct.clone()).unwrap();
        session.commit().unwrap();

        let found = backend.begin_write().unwrap().find_candidates_by_length(1).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].cano_id, ct.cano_id);
    }

    #[test]
    fn set_parent_persists_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("test.redb")).unwrap();
        let parent = thread(1, 1, None);
        let child = thread(2, 2, Some(1));
        let mut session = backend.begin_write().unwrap();
        session.insert_canonical_thread(parent.clone()).unwrap();
        session.insert_canonical_thread(child.clone()).unwrap();
        session.set_parent(child.cano_id, parent.cano_id).unwrap();
        session.set_parent(child.cano_id, parent.cano_id).unwrap();
        session.commit().unwrap();

        assert_eq!(backend.get_parent_id(child.cano_id).unwrap(), Some(parent.cano_id));
        assert_eq!(backend.get_children_ids(parent.cano_id).unwrap(), vec![child.cano_id]);
    }

    #[test]
    fn duplicate_file_name_is_rejected() {
        let dir = tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("test.redb")).unwrap();
        let ct = thread(1, 1, None);
        let doc = Document {
            doc_id: Uuid::new_v4(),
            file_name: "dup.txt".into(),
            raw_content: b"x".to_vec(),
            cano_id: ct.cano_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let mut session = backend.begin_write().unwrap();
        session.insert_canonical_thread(ct).unwrap();
        session.insert_document(doc.clone()).unwrap();
        session.commit().unwrap();

        let mut dup = doc;
        dup.doc_id = Uuid::new_v4();
        let mut session = backend.begin_write().unwrap();
        let err = session.insert_document(dup).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateFileName(_)));
    }

    #[test]
    fn uncommitted_session_leaves_no_trace() {
        let dir = tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("test.redb")).unwrap();
        let ct = thread(1, 1, None);
        {
            let mut session = backend.begin_write().unwrap();
            session.insert_canonical_thread(ct.clone()).unwrap();
            // dropped without calling commit()
        }
        let found = backend.begin_write().unwrap().find_candidates_by_length(1).unwrap();
        assert!(found.is_empty());
    }
}
