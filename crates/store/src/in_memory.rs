use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::error::StoreError;
use crate::types::{CanonicalThread, Document};
use crate::{ThreadStore, WriteSession};

/// `RwLock`-guarded in-memory backend. Default store for tests and
/// single-process use; not durable across restarts.
pub struct InMemoryBackend {
    threads: RwLock<HashMap<Uuid, CanonicalThread>>,
    documents: RwLock<HashMap<Uuid, Document>>,
    file_index: RwLock<HashMap<String, Uuid>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
            documents: RwLock::new(HashMap::new()),
            file_index: RwLock::new(HashMap::new()),
        }
    }

    /// Deterministic tie-break: `created_at` ascending, then `cano_id`, so
    /// first-match scans give stable results across runs.
    fn sorted(mut rows: Vec<CanonicalThread>) -> Vec<CanonicalThread> {
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.cano_id.cmp(&b.cano_id)));
        rows
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadStore for InMemoryBackend {
    fn begin_write(&self) -> Result<Box<dyn WriteSession + '_>, StoreError> {
        Ok(Box::new(InMemorySession {
            backend: self,
            new_threads: HashMap::new(),
            new_documents: HashMap::new(),
            new_file_names: HashMap::new(),
            parent_overrides: HashMap::new(),
        }))
    }

    fn get_cano_id_by_file_name(&self, name: &str) -> Result<Option<Uuid>, StoreError> {
        let file_index = self.file_index.read().map_err(|_| StoreError::backend("poisoned lock"))?;
        let documents = self.documents.read().map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(file_index.get(name).and_then(|doc_id| documents.get(doc_id)).map(|d| d.cano_id))
    }

    fn get_file_names_by_cano_id(&self, id: Uuid) -> Result<Vec<String>, StoreError> {
        let documents = self.documents.read().map_err(|_| StoreError::backend("poisoned lock"))?;
        let mut names: Vec<String> = documents
            .values()
            .filter(|d| d.cano_id == id)
            .map(|d| d.file_name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn get_parent_id(&self, id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let threads = self.threads.read().map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(threads.get(&id).and_then(|t| t.parent_id))
    }

    fn get_children_ids(&self, id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let threads = self.threads.read().map_err(|_| StoreError::backend("poisoned lock"))?;
        let mut rows: Vec<&CanonicalThread> =
            threads.values().filter(|t| t.parent_id == Some(id)).collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.cano_id.cmp(&b.cano_id)));
        Ok(rows.into_iter().map(|t| t.cano_id).collect())
    }
}

/// A unit of work over [`InMemoryBackend`]. There is no native transaction
/// concept for an `RwLock`-guarded map, so this stages every write in its own
/// fields and only touches the backend's real maps inside [`commit`]. Reads
/// made through the session merge the backend's already-committed rows with
/// this session's own pending overlay, so a session can read back what it
/// just wrote before committing. Dropping the session without committing
/// simply discards the staged fields; nothing was ever written to the
/// backend.
///
/// [`commit`]: WriteSession::commit
struct InMemorySession<'a> {
    backend: &'a InMemoryBackend,
    new_threads: HashMap<Uuid, CanonicalThread>,
    new_documents: HashMap<Uuid, Document>,
    new_file_names: HashMap<String, Uuid>,
    parent_overrides: HashMap<Uuid, Uuid>,
}

impl<'a> InMemorySession<'a> {
    fn effective_parent_id(&self, ct: &CanonicalThread) -> Option<Uuid> {
        self.parent_overrides.get(&ct.cano_id).copied().or(ct.parent_id)
    }

    fn effective_thread(&self, id: &Uuid, committed: Option<&CanonicalThread>) -> Option<CanonicalThread> {
        if let Some(ct) = self.new_threads.get(id) {
            let mut ct = ct.clone();
            ct.parent_id = self.effective_parent_id(&ct);
            return Some(ct);
        }
        committed.map(|ct| {
            let mut ct = ct.clone();
            ct.parent_id = self.effective_parent_id(&ct);
            ct
        })
    }
}

impl<'a> WriteSession for InMemorySession<'a> {
    fn find_candidates_by_length(&self, length: u32) -> Result<Vec<CanonicalThread>, StoreError> {
        let threads = self.backend.threads.read().map_err(|_| StoreError::backend("poisoned lock"))?;
        let mut rows: Vec<CanonicalThread> = threads
            .values()
            .filter(|t| t.length == length)
            .filter_map(|t| self.effective_thread(&t.cano_id, Some(t)))
            .collect();
        rows.extend(
            self.new_threads
                .values()
                .filter(|t| t.length == length)
                .map(|t| self.effective_thread(&t.cano_id, None).unwrap()),
        );
        Ok(InMemoryBackend::sorted(rows))
    }

    fn find_orphan_candidates_by_length(
        &self,
        length: u32,
    ) -> Result<Vec<CanonicalThread>, StoreError> {
        let rows = self.find_candidates_by_length(length)?;
        Ok(rows.into_iter().filter(|t| t.is_orphan_candidate()).collect())
    }

    fn insert_canonical_thread(&mut self, ct: CanonicalThread) -> Result<(), StoreError> {
        let already_committed = {
            let threads = self.backend.threads.read().map_err(|_| StoreError::backend("poisoned lock"))?;
            threads.contains_key(&ct.cano_id)
        };
        if already_committed || self.new_threads.contains_key(&ct.cano_id) {
            return Err(StoreError::DuplicateCanonicalThread(ct.cano_id));
        }
        self.new_threads.insert(ct.cano_id, ct);
        Ok(())
    }

    fn insert_document(&mut self, doc: Document) -> Result<(), StoreError> {
        let already_committed = {
            let file_index = self.backend.file_index.read().map_err(|_| StoreError::backend("poisoned lock"))?;
            file_index.contains_key(&doc.file_name)
        };
        if already_committed || self.new_file_names.contains_key(&doc.file_name) {
            return Err(StoreError::DuplicateFileName(doc.file_name.clone()));
        }
        self.new_file_names.insert(doc.file_name.clone(), doc.doc_id);
        self.new_documents.insert(doc.doc_id, doc);
        Ok(())
    }

    fn set_parent(&mut self, child_id: Uuid, parent_id: Uuid) -> Result<(), StoreError> {
        let committed = {
            let threads = self.backend.threads.read().map_err(|_| StoreError::backend("poisoned lock"))?;
            threads.get(&child_id).cloned()
        };
        let child = self
            .effective_thread(&child_id, committed.as_ref())
            .ok_or(StoreError::ThreadNotFound(child_id))?;

        match child.parent_id {
            Some(existing) if existing == parent_id => Ok(()),
            Some(existing) => Err(StoreError::ConflictingParent {
                child: child_id,
                existing,
                attempted: parent_id,
            }),
            None => {
                self.parent_overrides.insert(child_id, parent_id);
                Ok(())
            }
        }
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut threads = self.backend.threads.write().map_err(|_| StoreError::backend("poisoned lock"))?;
        let mut documents = self.backend.documents.write().map_err(|_| StoreError::backend("poisoned lock"))?;
        let mut file_index = self.backend.file_index.write().map_err(|_| StoreError::backend("poisoned lock"))?;

        for (id, ct) in self.new_threads {
            threads.insert(id, ct);
        }
        for (child_id, parent_id) in self.parent_overrides {
            if let Some(ct) = threads.get_mut(&child_id) {
                ct.parent_id = Some(parent_id);
            }
        }
        for (doc_id, doc) in self.new_documents {
            documents.insert(doc_id, doc);
        }
        for (name, doc_id) in self.new_file_names {
            file_index.insert(name, doc_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

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
    fn duplicate_canonical_thread_insert_is_fatal() {
        let store = InMemoryBackend::new();
        let ct = thread(1, 42, None);
        let mut session = store.begin_write().unwrap();
        session.insert_canonical_thread(ct.clone()).unwrap();
        let err = session.insert_canonical_thread(ct).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateCanonicalThread(_)));
    }

    #[test]
    fn duplicate_file_name_insert_is_fatal() {
        let store = InMemoryBackend::new();
        let ct = thread(1, 1, None);
        let doc = Document {
            doc_id: Uuid::new_v4(),
            file_name: "a.txt".into(),
            raw_content: b"hi".to_vec(),
            cano_id: ct.cano_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let mut session = store.begin_write().unwrap();
        session.insert_canonical_thread(ct).unwrap();
        session.insert_document(doc.clone()).unwrap();
        let mut dup = doc;
        dup.doc_id = Uuid::new_v4();
        let err = session.insert_document(dup).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateFileName(_)));
    }

    #[test]
    fn set_parent_is_idempotent_for_same_value() {
        let store = InMemoryBackend::new();
        let parent = thread(1, 1, None);
        let child = thread(2, 2, Some(1));
        let mut session = store.begin_write().unwrap();
        session.insert_canonical_thread(parent.clone()).unwrap();
        session.insert_canonical_thread(child.clone()).unwrap();
        session.set_parent(child.cano_id, parent.cano_id).unwrap();
        session.set_parent(child.cano_id, parent.cano_id).unwrap();
        session.commit().unwrap();
        assert_eq!(store.get_parent_id(child.cano_id).unwrap(), Some(parent.cano_id));
    }

    #[test]
    fn set_parent_rejects_conflicting_reassignment() {
        let store = InMemoryBackend::new();
        let parent_a = thread(1, 1, None);
        let parent_b = thread(1, 2, None);
        let child = thread(2, 3, Some(1));
        let mut session = store.begin_write().unwrap();
        session.insert_canonical_thread(parent_a.clone()).unwrap();
        session.insert_canonical_thread(parent_b.clone()).unwrap();
        session.insert_canonical_thread(child.clone()).unwrap();

        session.set_parent(child.cano_id, parent_a.cano_id).unwrap();
        let err = session.set_parent(child.cano_id, parent_b.cano_id).unwrap_err();
        assert!(matches!(err, StoreError::ConflictingParent { .. }));
    }

    #[test]
    fn orphan_candidates_require_parent_fp_and_no_parent_id() {
        let store = InMemoryBackend::new();
        let with_suffix_unlinked = thread(2, 10, Some(99));
        let with_suffix_linked = {
            let mut t = thread(2, 11, Some(99));
            t.parent_id = Some(Uuid::new_v4());
            t
        };
        let root = thread(2, 12, None);
        let mut session = store.begin_write().unwrap();
        session.insert_canonical_thread(with_suffix_unlinked.clone()).unwrap();
        session.insert_canonical_thread(with_suffix_linked.clone()).unwrap();
        session.insert_canonical_thread(root.clone()).unwrap();

        let orphans = session.find_orphan_candidates_by_length(2).unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].cano_id, with_suffix_unlinked.cano_id);
    }

    #[test]
    fn children_are_ordered_deterministically() {
        let store = InMemoryBackend::new();
        let parent = thread(1, 1, None);
        let mut session = store.begin_write().unwrap();
        session.insert_canonical_thread(parent.clone()).unwrap();
        let mut c1 = thread(2, 2, Some(1));
        c1.parent_id = Some(parent.cano_id);
        let mut c2 = thread(2, 3, Some(1));
        c2.parent_id = Some(parent.cano_id);
        session.insert_canonical_thread(c1.clone()).unwrap();
        session.insert_canonical_thread(c2.clone()).unwrap();
        session.commit().unwrap();

        let kids = store.get_children_ids(parent.cano_id).unwrap();
        assert_eq!(kids.len(), 2);
    }

    #[test]
    fn uncommitted_session_leaves_backend_untouched() {
        let store = InMemoryBackend::new();
        let ct = thread(1, 1, None);
        {
            let mut session = store.begin_write().unwrap();
            session.insert_canonical_thread(ct.clone()).unwrap();
            // dropped without calling commit()
        }
        assert!(store.get_cano_id_by_file_name("anything").unwrap().is_none());
        let fresh = store.begin_write().unwrap();
        assert!(fresh.find_candidates_by_length(1).unwrap().is_empty());
    }
}
