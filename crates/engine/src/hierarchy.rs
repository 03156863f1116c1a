//! HierarchyQuery (C7): read-only lookups over the thread DAG maintained by
//! the dedup engine.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use store::{StoreError, ThreadStore};

/// Upstream walks are bounded even if the store violates the acyclic
/// invariant.
const MAX_UPSTREAM_DEPTH: usize = 1000;

pub struct HierarchyQuery {
    store: Arc<dyn ThreadStore>,
}

impl HierarchyQuery {
    pub fn new(store: Arc<dyn ThreadStore>) -> Self {
        Self { store }
    }

    pub fn canonical_of(&self, file_name: &str) -> Result<Option<Uuid>, StoreError> {
        self.store.get_cano_id_by_file_name(file_name)
    }

    pub fn documents_of(&self, cano_id: Uuid) -> Result<Vec<String>, StoreError> {
        self.store.get_file_names_by_cano_id(cano_id)
    }

    pub fn children_of(&self, cano_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        self.store.get_children_ids(cano_id)
    }

    pub fn parent_of(&self, cano_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        self.store.get_parent_id(cano_id)
    }

    /// Walk `parent_of` repeatedly, producing `"root -> ... -> cano_id"` in
    /// root-first order. If a cycle is detected (the store violates the
    /// acyclic invariant), the chain accumulated so far is returned and a
    /// corruption warning is logged, rather than looping forever.
    pub fn upstream_chain(&self, cano_id: Uuid) -> Result<String, StoreError> {
        let mut chain = vec![cano_id];
        let mut seen: HashSet<Uuid> = HashSet::from([cano_id]);
        let mut current = cano_id;

        for _ in 0..MAX_UPSTREAM_DEPTH {
            match self.store.get_parent_id(current)? {
                Some(parent) => {
                    if !seen.insert(parent) {
                        warn!(
                            resource = "hierarchy",
                            action = "upstream_walk",
                            cano_id = %cano_id,
                            repeated = %parent,
                            "cycle detected while walking upstream chain"
                        );
                        break;
                    }
                    chain.push(parent);
                    current = parent;
                }
                None => break,
            }
        }

        chain.reverse();
        Ok(chain.iter().map(Uuid::to_string).collect::<Vec<_>>().join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use store::{CanonicalThread, InMemoryBackend};

    fn thread(cano_id: Uuid, length: u32, parent_id: Option<Uuid>) -> CanonicalThread {
        CanonicalThread {
            cano_id,
            fp: 1,
            parent_fp: if length > 1 { Some(1) } else { None },
            length,
            parent_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn upstream_chain_is_root_first() {
        let backend = Arc::new(InMemoryBackend::new());
        let root = Uuid::new_v4();
        let mid = Uuid::new_v4();
        let leaf = Uuid::new_v4();
        {
            let mut session = backend.begin_write().unwrap();
            session.insert_canonical_thread(thread(root, 1, None)).unwrap();
            session.insert_canonical_thread(thread(mid, 2, Some(root))).unwrap();
            session.insert_canonical_thread(thread(leaf, 3, Some(mid))).unwrap();
            session.commit().unwrap();
        }

        let query = HierarchyQuery::new(backend);
        let chain = query.upstream_chain(leaf).unwrap();
        assert_eq!(chain, format!("{root} -> {mid} -> {leaf}"));
    }

    #[test]
    fn upstream_chain_of_a_root_is_itself() {
        let backend = Arc::new(InMemoryBackend::new());
        let root = Uuid::new_v4();
        {
            let mut session = backend.begin_write().unwrap();
            session.insert_canonical_thread(thread(root, 1, None)).unwrap();
            session.commit().unwrap();
        }

        let query = HierarchyQuery::new(backend);
        assert_eq!(query.upstream_chain(root).unwrap(), root.to_string());
    }
}
