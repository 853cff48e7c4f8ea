//! The permission store
//!
//! Single source of truth for "may user U do action A on module M (in court
//! S)". Records live in an in-memory list; every mutation writes the whole
//! list back through the backend. A failed write is reported but the
//! in-memory change stays: it is authoritative for the running session.
//!
//! Matching rule: `scope_key` only takes part in the comparison for scoped
//! modules. For unscoped modules user and module alone identify the row, so
//! a stray scope can never split one permission into several.

use crate::backend::PermissionBackend;
use crate::catalog::{ModuleCatalog, USERS_MODULE};
use crate::error::AccessError;
use crate::record::{AccessFlags, Action, PermissionRecord};
use tracing::{debug, warn};

pub struct PermissionStore<B: PermissionBackend> {
    records: Vec<PermissionRecord>,
    backend: B,
}

impl<B: PermissionBackend> PermissionStore<B> {
    /// Load whatever the backend holds; an empty store if nothing was saved
    pub fn open(backend: B) -> Result<Self, AccessError> {
        let records = backend.load()?.unwrap_or_default();
        debug!(count = records.len(), "loaded permissions");
        Ok(Self { records, backend })
    }

    /// Like [`open`](Self::open), but a backend that has never been written
    /// is initialised with `seed()` and saved.
    pub fn open_or_seed<F>(backend: B, seed: F) -> Result<Self, AccessError>
    where
        F: FnOnce() -> Vec<PermissionRecord>,
    {
        match backend.load()? {
            Some(records) => Ok(Self { records, backend }),
            None => {
                let mut store = Self {
                    records: seed(),
                    backend,
                };
                store.persist()?;
                debug!(count = store.records.len(), "seeded permissions");
                Ok(store)
            }
        }
    }

    pub fn records(&self) -> &[PermissionRecord] {
        &self.records
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The record for a tuple. `None` means no access, not failure.
    pub fn lookup(
        &self,
        catalog: &ModuleCatalog,
        user_id: &str,
        module_key: &str,
        scope_key: Option<&str>,
    ) -> Option<&PermissionRecord> {
        self.position(catalog, user_id, module_key, scope_key)
            .map(|i| &self.records[i])
    }

    /// Whether a single action is allowed; a missing record allows nothing
    pub fn check(
        &self,
        catalog: &ModuleCatalog,
        user_id: &str,
        module_key: &str,
        scope_key: Option<&str>,
        action: Action,
    ) -> bool {
        self.lookup(catalog, user_id, module_key, scope_key)
            .map_or(false, |r| r.allows(action))
    }

    /// Create or fully overwrite the record for a tuple.
    ///
    /// Scoped modules reject a missing or blank scope without touching the
    /// collection. Unscoped modules drop any supplied scope.
    pub fn grant(
        &mut self,
        catalog: &ModuleCatalog,
        user_id: &str,
        module_key: &str,
        scope_key: Option<&str>,
        flags: AccessFlags,
    ) -> Result<(), AccessError> {
        if user_id.trim().is_empty() {
            return Err(AccessError::Validation("a user is required".to_string()));
        }
        if module_key.trim().is_empty() {
            return Err(AccessError::Validation("a module is required".to_string()));
        }

        let scope_key = if catalog.is_scoped(module_key) {
            match normalize_scope(scope_key) {
                Some(scope) => Some(scope),
                None => {
                    return Err(AccessError::Validation(format!(
                        "module '{}' is foldered by court; a court must be selected",
                        module_key
                    )))
                }
            }
        } else {
            None
        };

        let record = PermissionRecord::new(user_id, module_key, scope_key, flags);
        match self.position(catalog, user_id, module_key, scope_key) {
            Some(i) => {
                self.records[i] = record;
                // Collapse duplicates left by hand edits or a scoping change
                let scoped = catalog.is_scoped(module_key);
                let mut index = 0;
                self.records.retain(|r| {
                    let keep = index <= i || !matches(r, scoped, user_id, module_key, scope_key);
                    index += 1;
                    keep
                });
            }
            None => self.records.push(record),
        }
        debug!(user_id, module_key, scope = ?scope_key, %flags, "granted access");

        self.persist()
    }

    /// Remove every record matching a tuple. Returns whether any existed; a
    /// miss neither errors nor writes.
    pub fn revoke(
        &mut self,
        catalog: &ModuleCatalog,
        user_id: &str,
        module_key: &str,
        scope_key: Option<&str>,
    ) -> Result<bool, AccessError> {
        let scoped = catalog.is_scoped(module_key);
        let scope_key = normalize_scope(scope_key);

        let before = self.records.len();
        self.records
            .retain(|r| !matches(r, scoped, user_id, module_key, scope_key));
        let removed = before - self.records.len();
        if removed == 0 {
            return Ok(false);
        }
        debug!(user_id, module_key, scope = ?scope_key, removed, "revoked access");

        self.persist()?;
        Ok(true)
    }

    /// All records of a user, in insertion order
    pub fn list_for_user(&self, user_id: &str) -> Vec<&PermissionRecord> {
        self.records.iter().filter(|r| r.user_id == user_id).collect()
    }

    /// Drop every record of a user (the user left the directory)
    pub fn purge_user(&mut self, user_id: &str) -> Result<usize, AccessError> {
        self.purge_where(|r| r.user_id == user_id)
    }

    /// Drop every record matching `predicate`, writing only if something went
    pub fn purge_where<F>(&mut self, predicate: F) -> Result<usize, AccessError>
    where
        F: Fn(&PermissionRecord) -> bool,
    {
        let before = self.records.len();
        self.records.retain(|r| !predicate(r));
        let removed = before - self.records.len();

        if removed > 0 {
            debug!(removed, "purged permissions");
            self.persist()?;
        }
        Ok(removed)
    }

    fn position(
        &self,
        catalog: &ModuleCatalog,
        user_id: &str,
        module_key: &str,
        scope_key: Option<&str>,
    ) -> Option<usize> {
        let scoped = catalog.is_scoped(module_key);
        let scope_key = normalize_scope(scope_key);

        self.records
            .iter()
            .position(|r| matches(r, scoped, user_id, module_key, scope_key))
    }

    fn persist(&mut self) -> Result<(), AccessError> {
        if let Err(e) = self.backend.save(&self.records) {
            warn!(error = %e, "failed to persist permissions; keeping in-memory state");
            return Err(e.into());
        }
        Ok(())
    }
}

fn matches(
    record: &PermissionRecord,
    scoped: bool,
    user_id: &str,
    module_key: &str,
    scope_key: Option<&str>,
) -> bool {
    record.user_id == user_id
        && record.module_key == module_key
        && (!scoped || record.scope_key.as_deref() == scope_key)
}

/// Treat a blank scope as no scope
fn normalize_scope(scope_key: Option<&str>) -> Option<&str> {
    scope_key.filter(|s| !s.trim().is_empty())
}

/// The grants a fresh install starts with
pub fn demo_records() -> Vec<PermissionRecord> {
    let view = AccessFlags::view_only();
    vec![
        PermissionRecord::new("1", "psi", None, view),
        PermissionRecord::new("1", "social", None, view),
        PermissionRecord::new("1", USERS_MODULE, None, AccessFlags::FULL),
        PermissionRecord::new("2", "psi", None, AccessFlags::new(true, true, true, false)),
        PermissionRecord::new("3", "bail", Some("1"), AccessFlags::new(true, true, true, false)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::catalog::COUNTY_CONFIG_MODULE;

    fn store() -> PermissionStore<MemoryBackend> {
        PermissionStore::open(MemoryBackend::new()).unwrap()
    }

    #[test]
    fn test_grant_then_lookup() {
        let catalog = ModuleCatalog::default();
        let mut store = store();
        let flags = AccessFlags::new(true, false, true, false);

        store.grant(&catalog, "u1", "psi", None, flags).unwrap();

        let record = store.lookup(&catalog, "u1", "psi", None).unwrap();
        assert_eq!(record.flags, flags);
        assert_eq!(record.scope_key, None);
        assert_eq!(store.backend().writes(), 1);
    }

    #[test]
    fn test_grant_overwrites() {
        let catalog = ModuleCatalog::default();
        let mut store = store();

        store.grant(&catalog, "u1", "psi", None, AccessFlags::FULL).unwrap();
        store
            .grant(&catalog, "u1", "psi", None, AccessFlags::view_only())
            .unwrap();

        assert_eq!(store.records().len(), 1);
        assert_eq!(
            store.lookup(&catalog, "u1", "psi", None).unwrap().flags,
            AccessFlags::view_only()
        );
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let catalog = ModuleCatalog::default();
        let mut store = store();

        store.grant(&catalog, "u1", "psi", None, AccessFlags::FULL).unwrap();
        store.grant(&catalog, "u1", "social", None, AccessFlags::FULL).unwrap();
        store.grant(&catalog, "u1", "psi", None, AccessFlags::NONE).unwrap();

        let modules: Vec<&str> = store
            .list_for_user("u1")
            .iter()
            .map(|r| r.module_key.as_str())
            .collect();
        assert_eq!(modules, vec!["psi", "social"]);
    }

    #[test]
    fn test_scoped_grant_requires_scope() {
        let catalog = ModuleCatalog::default();
        let mut store = store();

        let err = store
            .grant(&catalog, "u3", "bail", None, AccessFlags::FULL)
            .unwrap_err();
        assert!(err.is_validation());

        let err = store
            .grant(&catalog, "u3", "bail", Some("  "), AccessFlags::FULL)
            .unwrap_err();
        assert!(err.is_validation());

        assert!(store.records().is_empty());
        assert_eq!(store.backend().writes(), 0);
    }

    #[test]
    fn test_scoped_records_are_independent() {
        let catalog = ModuleCatalog::default();
        let mut store = store();
        let first = AccessFlags::new(true, true, true, false);
        let second = AccessFlags::view_only();

        store.grant(&catalog, "u3", "bail", Some("court-1"), first).unwrap();
        store.grant(&catalog, "u3", "bail", Some("court-2"), second).unwrap();

        assert_eq!(
            store.lookup(&catalog, "u3", "bail", Some("court-1")).unwrap().flags,
            first
        );
        assert_eq!(
            store.lookup(&catalog, "u3", "bail", Some("court-2")).unwrap().flags,
            second
        );
        assert!(store.lookup(&catalog, "u3", "bail", None).is_none());
        assert!(store.lookup(&catalog, "u3", "bail", Some("court-3")).is_none());
    }

    #[test]
    fn test_unscoped_module_ignores_scope() {
        let catalog = ModuleCatalog::default();
        let mut store = store();

        store
            .grant(&catalog, "u1", "psi", Some("court-1"), AccessFlags::FULL)
            .unwrap();
        store
            .grant(&catalog, "u1", "psi", Some("court-2"), AccessFlags::view_only())
            .unwrap();

        assert_eq!(store.records().len(), 1);
        let record = store.lookup(&catalog, "u1", "psi", Some("anything")).unwrap();
        assert_eq!(record.scope_key, None);
        assert_eq!(record.flags, AccessFlags::view_only());
    }

    #[test]
    fn test_unscoped_lookup_matches_legacy_scoped_row() {
        // A row written before the module stopped being scoped still matches
        let catalog = ModuleCatalog::default();
        let legacy = PermissionRecord::new("u1", "psi", Some("court-1"), AccessFlags::FULL);
        let store = PermissionStore::open(MemoryBackend::with_records(vec![legacy])).unwrap();

        assert!(store.lookup(&catalog, "u1", "psi", None).is_some());
    }

    #[test]
    fn test_revoke_drops_every_legacy_row() {
        let catalog = ModuleCatalog::default();
        let legacy = vec![
            PermissionRecord::new("u1", "psi", Some("court-1"), AccessFlags::FULL),
            PermissionRecord::new("u2", "psi", None, AccessFlags::view_only()),
            PermissionRecord::new("u1", "psi", Some("court-2"), AccessFlags::FULL),
        ];
        let mut store = PermissionStore::open(MemoryBackend::with_records(legacy)).unwrap();

        assert!(store.revoke(&catalog, "u1", "psi", None).unwrap());
        assert!(store.lookup(&catalog, "u1", "psi", None).is_none());
        assert_eq!(store.records().len(), 1);
        assert_eq!(store.backend().writes(), 1);
    }

    #[test]
    fn test_grant_collapses_duplicates() {
        let catalog = ModuleCatalog::default();
        let duplicates = vec![
            PermissionRecord::new("u1", "psi", None, AccessFlags::FULL),
            PermissionRecord::new("u1", "social", None, AccessFlags::FULL),
            PermissionRecord::new("u1", "psi", None, AccessFlags::FULL),
        ];
        let mut store = PermissionStore::open(MemoryBackend::with_records(duplicates)).unwrap();

        store.grant(&catalog, "u1", "psi", None, AccessFlags::NONE).unwrap();

        let rows: Vec<(&str, AccessFlags)> = store
            .list_for_user("u1")
            .iter()
            .map(|r| (r.module_key.as_str(), r.flags))
            .collect();
        assert_eq!(
            rows,
            vec![("psi", AccessFlags::NONE), ("social", AccessFlags::FULL)]
        );
    }

    #[test]
    fn test_revoke() {
        let catalog = ModuleCatalog::default();
        let mut store = store();
        store.grant(&catalog, "u1", "psi", None, AccessFlags::FULL).unwrap();

        assert!(store.revoke(&catalog, "u1", "psi", None).unwrap());
        assert!(store.lookup(&catalog, "u1", "psi", None).is_none());
        assert_eq!(store.backend().saved().unwrap().len(), 0);
    }

    #[test]
    fn test_revoke_missing_is_noop() {
        let catalog = ModuleCatalog::default();
        let mut store = store();
        store.backend_mut().set_fail_writes(true);

        assert!(!store.revoke(&catalog, "u1", "psi", None).unwrap());
        assert!(!store.revoke(&catalog, "u3", "bail", Some("court-1")).unwrap());
    }

    #[test]
    fn test_revoke_scoped_leaves_other_courts() {
        let catalog = ModuleCatalog::default();
        let mut store = store();
        store.grant(&catalog, "u3", "bail", Some("1"), AccessFlags::FULL).unwrap();
        store.grant(&catalog, "u3", "bail", Some("2"), AccessFlags::FULL).unwrap();

        assert!(store.revoke(&catalog, "u3", "bail", Some("1")).unwrap());
        assert!(store.lookup(&catalog, "u3", "bail", Some("1")).is_none());
        assert!(store.lookup(&catalog, "u3", "bail", Some("2")).is_some());
    }

    #[test]
    fn test_persist_failure_keeps_memory_state() {
        let catalog = ModuleCatalog::default();
        let mut store = store();
        store.backend_mut().set_fail_writes(true);

        let err = store
            .grant(&catalog, "u1", COUNTY_CONFIG_MODULE, None, AccessFlags::FULL)
            .unwrap_err();
        assert!(err.is_persistence());

        assert!(store.check(&catalog, "u1", COUNTY_CONFIG_MODULE, None, Action::Delete));
        assert!(store.backend().saved().is_none());

        // The next successful write carries the earlier change too
        store.backend_mut().set_fail_writes(false);
        store.grant(&catalog, "u2", "psi", None, AccessFlags::view_only()).unwrap();
        assert_eq!(store.backend().saved().unwrap().len(), 2);
    }

    #[test]
    fn test_check_without_record_denies() {
        let catalog = ModuleCatalog::default();
        let mut store = store();
        store
            .grant(&catalog, "u1", USERS_MODULE, None, AccessFlags::view_only())
            .unwrap();

        assert!(store.check(&catalog, "u1", USERS_MODULE, None, Action::View));
        assert!(!store.check(&catalog, "u1", USERS_MODULE, None, Action::Edit));
        for action in Action::ALL {
            assert!(!store.check(&catalog, "u2", USERS_MODULE, None, action));
        }
    }

    #[test]
    fn test_list_for_user() {
        let catalog = ModuleCatalog::default();
        let store = PermissionStore::open(MemoryBackend::with_records(demo_records())).unwrap();

        assert_eq!(store.list_for_user("1").len(), 3);
        assert_eq!(store.list_for_user("3").len(), 1);
        assert!(store.list_for_user("9").is_empty());
        assert!(store.lookup(&catalog, "3", "bail", Some("1")).is_some());
    }

    #[test]
    fn test_purge_user() {
        let mut store = PermissionStore::open(MemoryBackend::with_records(demo_records())).unwrap();

        assert_eq!(store.purge_user("1").unwrap(), 3);
        assert!(store.list_for_user("1").is_empty());
        assert_eq!(store.records().len(), 2);

        assert_eq!(store.purge_user("1").unwrap(), 0);
        assert_eq!(store.backend().writes(), 1);
    }

    #[test]
    fn test_open_or_seed() {
        let store = PermissionStore::open_or_seed(MemoryBackend::new(), demo_records).unwrap();
        assert_eq!(store.records().len(), 5);
        assert_eq!(store.backend().writes(), 1);

        // An existing (even empty) collection is never reseeded
        let store =
            PermissionStore::open_or_seed(MemoryBackend::with_records(vec![]), demo_records)
                .unwrap();
        assert!(store.records().is_empty());
    }

    #[test]
    fn test_grant_requires_user_and_module() {
        let catalog = ModuleCatalog::default();
        let mut store = store();

        assert!(store
            .grant(&catalog, "", "psi", None, AccessFlags::FULL)
            .unwrap_err()
            .is_validation());
        assert!(store
            .grant(&catalog, "u1", " ", None, AccessFlags::FULL)
            .unwrap_err()
            .is_validation());
    }
}
