//! Per-user access matrix
//!
//! Every catalog module (and, for scoped modules, every court) paired with the
//! user's record or "no access". Scoped modules with no courts have no cells.

use crate::backend::PermissionBackend;
use crate::catalog::ModuleCatalog;
use crate::record::AccessFlags;
use crate::store::PermissionStore;
use docket_core::Court;
use serde::Serialize;

/// One cell of the matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixEntry {
    pub module_key: String,
    pub module_name: String,
    pub scope_key: Option<String>,
    pub scope_name: Option<String>,
    /// `AccessFlags::NONE` when `granted` is false
    pub flags: AccessFlags,
    /// A record exists for this cell
    pub granted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessMatrix {
    pub user_id: String,
    pub entries: Vec<MatrixEntry>,
}

impl AccessMatrix {
    pub fn build<B: PermissionBackend>(
        store: &PermissionStore<B>,
        catalog: &ModuleCatalog,
        courts: &[Court],
        user_id: &str,
    ) -> Self {
        let mut entries = Vec::new();

        for module in catalog.modules() {
            if module.scoped {
                for court in courts {
                    let record = store.lookup(catalog, user_id, &module.code, Some(&court.id));
                    entries.push(MatrixEntry {
                        module_key: module.code.clone(),
                        module_name: module.name.clone(),
                        scope_key: Some(court.id.clone()),
                        scope_name: Some(court.name.clone()),
                        flags: record.map_or(AccessFlags::NONE, |r| r.flags),
                        granted: record.is_some(),
                    });
                }
            } else {
                let record = store.lookup(catalog, user_id, &module.code, None);
                entries.push(MatrixEntry {
                    module_key: module.code.clone(),
                    module_name: module.name.clone(),
                    scope_key: None,
                    scope_name: None,
                    flags: record.map_or(AccessFlags::NONE, |r| r.flags),
                    granted: record.is_some(),
                });
            }
        }

        Self {
            user_id: user_id.to_string(),
            entries,
        }
    }

    /// Cells backed by a record
    pub fn granted(&self) -> impl Iterator<Item = &MatrixEntry> {
        self.entries.iter().filter(|e| e.granted)
    }

    pub fn entry(&self, module_key: &str, scope_key: Option<&str>) -> Option<&MatrixEntry> {
        self.entries
            .iter()
            .find(|e| e.module_key == module_key && e.scope_key.as_deref() == scope_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::store::demo_records;
    use docket_core::Directory;

    #[test]
    fn test_matrix_shape() {
        let directory = Directory::demo();
        let catalog = ModuleCatalog::from_directory(&directory, ["bail"]);
        let store = PermissionStore::open(MemoryBackend::with_records(demo_records())).unwrap();

        let matrix = AccessMatrix::build(&store, &catalog, directory.courts(), "3");

        // psi, bail x 2 courts, social, users, county-config
        assert_eq!(matrix.entries.len(), 6);
        assert_eq!(matrix.granted().count(), 1);

        let court_1 = matrix.entry("bail", Some("1")).unwrap();
        assert!(court_1.granted);
        assert_eq!(court_1.flags, AccessFlags::new(true, true, true, false));
        assert_eq!(court_1.scope_name.as_deref(), Some("Magisterial District Court 15-1-01"));

        let court_2 = matrix.entry("bail", Some("2")).unwrap();
        assert!(!court_2.granted);
        assert_eq!(court_2.flags, AccessFlags::NONE);

        assert!(matrix.entry("bail", None).is_none());
    }

    #[test]
    fn test_matrix_without_courts() {
        let directory = Directory::demo();
        let catalog = ModuleCatalog::from_directory(&directory, ["bail"]);
        let store = PermissionStore::open(MemoryBackend::with_records(demo_records())).unwrap();

        let matrix = AccessMatrix::build(&store, &catalog, &[], "1");
        assert_eq!(matrix.entries.len(), 4);
        assert_eq!(matrix.granted().count(), 3);
        assert!(matrix.entries.iter().all(|e| e.module_key != "bail"));
    }
}
