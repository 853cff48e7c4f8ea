//! Module catalog
//!
//! Every permission-addressable module: one per document repository plus the
//! console's own user-management and county-configuration modules. The
//! catalog also owns the scoping rule: a module key in the scoped set needs a
//! court on every grant and gets one permission row per court.

use docket_core::Directory;
use serde::Serialize;
use std::collections::HashSet;

/// Built-in module for user management
pub const USERS_MODULE: &str = "users";

/// Built-in module for county configuration
pub const COUNTY_CONFIG_MODULE: &str = "county-config";

/// Modules foldered by magisterial district court out of the box
pub const DEFAULT_SCOPED_MODULES: &[&str] = &["bail"];

/// A permission-addressable module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Module {
    pub code: String,
    pub name: String,
    /// Requires a court scope
    pub scoped: bool,
    /// Part of the console rather than a county repository
    pub builtin: bool,
}

#[derive(Debug, Clone)]
pub struct ModuleCatalog {
    modules: Vec<Module>,
    scoped: HashSet<String>,
}

impl Default for ModuleCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_SCOPED_MODULES.iter().copied()).with_builtins()
    }
}

impl ModuleCatalog {
    /// Empty catalog with the given scoping rule
    pub fn new<I, S>(scoped_modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            modules: Vec::new(),
            scoped: scoped_modules.into_iter().map(Into::into).collect(),
        }
    }

    /// Repositories from the directory followed by the built-in modules
    pub fn from_directory<I, S>(directory: &Directory, scoped_modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut catalog = Self::new(scoped_modules);
        for repo in directory.repositories() {
            catalog.push(&repo.code, &repo.name, false);
        }
        catalog.with_builtins()
    }

    /// Add a repository module
    pub fn with_module(mut self, code: &str, name: &str) -> Self {
        self.push(code, name, false);
        self
    }

    fn with_builtins(mut self) -> Self {
        self.push(USERS_MODULE, "User Management", true);
        self.push(COUNTY_CONFIG_MODULE, "County Configuration", true);
        self
    }

    fn push(&mut self, code: &str, name: &str, builtin: bool) {
        if self.contains(code) {
            return;
        }
        self.modules.push(Module {
            code: code.to_string(),
            name: name.to_string(),
            scoped: self.scoped.contains(code),
            builtin,
        });
    }

    /// Whether grants on this module key need a scope. Unknown keys are unscoped.
    pub fn is_scoped(&self, module_key: &str) -> bool {
        self.scoped.contains(module_key)
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn get(&self, code: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.code == code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let catalog = ModuleCatalog::default();
        assert!(catalog.is_scoped("bail"));
        assert!(!catalog.is_scoped(USERS_MODULE));
        assert!(!catalog.is_scoped("unknown"));

        let codes: Vec<&str> = catalog.modules().iter().map(|m| m.code.as_str()).collect();
        assert_eq!(codes, vec![USERS_MODULE, COUNTY_CONFIG_MODULE]);
    }

    #[test]
    fn test_from_directory() {
        let directory = Directory::demo();
        let catalog = ModuleCatalog::from_directory(&directory, ["bail"]);

        let codes: Vec<&str> = catalog.modules().iter().map(|m| m.code.as_str()).collect();
        assert_eq!(codes, vec!["psi", "bail", "social", "users", "county-config"]);

        let bail = catalog.get("bail").unwrap();
        assert!(bail.scoped);
        assert!(!bail.builtin);
        assert_eq!(bail.name, "Bail Reports");
        assert!(catalog.get("users").unwrap().builtin);
    }

    #[test]
    fn test_scoping_is_configuration() {
        let directory = Directory::demo();
        let catalog = ModuleCatalog::from_directory(&directory, ["bail", "psi"]);
        assert!(catalog.get("psi").unwrap().scoped);

        let catalog = ModuleCatalog::from_directory(&directory, Vec::<String>::new());
        assert!(!catalog.is_scoped("bail"));
    }
}
