//! Permission records and the four CRUD flags

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single CRUD action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::View, Action::Create, Action::Edit, Action::Delete];

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "view" | "read" => Some(Action::View),
            "create" | "upload" => Some(Action::Create),
            "edit" | "update" => Some(Action::Edit),
            "delete" | "remove" => Some(Action::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The complete flag set carried by every grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AccessFlags {
    pub can_view: bool,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

impl AccessFlags {
    /// No access
    pub const NONE: AccessFlags = AccessFlags::new(false, false, false, false);

    /// Full access
    pub const FULL: AccessFlags = AccessFlags::new(true, true, true, true);

    pub const fn new(can_view: bool, can_create: bool, can_edit: bool, can_delete: bool) -> Self {
        Self {
            can_view,
            can_create,
            can_edit,
            can_delete,
        }
    }

    pub const fn view_only() -> Self {
        Self::new(true, false, false, false)
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::View => self.can_view,
            Action::Create => self.can_create,
            Action::Edit => self.can_edit,
            Action::Delete => self.can_delete,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    /// Granted actions in view/create/edit/delete order
    pub fn actions(&self) -> Vec<Action> {
        Action::ALL.into_iter().filter(|a| self.allows(*a)).collect()
    }
}

impl fmt::Display for AccessFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<&str> = self.actions().iter().map(Action::as_str).collect();
        write!(f, "{}", names.join(","))
    }
}

/// One row of the access table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub user_id: String,

    /// A repository code, `users` or `county-config`
    pub module_key: String,

    /// Court id for court-scoped modules; always `None` otherwise
    pub scope_key: Option<String>,

    #[serde(flatten)]
    pub flags: AccessFlags,
}

impl PermissionRecord {
    pub fn new(user_id: &str, module_key: &str, scope_key: Option<&str>, flags: AccessFlags) -> Self {
        Self {
            user_id: user_id.to_string(),
            module_key: module_key.to_string(),
            scope_key: scope_key.map(str::to_string),
            flags,
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        self.flags.allows(action)
    }
}
