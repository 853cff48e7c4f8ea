//! County directory
//!
//! Users, magisterial district courts and document repositories. These are
//! the collaborators the permission model points at: users by id, courts as
//! scopes, repositories by their stable `code`.
//!
//! Storage: ~/.local/share/docket/directory.json

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::fs::write_atomic;

/// Module keys owned by the console itself; repositories cannot use them
pub const RESERVED_CODES: &[&str] = &["users", "county-config"];

/// Directory-specific errors
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Court not found: {0}")]
    CourtNotFound(String),

    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Username already in use: {0}")]
    DuplicateUsername(String),

    #[error("Repository code already in use: {0}")]
    DuplicateCode(String),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed directory data: {0}")]
    Format(#[from] serde_json::Error),
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
}

/// Editable user fields, always supplied in full
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    /// Job title; doubles as the role shown next to permissions
    pub title: String,
    pub email: String,
    pub agency: String,
    pub phone: String,
    pub username: String,
    #[serde(default)]
    pub status: UserStatus,
}

impl UserProfile {
    pub fn validate(&self) -> Result<(), DirectoryError> {
        require("first name", &self.first_name)?;
        require("last name", &self.last_name)?;
        require("title", &self.title)?;
        require("agency", &self.agency)?;

        if !is_email(&self.email) {
            return Err(invalid("email", "invalid email address"));
        }

        let digits = self.phone.chars().filter(|c| c.is_ascii_digit()).count();
        if digits < 10 {
            return Err(invalid("phone", "must contain at least 10 digits"));
        }

        if self.username.trim().chars().count() < 3 {
            return Err(invalid("username", "must be at least 3 characters"));
        }

        Ok(())
    }
}

/// A console user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(flatten)]
    pub profile: UserProfile,
}

impl User {
    /// Display name
    pub fn name(&self) -> String {
        format!("{} {}", self.profile.first_name, self.profile.last_name)
    }

    pub fn email(&self) -> &str {
        &self.profile.email
    }

    pub fn role(&self) -> &str {
        &self.profile.title
    }

    /// Case-insensitive match on name, email or role
    fn matches(&self, needle: &str) -> bool {
        self.name().to_lowercase().contains(needle)
            || self.email().to_lowercase().contains(needle)
            || self.role().to_lowercase().contains(needle)
    }
}

/// Court fields supplied on create and update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourtDetails {
    pub name: String,
    pub district_number: String,
    pub address: String,
}

impl CourtDetails {
    pub fn validate(&self) -> Result<(), DirectoryError> {
        require("court name", &self.name)?;
        require("district number", &self.district_number)?;
        require("address", &self.address)
    }
}

/// A magisterial district court; also the scope of court-foldered modules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Court {
    pub id: String,
    pub name: String,
    pub district_number: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

/// Metadata field value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Select,
}

/// A metadata field captured with every document in a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataField {
    pub id: String,
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

impl MetadataField {
    pub fn new(name: &str, label: &str, field_type: FieldType, required: bool) -> Self {
        Self {
            id: name.to_string(),
            name: name.to_string(),
            label: label.to_string(),
            field_type,
            required,
        }
    }
}

/// Repository fields supplied on create and update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDetails {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub metadata_fields: Vec<MetadataField>,
}

impl RepositoryDetails {
    pub fn validate(&self) -> Result<(), DirectoryError> {
        require("repository name", &self.name)?;
        require("repository code", &self.code)?;

        if self.code.chars().any(char::is_whitespace) {
            return Err(invalid("repository code", "must not contain whitespace"));
        }
        if RESERVED_CODES.contains(&self.code.as_str()) {
            return Err(invalid("repository code", "reserved for a built-in module"));
        }

        for (i, field) in self.metadata_fields.iter().enumerate() {
            require("metadata field name", &field.name)?;
            if self.metadata_fields[..i].iter().any(|f| f.name == field.name) {
                return Err(DirectoryError::Invalid {
                    field: "metadata field name",
                    reason: format!("duplicate field '{}'", field.name),
                });
            }
        }

        Ok(())
    }
}

/// A county-defined document repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRepository {
    pub id: String,
    pub name: String,
    /// Stable key referenced by permission records
    pub code: String,
    #[serde(default)]
    pub metadata_fields: Vec<MetadataField>,
}

/// The county directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    courts: Vec<Court>,
    #[serde(default)]
    repositories: Vec<DocumentRepository>,
}

impl Directory {
    /// Load the directory; `None` when nothing has been saved yet
    pub fn load_from(path: &Path) -> Result<Option<Self>, DirectoryError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|source| DirectoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let directory = serde_json::from_str(&content)?;
        Ok(Some(directory))
    }

    /// Save the directory
    pub fn save_to(&self, path: &Path) -> Result<(), DirectoryError> {
        let content = serde_json::to_string_pretty(self)?;
        write_atomic(path, content.as_bytes()).map_err(|source| DirectoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "saved directory");
        Ok(())
    }

    /// The demonstration county shipped with a fresh install
    pub fn demo() -> Self {
        let now = Utc::now();

        let users = [
            ("1", "John", "Smith", "Judge", "john.smith@county.gov", "Court of Common Pleas", "jsmith"),
            ("2", "Sarah", "Johnson", "District Attorney", "sarah.j@county.gov", "County District Attorney's Office", "sjohnson"),
            ("3", "Michael", "Brown", "Probation Officer", "m.brown@county.gov", "County Probation Department", "mbrown"),
            ("4", "Emily", "Davis", "Court Administrator", "emily.d@county.gov", "Court Administration", "edavis"),
            ("5", "Robert", "Wilson", "Case Manager", "r.wilson@county.gov", "County Pretrial Services", "rwilson"),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, (id, first, last, title, email, agency, username))| User {
            id: id.to_string(),
            profile: UserProfile {
                first_name: first.to_string(),
                last_name: last.to_string(),
                title: title.to_string(),
                email: email.to_string(),
                agency: agency.to_string(),
                phone: format!("(555) 123-456{}", i),
                username: username.to_string(),
                status: UserStatus::Active,
            },
        })
        .collect();

        let courts = vec![
            Court {
                id: "1".to_string(),
                name: "Magisterial District Court 15-1-01".to_string(),
                district_number: "15-1-01".to_string(),
                address: "123 Court Street, Philadelphia, PA".to_string(),
                created_at: now,
            },
            Court {
                id: "2".to_string(),
                name: "Magisterial District Court 15-1-02".to_string(),
                district_number: "15-1-02".to_string(),
                address: "456 Justice Ave, Philadelphia, PA".to_string(),
                created_at: now,
            },
        ];

        let defendant = MetadataField::new("defendant_name", "Defendant Name", FieldType::Text, true);
        let docket = MetadataField::new("docket_number", "Docket Number", FieldType::Text, true);

        let repositories = vec![
            DocumentRepository {
                id: "1".to_string(),
                name: "PSI Reports".to_string(),
                code: "psi".to_string(),
                metadata_fields: vec![
                    defendant.clone(),
                    docket.clone(),
                    MetadataField::new("sentencing_date", "Sentencing Date", FieldType::Date, false),
                ],
            },
            DocumentRepository {
                id: "2".to_string(),
                name: "Bail Reports".to_string(),
                code: "bail".to_string(),
                metadata_fields: vec![
                    defendant.clone(),
                    docket,
                    MetadataField::new("bail_amount", "Bail Amount", FieldType::Number, false),
                ],
            },
            DocumentRepository {
                id: "3".to_string(),
                name: "Social Summary Reports".to_string(),
                code: "social".to_string(),
                metadata_fields: vec![
                    defendant,
                    MetadataField::new("report_date", "Report Date", FieldType::Date, true),
                ],
            },
        ];

        Self {
            users,
            courts,
            repositories,
        }
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn courts(&self) -> &[Court] {
        &self.courts
    }

    pub fn repositories(&self) -> &[DocumentRepository] {
        &self.repositories
    }

    pub fn find_user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Users whose name, email or role contains `term` (case-insensitive)
    pub fn search_users(&self, term: &str) -> Vec<&User> {
        let needle = term.trim().to_lowercase();
        self.users.iter().filter(|u| u.matches(&needle)).collect()
    }

    pub fn add_user(&mut self, profile: UserProfile) -> Result<User, DirectoryError> {
        profile.validate()?;
        self.ensure_username_free(&profile.username, None)?;

        let user = User {
            id: self.next_id(),
            profile,
        };
        self.users.push(user.clone());
        Ok(user)
    }

    /// Replace every editable field of a user
    pub fn update_user(&mut self, id: &str, profile: UserProfile) -> Result<User, DirectoryError> {
        profile.validate()?;
        self.ensure_username_free(&profile.username, Some(id))?;

        let user = self
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| DirectoryError::UserNotFound(id.to_string()))?;
        user.profile = profile;
        Ok(user.clone())
    }

    pub fn remove_user(&mut self, id: &str) -> Result<User, DirectoryError> {
        let index = self
            .users
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| DirectoryError::UserNotFound(id.to_string()))?;
        Ok(self.users.remove(index))
    }

    pub fn find_court(&self, id: &str) -> Option<&Court> {
        self.courts.iter().find(|c| c.id == id)
    }

    pub fn add_court(&mut self, details: CourtDetails) -> Result<Court, DirectoryError> {
        details.validate()?;

        let court = Court {
            id: self.next_id(),
            name: details.name,
            district_number: details.district_number,
            address: details.address,
            created_at: Utc::now(),
        };
        self.courts.push(court.clone());
        Ok(court)
    }

    /// Update a court's fields; `created_at` is kept
    pub fn update_court(&mut self, id: &str, details: CourtDetails) -> Result<Court, DirectoryError> {
        details.validate()?;

        let court = self
            .courts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| DirectoryError::CourtNotFound(id.to_string()))?;
        court.name = details.name;
        court.district_number = details.district_number;
        court.address = details.address;
        Ok(court.clone())
    }

    pub fn remove_court(&mut self, id: &str) -> Result<Court, DirectoryError> {
        let index = self
            .courts
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| DirectoryError::CourtNotFound(id.to_string()))?;
        Ok(self.courts.remove(index))
    }

    pub fn repository_by_code(&self, code: &str) -> Option<&DocumentRepository> {
        self.repositories.iter().find(|r| r.code == code)
    }

    pub fn add_repository(
        &mut self,
        details: RepositoryDetails,
    ) -> Result<DocumentRepository, DirectoryError> {
        details.validate()?;
        self.ensure_code_free(&details.code, None)?;

        let repository = DocumentRepository {
            id: self.next_id(),
            name: details.name,
            code: details.code,
            metadata_fields: details.metadata_fields,
        };
        self.repositories.push(repository.clone());
        Ok(repository)
    }

    pub fn update_repository(
        &mut self,
        id: &str,
        details: RepositoryDetails,
    ) -> Result<DocumentRepository, DirectoryError> {
        details.validate()?;
        self.ensure_code_free(&details.code, Some(id))?;

        let repository = self
            .repositories
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| DirectoryError::RepositoryNotFound(id.to_string()))?;
        repository.name = details.name;
        repository.code = details.code;
        repository.metadata_fields = details.metadata_fields;
        Ok(repository.clone())
    }

    pub fn remove_repository(&mut self, id: &str) -> Result<DocumentRepository, DirectoryError> {
        let index = self
            .repositories
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| DirectoryError::RepositoryNotFound(id.to_string()))?;
        Ok(self.repositories.remove(index))
    }

    fn ensure_username_free(&self, username: &str, except: Option<&str>) -> Result<(), DirectoryError> {
        let taken = self.users.iter().any(|u| {
            Some(u.id.as_str()) != except && u.profile.username.eq_ignore_ascii_case(username.trim())
        });
        if taken {
            return Err(DirectoryError::DuplicateUsername(username.to_string()));
        }
        Ok(())
    }

    fn ensure_code_free(&self, code: &str, except: Option<&str>) -> Result<(), DirectoryError> {
        let taken = self
            .repositories
            .iter()
            .any(|r| Some(r.id.as_str()) != except && r.code == code);
        if taken {
            return Err(DirectoryError::DuplicateCode(code.to_string()));
        }
        Ok(())
    }

    /// Millisecond timestamp id, bumped past anything already issued
    fn next_id(&self) -> String {
        let mut candidate = Utc::now().timestamp_millis();
        while self.id_in_use(&candidate.to_string()) {
            candidate += 1;
        }
        candidate.to_string()
    }

    fn id_in_use(&self, id: &str) -> bool {
        self.users.iter().any(|u| u.id == id)
            || self.courts.iter().any(|c| c.id == id)
            || self.repositories.iter().any(|r| r.id == id)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), DirectoryError> {
    if value.trim().is_empty() {
        return Err(invalid(field, "is required"));
    }
    Ok(())
}

fn invalid(field: &'static str, reason: &str) -> DirectoryError {
    DirectoryError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

fn is_email(value: &str) -> bool {
    let value = value.trim();
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .map_or(false, |(host, tld)| !host.is_empty() && !tld.is_empty())
                && !domain.ends_with('.')
        }
        None => false,
    }
}
