//! docket - County access console
//!
//! Users, magisterial district courts, document repositories and the
//! permissions that tie them together.

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use access::{
    audit::{AuditEntry, AuditLog, AuditQuery},
    backend::{JsonFileBackend, PermissionBackend},
    catalog::ModuleCatalog,
    config::AccessConfig,
    matrix::AccessMatrix,
    record::{AccessFlags, Action, PermissionRecord},
    store::{demo_records, PermissionStore},
};
use docket_core::{
    CourtDetails, Directory, FieldType, MetadataField, Paths, RepositoryDetails, User, UserProfile,
    UserStatus,
};

/// docket - County access console
#[derive(Parser)]
#[command(name = "docket")]
#[command(version = "0.1.0")]
#[command(about = "County access console: users, courts, repositories and permissions")]
pub struct Cli {
    /// Data directory (overrides config and DOCKET_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// The four permission flags; unset flags are denied
#[derive(Args)]
struct FlagArgs {
    /// Can view and read
    #[arg(long)]
    view: bool,

    /// Can create or upload
    #[arg(long)]
    create: bool,

    /// Can modify existing entries
    #[arg(long)]
    edit: bool,

    /// Can remove entries
    #[arg(long)]
    delete: bool,

    /// Grant every action
    #[arg(long, conflicts_with_all = ["view", "create", "edit", "delete"])]
    all: bool,
}

impl FlagArgs {
    fn flags(&self) -> AccessFlags {
        if self.all {
            AccessFlags::FULL
        } else {
            AccessFlags::new(self.view, self.create, self.edit, self.delete)
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write default configuration and demonstration data
    Init {
        /// Overwrite existing config and data
        #[arg(long)]
        force: bool,
    },

    /// Grant (or fully replace) a user's access to a module
    Grant {
        /// User id
        user: String,

        /// Module code (repository code, users, county-config)
        module: String,

        /// Court id, required for court-foldered modules
        #[arg(long)]
        scope: Option<String>,

        #[command(flatten)]
        flags: FlagArgs,
    },

    /// Revoke a user's access to a module
    Revoke {
        user: String,
        module: String,
        #[arg(long)]
        scope: Option<String>,
    },

    /// Show a single permission
    Show {
        user: String,
        module: String,
        #[arg(long)]
        scope: Option<String>,
    },

    /// Check one action; exits 0 when allowed, 1 when denied
    Check {
        user: String,
        module: String,
        /// view, create, edit or delete
        action: String,
        #[arg(long)]
        scope: Option<String>,
    },

    /// Show a user's access across every module and court
    Matrix {
        user: String,
        #[arg(long)]
        json: bool,
    },

    /// List permission records
    List {
        /// Only this user's records
        user: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Manage users
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Manage magisterial district courts
    Courts {
        #[command(subcommand)]
        command: CourtCommands,
    },

    /// Manage document repositories
    Repos {
        #[command(subcommand)]
        command: RepoCommands,
    },

    /// List permission-addressable modules
    Modules {
        #[arg(long)]
        json: bool,
    },

    /// Query the permission change log
    Audit {
        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        module: Option<String>,

        /// Show entries since (e.g., "1h", "1d", "1w")
        #[arg(long)]
        since: Option<String>,

        #[arg(long, default_value = "20")]
        limit: usize,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// List users
    List {
        #[arg(long)]
        json: bool,
    },
    /// Search by name, email or role
    Search { term: String },
    /// Add a user
    Add {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        agency: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        inactive: bool,
    },
    /// Change a user's details; omitted fields keep their value
    Update {
        id: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        agency: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long, conflicts_with = "inactive")]
        active: bool,
        #[arg(long)]
        inactive: bool,
    },
    /// Remove a user and all of their permissions
    Remove { id: String },
}

#[derive(Subcommand)]
enum CourtCommands {
    /// List courts
    List,
    /// Add a court
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        district: String,
        #[arg(long)]
        address: String,
    },
    /// Change a court's details; omitted fields keep their value
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        district: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    /// Remove a court and every permission scoped to it
    Remove { id: String },
}

#[derive(Subcommand)]
enum RepoCommands {
    /// List repositories
    List,
    /// Add a repository
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        code: String,
        /// Metadata field as name:label:type[:required]
        #[arg(long = "field")]
        fields: Vec<String>,
    },
    /// Rename a repository or replace its metadata fields (the code is fixed)
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        /// Metadata field as name:label:type[:required]; replaces all fields
        #[arg(long = "field")]
        fields: Vec<String>,
    },
    /// Remove a repository and every permission on it
    Remove { id: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Commands::Init { force } = cli.command {
        return cmd_init(cli.data_dir, force);
    }

    let mut console = Console::open(cli.data_dir)?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Grant {
            user,
            module,
            scope,
            flags,
        } => cmd_grant(&mut console, &user, &module, scope.as_deref(), flags.flags()),
        Commands::Revoke {
            user,
            module,
            scope,
        } => cmd_revoke(&mut console, &user, &module, scope.as_deref()),
        Commands::Show {
            user,
            module,
            scope,
        } => cmd_show(&console, &user, &module, scope.as_deref()),
        Commands::Check {
            user,
            module,
            action,
            scope,
        } => cmd_check(&console, &user, &module, &action, scope.as_deref()),
        Commands::Matrix { user, json } => cmd_matrix(&console, &user, json),
        Commands::List { user, json } => cmd_list(&console, user.as_deref(), json),
        Commands::Users { command } => cmd_users(&mut console, command),
        Commands::Courts { command } => cmd_courts(&mut console, command),
        Commands::Repos { command } => cmd_repos(&mut console, command),
        Commands::Modules { json } => cmd_modules(&console, json),
        Commands::Audit {
            user,
            module,
            since,
            limit,
            json,
        } => cmd_audit(&console, user, module, since, limit, json),
    }
}

/// Everything a command needs, loaded once
struct Console {
    paths: Paths,
    directory: Directory,
    catalog: ModuleCatalog,
    store: PermissionStore<JsonFileBackend>,
    audit: Option<AuditLog>,
}

impl Console {
    fn open(data_dir: Option<PathBuf>) -> Result<Self> {
        let (paths, config) = resolve(data_dir)?;

        let directory = match Directory::load_from(&paths.directory())? {
            Some(directory) => directory,
            None if config.seed_demo_data => {
                let directory = Directory::demo();
                directory.save_to(&paths.directory())?;
                directory
            }
            None => Directory::default(),
        };

        let backend = JsonFileBackend::new(paths.permissions());
        let store = if config.seed_demo_data {
            PermissionStore::open_or_seed(backend, demo_records)
        } else {
            PermissionStore::open(backend)
        }
        .with_context(|| format!("Failed to open permissions at {:?}", paths.permissions()))?;

        let catalog = config.catalog(&directory);
        let audit = config
            .audit
            .enabled
            .then(|| AuditLog::with_path(paths.audit_log()));

        Ok(Self {
            paths,
            directory,
            catalog,
            store,
            audit,
        })
    }

    fn save_directory(&self) -> Result<()> {
        self.directory
            .save_to(&self.paths.directory())
            .context("Failed to save directory")
    }

    fn record(&self, entry: AuditEntry) {
        if let Some(audit) = &self.audit {
            audit.record(&entry);
        }
    }

    fn require_user(&self, id: &str) -> Result<&User> {
        match self.directory.find_user(id) {
            Some(user) => Ok(user),
            None => bail!("Unknown user: {}", id),
        }
    }

    /// Check module and court exist; returns the scope that will be stored
    fn require_target<'a>(&self, module: &str, scope: Option<&'a str>) -> Result<Option<&'a str>> {
        if !self.catalog.contains(module) {
            bail!("Unknown module: {} (see `docket modules`)", module);
        }
        if !self.catalog.is_scoped(module) {
            return Ok(None);
        }
        if let Some(court) = scope {
            if self.directory.find_court(court).is_none() {
                bail!("Unknown court: {}", court);
            }
        }
        Ok(scope)
    }

    fn describe(&self, module: &str, scope: Option<&str>) -> String {
        let name = self
            .catalog
            .get(module)
            .map_or(module.to_string(), |m| m.name.clone());
        match scope.and_then(|id| self.directory.find_court(id)) {
            Some(court) => format!("{} / {}", name, court.name),
            None => name,
        }
    }
}

fn resolve(data_dir: Option<PathBuf>) -> Result<(Paths, AccessConfig)> {
    let base = Paths::new();
    let config = AccessConfig::load(&base)?;
    let mut paths = config.resolve_paths(base);
    if let Some(dir) = data_dir {
        paths = paths.with_data_dir(dir);
    }
    Ok((paths, config))
}

fn cmd_init(data_dir: Option<PathBuf>, force: bool) -> Result<()> {
    let (paths, config) = resolve(data_dir)?;

    let config_path = paths.config_file("access");
    if config_path.exists() && !force {
        println!("Config already exists at {:?}", config_path);
    } else {
        config.save_to(&config_path)?;
        println!("Created default access config at {:?}", config_path);
    }

    let directory_path = paths.directory();
    let permissions_path = paths.permissions();
    if (directory_path.exists() || permissions_path.exists()) && !force {
        println!("Data already exists in {:?}", paths.data);
        println!("Use --force to reset it to the demonstration county");
        return Ok(());
    }

    Directory::demo().save_to(&directory_path)?;
    let records = demo_records();
    JsonFileBackend::new(permissions_path.clone()).save(&records)?;

    println!("Created demonstration directory at {:?}", directory_path);
    println!("Created {} permissions at {:?}", records.len(), permissions_path);
    Ok(())
}

fn cmd_grant(
    console: &mut Console,
    user: &str,
    module: &str,
    scope: Option<&str>,
    flags: AccessFlags,
) -> Result<()> {
    let name = console.require_user(user)?.name();
    let scope = console.require_target(module, scope)?;

    console
        .store
        .grant(&console.catalog, user, module, scope, flags)?;
    console.record(AuditEntry::grant(user, module, scope, flags));

    println!(
        "Granted {} to {} on {}",
        flags,
        name,
        console.describe(module, scope)
    );
    Ok(())
}

fn cmd_revoke(console: &mut Console, user: &str, module: &str, scope: Option<&str>) -> Result<()> {
    let name = console.require_user(user)?.name();
    let scope = console.require_target(module, scope)?;

    if console.store.revoke(&console.catalog, user, module, scope)? {
        console.record(AuditEntry::revoke(user, module, scope));
        println!("Revoked {}'s access to {}", name, console.describe(module, scope));
    } else {
        println!("{} has no access to {}", name, console.describe(module, scope));
    }
    Ok(())
}

fn cmd_show(console: &Console, user: &str, module: &str, scope: Option<&str>) -> Result<()> {
    let name = console.require_user(user)?.name();
    let scope = console.require_target(module, scope)?;

    match console.store.lookup(&console.catalog, user, module, scope) {
        Some(record) => println!("{} on {}: {}", name, console.describe(module, scope), record.flags),
        None => println!("{} on {}: no access", name, console.describe(module, scope)),
    }
    Ok(())
}

fn cmd_check(
    console: &Console,
    user: &str,
    module: &str,
    action: &str,
    scope: Option<&str>,
) -> Result<()> {
    let Some(action) = Action::from_str(action) else {
        bail!("Unknown action: {} (expected view, create, edit or delete)", action);
    };
    console.require_user(user)?;
    let scope = console.require_target(module, scope)?;

    if console.store.check(&console.catalog, user, module, scope, action) {
        println!("ALLOW: {} {} {}", user, action, console.describe(module, scope));
        std::process::exit(0);
    } else {
        println!("DENY: {} {} {}", user, action, console.describe(module, scope));
        std::process::exit(1);
    }
}

fn cmd_matrix(console: &Console, user: &str, json_output: bool) -> Result<()> {
    let person = console.require_user(user)?;
    let matrix = AccessMatrix::build(
        &console.store,
        &console.catalog,
        console.directory.courts(),
        user,
    );

    if json_output {
        println!("{}", serde_json::to_string_pretty(&matrix)?);
        return Ok(());
    }

    println!("{} ({} - {})", person.name(), person.role(), person.email());
    println!(
        "{} of {} entries granted",
        matrix.granted().count(),
        matrix.entries.len()
    );
    println!();
    println!(
        "{:<26} {:<36} {:<6} {:<7} {:<6} {}",
        "MODULE", "COURT", "VIEW", "CREATE", "EDIT", "DELETE"
    );
    println!("{}", "-".repeat(94));

    for entry in &matrix.entries {
        let mark = |allowed: bool| if allowed { "yes" } else { "-" };
        println!(
            "{:<26} {:<36} {:<6} {:<7} {:<6} {}",
            truncate(&entry.module_name, 24),
            truncate(entry.scope_name.as_deref().unwrap_or(""), 34),
            mark(entry.flags.can_view),
            mark(entry.flags.can_create),
            mark(entry.flags.can_edit),
            mark(entry.flags.can_delete),
        );
    }

    Ok(())
}

fn cmd_list(console: &Console, user: Option<&str>, json_output: bool) -> Result<()> {
    let records: Vec<&PermissionRecord> = match user {
        Some(id) => console.store.list_for_user(id),
        None => console.store.records().iter().collect(),
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    println!("{:<16} {:<16} {:<10} {}", "USER", "MODULE", "COURT", "FLAGS");
    println!("{}", "-".repeat(60));
    for record in records {
        println!(
            "{:<16} {:<16} {:<10} {}",
            truncate(&record.user_id, 14),
            truncate(&record.module_key, 14),
            record.scope_key.as_deref().unwrap_or("-"),
            record.flags
        );
    }
    Ok(())
}

fn cmd_users(console: &mut Console, command: UserCommands) -> Result<()> {
    match command {
        UserCommands::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(console.directory.users())?);
                return Ok(());
            }
            print_users(&*console, console.directory.users().iter());
        }
        UserCommands::Search { term } => {
            let found = console.directory.search_users(&term);
            if found.is_empty() {
                println!("No users match '{}'", term);
            } else {
                print_users(&*console, found.into_iter());
            }
        }
        UserCommands::Add {
            first_name,
            last_name,
            title,
            email,
            agency,
            phone,
            username,
            inactive,
        } => {
            let profile = UserProfile {
                first_name,
                last_name,
                title,
                email,
                agency,
                phone,
                username,
                status: if inactive {
                    UserStatus::Inactive
                } else {
                    UserStatus::Active
                },
            };
            let user = console.directory.add_user(profile)?;
            console.save_directory()?;
            println!("Added user {} ({})", user.name(), user.id);
        }
        UserCommands::Update {
            id,
            first_name,
            last_name,
            title,
            email,
            agency,
            phone,
            username,
            active,
            inactive,
        } => {
            let mut profile = console.require_user(&id)?.profile.clone();
            if let Some(value) = first_name {
                profile.first_name = value;
            }
            if let Some(value) = last_name {
                profile.last_name = value;
            }
            if let Some(value) = title {
                profile.title = value;
            }
            if let Some(value) = email {
                profile.email = value;
            }
            if let Some(value) = agency {
                profile.agency = value;
            }
            if let Some(value) = phone {
                profile.phone = value;
            }
            if let Some(value) = username {
                profile.username = value;
            }
            if active {
                profile.status = UserStatus::Active;
            } else if inactive {
                profile.status = UserStatus::Inactive;
            }

            let user = console.directory.update_user(&id, profile)?;
            console.save_directory()?;
            println!("Updated user {} ({})", user.name(), user.id);
        }
        UserCommands::Remove { id } => {
            let user = console.require_user(&id)?.clone();
            // Directory changes only after the permissions are written
            let purged = console.store.purge_user(&id)?;
            console.directory.remove_user(&id)?;
            console
                .save_directory()
                .with_context(|| format!("{} permission(s) of {} already removed", purged, user.name()))?;
            println!("Removed user {} and {} permission(s)", user.name(), purged);
        }
    }
    Ok(())
}

fn print_users<'a>(console: &Console, users: impl Iterator<Item = &'a User>) {
    println!(
        "{:<14} {:<20} {:<22} {:<28} {:<9} {}",
        "ID", "NAME", "ROLE", "EMAIL", "STATUS", "PERMS"
    );
    println!("{}", "-".repeat(100));
    for user in users {
        let status = match user.profile.status {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        };
        println!(
            "{:<14} {:<20} {:<22} {:<28} {:<9} {}",
            user.id,
            truncate(&user.name(), 18),
            truncate(user.role(), 20),
            truncate(user.email(), 26),
            status,
            console.store.list_for_user(&user.id).len()
        );
    }
}

fn cmd_courts(console: &mut Console, command: CourtCommands) -> Result<()> {
    match command {
        CourtCommands::List => {
            println!("{:<14} {:<36} {:<10} {}", "ID", "NAME", "DISTRICT", "ADDRESS");
            println!("{}", "-".repeat(90));
            for court in console.directory.courts() {
                println!(
                    "{:<14} {:<36} {:<10} {}",
                    court.id,
                    truncate(&court.name, 34),
                    court.district_number,
                    court.address
                );
            }
        }
        CourtCommands::Add {
            name,
            district,
            address,
        } => {
            let court = console.directory.add_court(CourtDetails {
                name,
                district_number: district,
                address,
            })?;
            console.save_directory()?;
            println!("Added court {} ({})", court.name, court.id);
        }
        CourtCommands::Update {
            id,
            name,
            district,
            address,
        } => {
            let Some(current) = console.directory.find_court(&id) else {
                bail!("Unknown court: {}", id);
            };
            let details = CourtDetails {
                name: name.unwrap_or_else(|| current.name.clone()),
                district_number: district.unwrap_or_else(|| current.district_number.clone()),
                address: address.unwrap_or_else(|| current.address.clone()),
            };
            let court = console.directory.update_court(&id, details)?;
            console.save_directory()?;
            println!("Updated court {} ({})", court.name, court.id);
        }
        CourtCommands::Remove { id } => {
            let Some(court) = console.directory.find_court(&id).cloned() else {
                bail!("Unknown court: {}", id);
            };
            let catalog = &console.catalog;
            let purged = console.store.purge_where(|r| {
                catalog.is_scoped(&r.module_key) && r.scope_key.as_deref() == Some(id.as_str())
            })?;
            console.directory.remove_court(&id)?;
            console
                .save_directory()
                .with_context(|| format!("{} permission(s) on {} already removed", purged, court.name))?;
            println!("Removed court {} and {} permission(s)", court.name, purged);
        }
    }
    Ok(())
}

fn cmd_repos(console: &mut Console, command: RepoCommands) -> Result<()> {
    match command {
        RepoCommands::List => {
            println!("{:<14} {:<10} {:<28} {}", "ID", "CODE", "NAME", "FIELDS");
            println!("{}", "-".repeat(80));
            for repo in console.directory.repositories() {
                let fields: Vec<String> = repo
                    .metadata_fields
                    .iter()
                    .map(|f| {
                        if f.required {
                            format!("{}*", f.name)
                        } else {
                            f.name.clone()
                        }
                    })
                    .collect();
                println!(
                    "{:<14} {:<10} {:<28} {}",
                    repo.id,
                    repo.code,
                    truncate(&repo.name, 26),
                    fields.join(", ")
                );
            }
        }
        RepoCommands::Add { name, code, fields } => {
            let metadata_fields = fields
                .iter()
                .map(|raw| parse_field(raw))
                .collect::<Result<Vec<_>>>()?;
            let repo = console.directory.add_repository(RepositoryDetails {
                name,
                code,
                metadata_fields,
            })?;
            console.save_directory()?;
            println!("Added repository {} (code: {})", repo.name, repo.code);
        }
        RepoCommands::Update { id, name, fields } => {
            let Some(current) = console.directory.repositories().iter().find(|r| r.id == id) else {
                bail!("Unknown repository: {}", id);
            };
            let metadata_fields = if fields.is_empty() {
                current.metadata_fields.clone()
            } else {
                fields
                    .iter()
                    .map(|raw| parse_field(raw))
                    .collect::<Result<Vec<_>>>()?
            };
            let details = RepositoryDetails {
                name: name.unwrap_or_else(|| current.name.clone()),
                code: current.code.clone(),
                metadata_fields,
            };
            let repo = console.directory.update_repository(&id, details)?;
            console.save_directory()?;
            println!("Updated repository {} (code: {})", repo.name, repo.code);
        }
        RepoCommands::Remove { id } => {
            let Some(repo) = console.directory.repositories().iter().find(|r| r.id == id).cloned()
            else {
                bail!("Unknown repository: {}", id);
            };
            let purged = console.store.purge_where(|r| r.module_key == repo.code)?;
            console.directory.remove_repository(&id)?;
            console
                .save_directory()
                .with_context(|| format!("{} permission(s) on {} already removed", purged, repo.name))?;
            println!("Removed repository {} and {} permission(s)", repo.name, purged);
        }
    }
    Ok(())
}

fn cmd_modules(console: &Console, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(console.catalog.modules())?);
        return Ok(());
    }

    println!("{:<16} {:<28} {}", "CODE", "NAME", "SCOPE");
    println!("{}", "-".repeat(56));
    for module in console.catalog.modules() {
        let scope = if module.scoped { "court" } else { "-" };
        println!("{:<16} {:<28} {}", module.code, module.name, scope);
    }
    Ok(())
}

fn cmd_audit(
    console: &Console,
    user: Option<String>,
    module: Option<String>,
    since: Option<String>,
    limit: usize,
    json_output: bool,
) -> Result<()> {
    let audit = AuditLog::with_path(console.paths.audit_log());

    let mut query = AuditQuery::default().limit(limit);
    if let Some(id) = user {
        query = query.user(&id);
    }
    if let Some(code) = module {
        query = query.module(&code);
    }
    if let Some(since_str) = since {
        query = query.since(parse_duration(&since_str)?);
    }

    let entries = audit.query(query)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!(
        "{:<18} {:<8} {:<14} {:<16} {:<8} {}",
        "TIMESTAMP", "CHANGE", "USER", "MODULE", "COURT", "FLAGS"
    );
    println!("{}", "-".repeat(80));
    for entry in entries {
        let change = match entry.kind {
            access::ChangeKind::Grant => "GRANT",
            access::ChangeKind::Revoke => "REVOKE",
        };
        let flags = entry.flags.map_or("-".to_string(), |f| f.to_string());
        println!(
            "{:<18} {:<8} {:<14} {:<16} {:<8} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            change,
            truncate(&entry.user_id, 12),
            truncate(&entry.module_key, 14),
            entry.scope_key.as_deref().unwrap_or("-"),
            flags
        );
    }
    Ok(())
}

/// Parse "name:label:type[:required]"
fn parse_field(raw: &str) -> Result<MetadataField> {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() < 3 || parts.len() > 4 {
        bail!("Invalid field '{}': expected name:label:type[:required]", raw);
    }

    let field_type = match parts[2].to_lowercase().as_str() {
        "text" => FieldType::Text,
        "number" => FieldType::Number,
        "date" => FieldType::Date,
        "select" => FieldType::Select,
        other => bail!("Unknown field type: {}", other),
    };
    let required = match parts.get(3) {
        None => false,
        Some(&"required") => true,
        Some(other) => bail!("Expected 'required', got '{}'", other),
    };

    Ok(MetadataField::new(parts[0], parts[1], field_type, required))
}

/// Parse a duration string like "1h", "1d", "1w" into a DateTime
fn parse_duration(s: &str) -> Result<chrono::DateTime<Utc>> {
    let s = s.trim();
    let Some((split, _)) = s.char_indices().last().filter(|(i, _)| *i > 0) else {
        bail!("Invalid duration: {}", s);
    };
    let (num, unit) = s.split_at(split);
    let num: i64 = num
        .parse()
        .with_context(|| format!("Invalid duration: {}", s))?;

    let duration = match unit {
        "h" => Duration::try_hours(num),
        "d" => Duration::try_days(num),
        "w" => Duration::try_weeks(num),
        "m" => Duration::try_minutes(num),
        _ => bail!("Unknown duration unit: {}", unit),
    };

    duration
        .and_then(|d| Utc::now().checked_sub_signed(d))
        .with_context(|| format!("Duration out of range: {}", s))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_field() {
        let field = parse_field("docket_number:Docket Number:text:required").unwrap();
        assert_eq!(field.name, "docket_number");
        assert_eq!(field.label, "Docket Number");
        assert_eq!(field.field_type, FieldType::Text);
        assert!(field.required);

        assert!(!parse_field("filed:Filed On:date").unwrap().required);
        assert!(parse_field("filed:Filed On").is_err());
        assert!(parse_field("filed:Filed On:blob").is_err());
        assert!(parse_field("filed:Filed On:date:maybe").is_err());
    }

    #[test]
    fn test_parse_duration() {
        let since = parse_duration("2h").unwrap();
        assert!(since < Utc::now() - Duration::minutes(119));
        assert!(parse_duration("3y").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("1é").is_err());
        assert!(parse_duration("é").is_err());
        assert!(parse_duration("9999999999999999w").is_err());
    }

    #[test]
    fn test_flag_args() {
        let args = FlagArgs {
            view: true,
            create: false,
            edit: true,
            delete: false,
            all: false,
        };
        assert_eq!(args.flags(), AccessFlags::new(true, false, true, false));

        let all = FlagArgs {
            view: false,
            create: false,
            edit: false,
            delete: false,
            all: true,
        };
        assert_eq!(all.flags(), AccessFlags::FULL);
    }

    fn console(temp: &TempDir) -> Console {
        let paths = Paths::rooted(temp.path());
        let directory = Directory::demo();
        directory.save_to(&paths.directory()).unwrap();
        let store =
            PermissionStore::open_or_seed(JsonFileBackend::new(paths.permissions()), demo_records)
                .unwrap();
        let catalog = ModuleCatalog::from_directory(&directory, ["bail"]);
        Console {
            paths,
            directory,
            catalog,
            store,
            audit: None,
        }
    }

    #[test]
    fn test_update_user_keeps_omitted_fields() {
        let temp = TempDir::new().unwrap();
        let mut console = console(&temp);

        cmd_users(
            &mut console,
            UserCommands::Update {
                id: "2".to_string(),
                first_name: None,
                last_name: Some("Johnson-Lee".to_string()),
                title: None,
                email: None,
                agency: None,
                phone: None,
                username: None,
                active: false,
                inactive: true,
            },
        )
        .unwrap();

        let saved = Directory::load_from(&console.paths.directory()).unwrap().unwrap();
        let user = saved.find_user("2").unwrap();
        assert_eq!(user.name(), "Sarah Johnson-Lee");
        assert_eq!(user.role(), "District Attorney");
        assert_eq!(user.profile.status, UserStatus::Inactive);
    }

    #[test]
    fn test_update_court_and_repository() {
        let temp = TempDir::new().unwrap();
        let mut console = console(&temp);

        cmd_courts(
            &mut console,
            CourtCommands::Update {
                id: "1".to_string(),
                name: None,
                district: None,
                address: Some("1 Market Street, Philadelphia, PA".to_string()),
            },
        )
        .unwrap();
        cmd_repos(
            &mut console,
            RepoCommands::Update {
                id: "1".to_string(),
                name: Some("Presentence Investigations".to_string()),
                fields: vec!["docket_number:Docket Number:text:required".to_string()],
            },
        )
        .unwrap();

        let saved = Directory::load_from(&console.paths.directory()).unwrap().unwrap();
        let court = saved.find_court("1").unwrap();
        assert_eq!(court.district_number, "15-1-01");
        assert_eq!(court.address, "1 Market Street, Philadelphia, PA");

        let repo = saved.repository_by_code("psi").unwrap();
        assert_eq!(repo.name, "Presentence Investigations");
        assert_eq!(repo.metadata_fields.len(), 1);

        assert!(cmd_courts(
            &mut console,
            CourtCommands::Update {
                id: "9".to_string(),
                name: None,
                district: None,
                address: None,
            },
        )
        .is_err());
    }

    #[test]
    fn test_remove_user_purges_permissions() {
        let temp = TempDir::new().unwrap();
        let mut console = console(&temp);

        cmd_users(&mut console, UserCommands::Remove { id: "1".to_string() }).unwrap();

        let saved = Directory::load_from(&console.paths.directory()).unwrap().unwrap();
        assert!(saved.find_user("1").is_none());
        let reopened = PermissionStore::open(JsonFileBackend::new(console.paths.permissions())).unwrap();
        assert!(reopened.list_for_user("1").is_empty());
    }

    #[test]
    fn test_remove_user_keeps_directory_when_permissions_fail() {
        let temp = TempDir::new().unwrap();
        let mut console = console(&temp);

        // A directory where the permissions file should be makes the write fail
        let permissions = console.paths.permissions();
        std::fs::remove_file(&permissions).unwrap();
        std::fs::create_dir(&permissions).unwrap();

        assert!(cmd_users(&mut console, UserCommands::Remove { id: "1".to_string() }).is_err());

        assert!(console.directory.find_user("1").is_some());
        let saved = Directory::load_from(&console.paths.directory()).unwrap().unwrap();
        assert!(saved.find_user("1").is_some());
    }

    #[test]
    fn test_remove_court_purges_scoped_permissions() {
        let temp = TempDir::new().unwrap();
        let mut console = console(&temp);

        cmd_courts(&mut console, CourtCommands::Remove { id: "1".to_string() }).unwrap();

        assert!(console.directory.find_court("1").is_none());
        assert!(console.store.list_for_user("3").is_empty());
        assert_eq!(console.store.list_for_user("1").len(), 3);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Magisterial District", 5), "Magis...");
    }
}
