//! `rep` - command-line client for the SIO document repository.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use reqwest::Method;
use serde_json::Value;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sio_core::crypto::{aead, file_handle, normalize_public_key_pem};
use sio_core::protocol::{
    AclChange, AclOperation, ActivationState, CreateOrganization, DateFilter, DeletedFile,
    DocumentMetadata, DocumentQuery, DocumentRef, DocumentSummary, NewDocument, NewSubject,
    Permission, PermissionRequest, RoleListing, RolePermissionChange, RoleRequest,
    RoleSubjectChange, StatusMessage, SubjectQuery, SubjectStateChange, UsernameRequest,
    DATE_FORMAT,
};
use sio_cli::local::{self, EncryptionMetadata};
use sio_cli::{ClientState, RepositoryClient, SessionFile};

#[derive(Parser)]
#[command(name = "rep")]
#[command(version, about = "SIO repository client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Repository public key file (overrides REP_PUB_KEY)
    #[arg(short, long, global = true)]
    key: Option<PathBuf>,

    /// Repository address (overrides REP_ADDRESS)
    #[arg(short, long, global = true)]
    repo: Option<String>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive a subject key pair from a password and store its public key
    SubjectCredentials {
        password: String,
        credentials_file: PathBuf,
    },

    /// Decrypt a downloaded file using its document metadata
    DecryptFile {
        encrypted_file: PathBuf,
        metadata: PathBuf,
    },

    /// Create an organization and its first subject
    CreateOrg {
        organization: String,
        username: String,
        name: String,
        email: String,
        public_key_file: PathBuf,
    },

    /// List all organizations
    ListOrgs,

    /// Open a session and store its context in a file
    CreateSession {
        organization: String,
        username: String,
        password: String,
        credentials_file: PathBuf,
        session_file: PathBuf,
    },

    /// Download an encrypted file by handle (stdout unless a file is given)
    GetFile {
        file_handle: String,
        file: Option<PathBuf>,
    },

    /// Assume a role in the session
    AssumeRole { session_file: PathBuf, role: String },

    /// Release a role assumed in the session
    DropRole { session_file: PathBuf, role: String },

    /// List the roles assumed in the session
    ListRoles { session_file: PathBuf },

    /// List subjects and their state, or one subject
    ListSubjects {
        session_file: PathBuf,
        username: Option<String>,
    },

    /// List the subjects of a role
    ListRoleSubjects { session_file: PathBuf, role: String },

    /// List the roles of a subject
    ListSubjectRoles {
        session_file: PathBuf,
        username: String,
    },

    /// List the permissions of a role
    ListRolePermissions { session_file: PathBuf, role: String },

    /// List the roles holding a permission
    ListPermissionRoles {
        session_file: PathBuf,
        permission: String,
    },

    /// List documents, optionally by creator and date
    ListDocs {
        session_file: PathBuf,

        /// Only documents created by this subject
        #[arg(short = 's', long = "subject")]
        username: Option<String>,

        /// Date filter: nt (newer than), ot (older than) or et (equal to), then DD-MM-YYYY
        #[arg(short = 'd', long = "date", num_args = 2, value_names = ["FILTER", "DATE"])]
        date: Option<Vec<String>>,
    },

    /// Add a subject (requires SUBJECT_NEW)
    AddSubject {
        session_file: PathBuf,
        username: String,
        name: String,
        email: String,
        credentials_file: PathBuf,
    },

    /// Suspend a subject (requires SUBJECT_DOWN)
    SuspendSubject {
        session_file: PathBuf,
        username: String,
    },

    /// Activate a subject (requires SUBJECT_UP)
    ActivateSubject {
        session_file: PathBuf,
        username: String,
    },

    /// Add a role (requires ROLE_NEW)
    AddRole { session_file: PathBuf, role: String },

    /// Suspend a role (requires ROLE_DOWN)
    SuspendRole { session_file: PathBuf, role: String },

    /// Reactivate a role (requires ROLE_UP)
    ReactivateRole { session_file: PathBuf, role: String },

    /// Grant a permission to a role, or add a subject to it (requires ROLE_MOD)
    AddPermission {
        session_file: PathBuf,
        role: String,
        /// Permission name or username
        target: String,
    },

    /// Revoke a permission from a role, or remove a subject from it (requires ROLE_MOD)
    RemovePermission {
        session_file: PathBuf,
        role: String,
        /// Permission name or username
        target: String,
    },

    /// Encrypt and upload a document (requires DOC_NEW)
    AddDoc {
        session_file: PathBuf,
        name: String,
        file: PathBuf,
    },

    /// Show document metadata, including its key (requires DOC_READ)
    GetDocMetadata { session_file: PathBuf, name: String },

    /// Download and decrypt a document (requires DOC_READ)
    GetDocFile {
        session_file: PathBuf,
        name: String,
        file: Option<PathBuf>,
    },

    /// Detach a document's file (requires DOC_DELETE)
    DeleteDoc { session_file: PathBuf, name: String },

    /// Add (+) or remove (-) a document permission for a role (requires DOC_ACL)
    AclDoc {
        session_file: PathBuf,
        name: String,
        operation: String,
        role: String,
        permission: String,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

fn write_output(file: Option<&Path>, contents: &[u8]) -> Result<()> {
    match file {
        Some(path) => fs::write(path, contents)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(contents)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn print_map<V: std::fmt::Display>(map: &BTreeMap<String, V>) {
    for (key, value) in map {
        println!("{}: {}", key, value);
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_public_key(path: &Path) -> Result<String> {
    let pem = fs::read_to_string(path)
        .with_context(|| format!("Failed to read public key file: {}", path.display()))?;
    normalize_public_key_pem(&pem)
        .with_context(|| format!("Not a PEM public key: {}", path.display()))
}

/// Permission names go to the role-permission endpoint, anything else is a username.
fn role_change(role: &str, target: &str) -> Result<(&'static str, Value)> {
    let change = match Permission::from_str(target) {
        Ok(permission) => (
            "/organizations/roles/permissions",
            serde_json::to_value(RolePermissionChange {
                role: role.to_string(),
                permission,
            })?,
        ),
        Err(_) => (
            "/organizations/roles/subjects",
            serde_json::to_value(RoleSubjectChange {
                role: role.to_string(),
                username: target.to_string(),
            })?,
        ),
    };
    Ok(change)
}

fn document_query(username: Option<String>, date: Option<Vec<String>>) -> Result<DocumentQuery> {
    let (date_filter, date_str) = match date.as_deref() {
        Some([filter, date]) => {
            let filter = DateFilter::from_str(filter)
                .map_err(|_| anyhow::anyhow!("Date filter must be nt, ot or et, got '{}'", filter))?;
            NaiveDate::parse_from_str(date, DATE_FORMAT)
                .with_context(|| format!("Date must be DD-MM-YYYY, got '{}'", date))?;
            (Some(filter), Some(date.clone()))
        }
        Some(_) => anyhow::bail!("Date filter takes a filter and a date"),
        None => (None, None),
    };
    Ok(DocumentQuery {
        creator: username,
        date_filter,
        date_str,
    })
}

async fn run(command: Commands, state: &ClientState) -> Result<()> {
    let client = || -> Result<RepositoryClient> {
        Ok(RepositoryClient::new(
            state.address()?,
            state.repository_key().ok(),
        ))
    };

    match command {
        Commands::SubjectCredentials {
            password,
            credentials_file,
        } => {
            local::subject_credentials(&password, &credentials_file)?;
        }

        Commands::DecryptFile {
            encrypted_file,
            metadata,
        } => {
            let plaintext = local::decrypt_file(&encrypted_file, &metadata)?;
            write_output(None, &plaintext)?;
        }

        Commands::CreateOrg {
            organization,
            username,
            name,
            email,
            public_key_file,
        } => {
            state.repository_key()?;
            let request = CreateOrganization {
                organization,
                username,
                name,
                email,
                public_key: read_public_key(&public_key_file)?,
            };
            let created = client()?.create_organization(&request).await?;
            print_json(&created)?;
        }

        Commands::ListOrgs => {
            for organization in client()?.list_organizations().await? {
                println!("{}", organization.name);
            }
        }

        Commands::CreateSession {
            organization,
            username,
            password,
            credentials_file,
            session_file,
        } => {
            state.repository_key()?;
            if credentials_file.is_file() {
                let stored = read_public_key(&credentials_file)?;
                let derived = local::subject_public_key(&password)?;
                if stored != derived {
                    anyhow::bail!(
                        "Password does not match the credentials in {}",
                        credentials_file.display()
                    );
                }
            }
            let (info, grant) = client()?
                .create_session(&organization, &username, &password)
                .await?;
            SessionFile::create(&session_file, info)?;
            tracing::debug!(path = %session_file.display(), "Session stored");
            print_json(&grant)?;
        }

        Commands::GetFile { file_handle, file } => {
            state.repository_key()?;
            let blob = client()?.get_file(&file_handle).await?;
            write_output(file.as_deref(), &blob)?;
        }

        Commands::AssumeRole { session_file, role } => {
            let mut session = SessionFile::open(session_file)?;
            let reply: StatusMessage = client()?
                .session_call(&mut session, Method::POST, "/sessions/roles", &RoleRequest { role: role.clone() })
                .await?;
            if session.add_role(&role) {
                session.save()?;
            }
            println!("{}", reply.state);
        }

        Commands::DropRole { session_file, role } => {
            let mut session = SessionFile::open(session_file)?;
            let reply: StatusMessage = client()?
                .session_call(&mut session, Method::DELETE, "/sessions/roles", &RoleRequest { role: role.clone() })
                .await?;
            if session.remove_role(&role) {
                session.save()?;
            }
            println!("{}", reply.state);
        }

        Commands::ListRoles { session_file } => {
            let mut session = SessionFile::open(session_file)?;
            let listing: RoleListing = client()?
                .session_call(&mut session, Method::GET, "/sessions/roles", &serde_json::json!({}))
                .await?;
            for role in listing.roles {
                println!("{}", role);
            }
        }

        Commands::ListSubjects {
            session_file,
            username,
        } => {
            let mut session = SessionFile::open(session_file)?;
            let states: BTreeMap<String, ActivationState> = client()?
                .session_call(
                    &mut session,
                    Method::GET,
                    "/organizations/subjects/state",
                    &SubjectQuery { username },
                )
                .await?;
            print_map(&states);
        }

        Commands::ListRoleSubjects { session_file, role } => {
            let mut session = SessionFile::open(session_file)?;
            let states: BTreeMap<String, ActivationState> = client()?
                .session_call(&mut session, Method::GET, "/organizations/roles/subjects", &RoleRequest { role })
                .await?;
            print_map(&states);
        }

        Commands::ListSubjectRoles {
            session_file,
            username,
        } => {
            let mut session = SessionFile::open(session_file)?;
            let states: BTreeMap<String, ActivationState> = client()?
                .session_call(
                    &mut session,
                    Method::GET,
                    "/organizations/subjects/roles",
                    &UsernameRequest { username },
                )
                .await?;
            print_map(&states);
        }

        Commands::ListRolePermissions { session_file, role } => {
            let mut session = SessionFile::open(session_file)?;
            let permissions: BTreeMap<String, Value> = client()?
                .session_call(&mut session, Method::GET, "/organizations/roles/permissions", &RoleRequest { role })
                .await?;
            print_map(&permissions);
        }

        Commands::ListPermissionRoles {
            session_file,
            permission,
        } => {
            let permission = Permission::from_str(&permission)
                .map_err(|_| anyhow::anyhow!("Unknown permission '{}'", permission))?;
            let mut session = SessionFile::open(session_file)?;
            let roles: BTreeMap<String, Value> = client()?
                .session_call(
                    &mut session,
                    Method::GET,
                    "/organizations/permissions/roles",
                    &PermissionRequest { permission },
                )
                .await?;
            print_map(&roles);
        }

        Commands::ListDocs {
            session_file,
            username,
            date,
        } => {
            let query = document_query(username, date)?;
            let mut session = SessionFile::open(session_file)?;
            let documents: Vec<DocumentSummary> = client()?
                .session_call(&mut session, Method::GET, "/organizations/documents", &query)
                .await?;
            print_json(&documents)?;
        }

        Commands::AddSubject {
            session_file,
            username,
            name,
            email,
            credentials_file,
        } => {
            let subject = NewSubject {
                username,
                name,
                email,
                public_key: read_public_key(&credentials_file)?,
            };
            let mut session = SessionFile::open(session_file)?;
            let reply: StatusMessage = client()?
                .session_call(&mut session, Method::POST, "/organizations/subjects", &subject)
                .await?;
            println!("{}", reply.state);
        }

        Commands::SuspendSubject {
            session_file,
            username,
        } => {
            set_subject_state(session_file, username, ActivationState::Suspended, client()?).await?;
        }

        Commands::ActivateSubject {
            session_file,
            username,
        } => {
            set_subject_state(session_file, username, ActivationState::Active, client()?).await?;
        }

        Commands::AddRole { session_file, role } => {
            role_command(session_file, Method::POST, "/organizations/roles", role, client()?).await?;
        }

        Commands::SuspendRole { session_file, role } => {
            role_command(session_file, Method::PUT, "/organizations/roles/suspend", role, client()?).await?;
        }

        Commands::ReactivateRole { session_file, role } => {
            role_command(session_file, Method::PUT, "/organizations/roles/reactivate", role, client()?).await?;
        }

        Commands::AddPermission {
            session_file,
            role,
            target,
        } => {
            let (path, payload) = role_change(&role, &target)?;
            let mut session = SessionFile::open(session_file)?;
            let reply: StatusMessage = client()?
                .session_call(&mut session, Method::POST, path, &payload)
                .await?;
            println!("{}", reply.state);
        }

        Commands::RemovePermission {
            session_file,
            role,
            target,
        } => {
            let (path, payload) = role_change(&role, &target)?;
            let mut session = SessionFile::open(session_file)?;
            let reply: StatusMessage = client()?
                .session_call(&mut session, Method::DELETE, path, &payload)
                .await?;
            println!("{}", reply.state);
        }

        Commands::AddDoc {
            session_file,
            name,
            file,
        } => {
            let contents = fs::read(&file)
                .with_context(|| format!("Failed to read document file: {}", file.display()))?;
            let key = aead::generate_key();
            let blob = aead::seal_blob(&key, &contents)?;
            let document = NewDocument {
                encryption_file: BASE64.encode(blob),
                file_handle: file_handle(&contents),
                name,
                key: hex::encode(key),
                alg: aead::ALGORITHM.to_string(),
            };
            let mut session = SessionFile::open(session_file)?;
            let reply: StatusMessage = client()?
                .session_call(&mut session, Method::POST, "/organizations/documents", &document)
                .await?;
            println!("{}", reply.state);
        }

        Commands::GetDocMetadata { session_file, name } => {
            let mut session = SessionFile::open(session_file)?;
            let metadata = document_metadata(&client()?, &mut session, name).await?;
            print_json(&metadata)?;
        }

        Commands::GetDocFile {
            session_file,
            name,
            file,
        } => {
            state.repository_key()?;
            let client = client()?;
            let mut session = SessionFile::open(session_file)?;
            let metadata = document_metadata(&client, &mut session, name).await?;
            let handle = metadata
                .file_handle
                .context("This document has no file (it was deleted)")?;
            let blob = client.get_file(&handle).await?;
            let plaintext = local::decrypt_document(
                &EncryptionMetadata {
                    key: metadata.key,
                    alg: metadata.alg,
                },
                &blob,
                &handle,
            )?;
            write_output(file.as_deref(), &plaintext)?;
        }

        Commands::DeleteDoc { session_file, name } => {
            let mut session = SessionFile::open(session_file)?;
            let deleted: DeletedFile = client()?
                .session_call(
                    &mut session,
                    Method::DELETE,
                    "/organizations/documents/",
                    &DocumentRef {
                        document_name: name,
                    },
                )
                .await?;
            print_json(&deleted)?;
        }

        Commands::AclDoc {
            session_file,
            name,
            operation,
            role,
            permission,
        } => {
            let change = AclChange {
                document_name: name,
                operation: AclOperation::from_str(&operation)
                    .map_err(|_| anyhow::anyhow!("Operation must be + or -, got '{}'", operation))?,
                role,
                permission: Permission::from_str(&permission)
                    .map_err(|_| anyhow::anyhow!("Unknown permission '{}'", permission))?,
            };
            let mut session = SessionFile::open(session_file)?;
            let reply: StatusMessage = client()?
                .session_call(&mut session, Method::POST, "/organizations/documents/acl", &change)
                .await?;
            println!("{}", reply.state);
        }
    }

    Ok(())
}

async fn set_subject_state(
    session_file: PathBuf,
    username: String,
    target: ActivationState,
    client: RepositoryClient,
) -> Result<()> {
    let mut session = SessionFile::open(session_file)?;
    let reply: StatusMessage = client
        .session_call(
            &mut session,
            Method::PUT,
            "/organizations/subjects/state",
            &SubjectStateChange {
                username,
                state: target,
            },
        )
        .await?;
    println!("{}", reply.state);
    Ok(())
}

async fn role_command(
    session_file: PathBuf,
    method: Method,
    path: &str,
    role: String,
    client: RepositoryClient,
) -> Result<()> {
    let mut session = SessionFile::open(session_file)?;
    let reply: StatusMessage = client
        .session_call(&mut session, method, path, &RoleRequest { role })
        .await?;
    println!("{}", reply.state);
    Ok(())
}

async fn document_metadata(
    client: &RepositoryClient,
    session: &mut SessionFile,
    document_name: String,
) -> Result<DocumentMetadata> {
    client
        .session_call(
            session,
            Method::GET,
            "/organizations/documents/metadata",
            &DocumentRef { document_name },
        )
        .await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let state_path = ClientState::default_path()?;
    let mut state = ClientState::load(&state_path)?;
    state.apply_env(|name| std::env::var(name).ok())?;
    state.apply_args(cli.repo, cli.key.as_deref())?;

    let result = run(cli.command, &state).await;
    state.save(&state_path)?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_change_routes_by_target() {
        let (path, payload) = role_change("Auditors", "DOC_NEW").unwrap();
        assert_eq!(path, "/organizations/roles/permissions");
        assert_eq!(payload, serde_json::json!({"role": "Auditors", "permission": "DOC_NEW"}));

        let (path, payload) = role_change("Auditors", "bob").unwrap();
        assert_eq!(path, "/organizations/roles/subjects");
        assert_eq!(payload, serde_json::json!({"role": "Auditors", "username": "bob"}));
    }

    #[test]
    fn test_document_query_validation() {
        let query = document_query(
            Some("alice".to_string()),
            Some(vec!["nt".to_string(), "01-02-2025".to_string()]),
        )
        .unwrap();
        assert_eq!(query.date_filter, Some(DateFilter::NewerThan));
        assert_eq!(query.date_str.as_deref(), Some("01-02-2025"));

        assert!(document_query(None, Some(vec!["xx".into(), "01-02-2025".into()])).is_err());
        assert!(document_query(None, Some(vec!["ot".into(), "2025-02-01".into()])).is_err());
        assert_eq!(document_query(None, None).unwrap(), DocumentQuery::default());
    }

    #[test]
    fn test_cli_parses_acl_operation() {
        let cli = Cli::try_parse_from([
            "rep", "acl-doc", "s.json", "report", "-", "Auditors", "DOC_READ",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::AclDoc { ref operation, .. } if operation == "-"));

        let cli = Cli::try_parse_from(["rep", "-r", "localhost:5000", "list-orgs"]).unwrap();
        assert_eq!(cli.repo.as_deref(), Some("localhost:5000"));
    }
}
