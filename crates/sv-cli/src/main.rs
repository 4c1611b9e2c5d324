//! safevault: encrypted local vault CLI
//!
//! Commands:
//!   status                        - show backends and whether a vault password is set
//!   config show                   - display current configuration
//!   add <title>                   - seal and store a new item (content from --content or stdin)
//!   list [--category] [--search]  - list items, newest first
//!   show <id>                     - decrypt and print one item
//!   edit <id>                     - change an item's title, content or category
//!   rm <id>                       - delete an item
//!   panic set                     - set the decoy (panic) password
//!   panic auto-destruct <on|off>  - wipe the vault when the panic password is used
//!   wipe --yes                    - delete every item

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zeroize::Zeroizing;

use sv_core::config::{expand_home, PrefsBackendKind, VaultConfig};
use sv_core::{now_millis, Category, RecordId, VaultError, VaultRecord};
use sv_crypto::{EncryptionEngine, KeyManager};
use sv_secrets::{CredentialStore, FilePrefs, KeychainKeyStore, KeychainPrefs, PrefsBackend};
use sv_store::{JsonRecordStore, RecordStore, SharedRecordStore};
use sv_vault::{
    AuthController, AuthState, NoBiometrics, SettingsService, UnlockedSession, VaultItemService,
    VaultQueryEngine,
};

// ── CLI structure ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "safevault",
    version,
    about = "Encrypted local vault",
    long_about = "safevault: store notes, passwords and scanned documents encrypted under a device key"
)]
struct Cli {
    /// Path to safevault.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "SAFEVAULT_CONFIG",
        default_value = "~/.config/safevault/config.toml"
    )]
    config: PathBuf,

    /// Vault password (prompted on the terminal when unset)
    #[arg(long, env = "SAFEVAULT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show storage backends and setup state
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Seal and store a new item
    Add {
        title: String,
        /// Category (id-card, password, note, receipt, photo, other)
        #[arg(long, short = 'k', value_parser = parse_category, default_value = "note")]
        category: Category,
        /// Item content; read from stdin when omitted
        #[arg(long)]
        content: Option<String>,
        /// Path of an attached scan or photo
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// List items, most recently updated first
    List {
        /// Only show this category
        #[arg(long, short = 'k', value_parser = parse_category)]
        category: Option<Category>,
        /// Title substring; overrides --category
        #[arg(long, short = 's')]
        search: Option<String>,
    },

    /// Decrypt and print one item
    Show { id: u64 },

    /// Change an item's title, content or category
    Edit {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long, short = 'k', value_parser = parse_category)]
        category: Option<Category>,
    },

    /// Delete an item
    Rm { id: u64 },

    /// Panic password settings
    Panic {
        #[command(subcommand)]
        action: PanicAction,
    },

    /// Delete every item in the vault
    Wipe {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Subcommand, Debug)]
enum PanicAction {
    /// Set the decoy password (prompted twice)
    Set,
    /// Wipe the vault when the panic password is entered
    AutoDestruct { state: Toggle },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Toggle {
    On,
    Off,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_home(&cli.config);
    let config = load_config(&config_path).await?;

    init_logging(&config.logging.level, &config.logging.format);
    if !config_path.exists() {
        tracing::warn!(
            "config file not found: {}  (using defaults)",
            config_path.display()
        );
    }

    let password = cli.password.map(Zeroizing::new);

    match cli.command {
        Commands::Status => cmd_status(&Vault::open(&config).await?).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
        command => {
            let vault = Vault::open(&config).await?;
            let (mut auth, access) = vault
                .unlock(password.as_ref().map(|p| p.as_str()))
                .await?;
            let result = match access {
                Access::Open(session) => run_unlocked(&vault, &session, command).await,
                Access::Decoy => run_decoy(command),
            };
            auth.wait_for_wipe().await;
            result
        }
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

async fn load_config(path: &Path) -> Result<VaultConfig> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
    } else {
        Ok(VaultConfig::default())
    }
}

fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr
    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Composition root ──────────────────────────────────────────────────────────

/// Handles for one CLI invocation, built from config.
struct Vault {
    config: VaultConfig,
    credentials: CredentialStore,
    records: SharedRecordStore,
    engine: EncryptionEngine,
}

enum Access {
    Open(UnlockedSession),
    /// The panic password was used: show an empty vault.
    Decoy,
}

impl Vault {
    async fn open(config: &VaultConfig) -> Result<Self> {
        let secrets = &config.secrets;

        let prefs: Arc<dyn PrefsBackend> = match secrets.prefs_backend {
            PrefsBackendKind::Keychain => Arc::new(KeychainPrefs::new(&secrets.service_name)),
            PrefsBackendKind::File => {
                let path = expand_home(&secrets.prefs_path);
                Arc::new(
                    FilePrefs::open(&path)
                        .with_context(|| format!("opening prefs: {}", path.display()))?,
                )
            }
        };

        let key_store = Arc::new(KeychainKeyStore::new(secrets.service_name.clone()));
        let keys = KeyManager::new(key_store, secrets.key_alias.clone());

        let records_path = expand_home(&config.storage.records_path);
        let records: SharedRecordStore = Arc::new(
            JsonRecordStore::open(&records_path)
                .await
                .with_context(|| format!("opening record store: {}", records_path.display()))?,
        );

        Ok(Self {
            config: config.clone(),
            credentials: CredentialStore::new(prefs),
            records,
            engine: EncryptionEngine::new(Arc::new(keys)),
        })
    }

    fn items(&self) -> VaultItemService {
        VaultItemService::new(Arc::clone(&self.records), self.engine.clone())
    }

    fn settings(&self) -> SettingsService {
        SettingsService::new(self.credentials.clone(), Arc::clone(&self.records))
    }

    /// Drive the auth controller to a terminal state. Interactive prompts get
    /// three tries; a password from the environment gets one.
    async fn unlock(&self, password: Option<&str>) -> Result<(AuthController, Access)> {
        let mut auth = AuthController::start(
            self.credentials.clone(),
            Arc::clone(&self.records),
            Arc::new(NoBiometrics),
            &self.config.auth,
        )
        .await
        .context("reading vault credentials")?;

        let attempts = if password.is_some() { 1 } else { 3 };
        for attempt in 1..=attempts {
            let input = match password {
                Some(p) => Zeroizing::new(p.to_owned()),
                None => prompt_password(auth.state())?,
            };
            match auth.submit_password(&input).await {
                Ok(AuthState::Unlocked) => {
                    let session = auth.session().context("unlocked without a session")?;
                    return Ok((auth, Access::Open(session)));
                }
                Ok(AuthState::PanicTriggered) => return Ok((auth, Access::Decoy)),
                Ok(state) => anyhow::bail!("unexpected auth state after unlock: {state}"),
                Err(e) if e.is_user_recoverable() && attempt < attempts => eprintln!("{e}"),
                Err(e) => return Err(e.into()),
            }
        }
        anyhow::bail!(VaultError::AuthFailed)
    }
}

fn prompt_password(state: AuthState) -> Result<Zeroizing<String>> {
    if state == AuthState::Uninitialized {
        eprintln!("No vault password is set yet. Choose one now.");
        let first = Zeroizing::new(
            rpassword::prompt_password("New vault password: ").context("reading password")?,
        );
        let confirm = Zeroizing::new(
            rpassword::prompt_password("Confirm password: ").context("reading password")?,
        );
        if *first != *confirm {
            anyhow::bail!(VaultError::PasswordMismatch);
        }
        Ok(first)
    } else {
        Ok(Zeroizing::new(
            rpassword::prompt_password("Vault password: ").context("reading password")?,
        ))
    }
}

async fn run_unlocked(vault: &Vault, session: &UnlockedSession, command: Commands) -> Result<()> {
    match command {
        Commands::Add {
            title,
            category,
            content,
            image,
        } => cmd_add(vault, session, &title, category, content, image).await,
        Commands::List { category, search } => cmd_list(vault, session, category, search).await,
        Commands::Show { id } => cmd_show(vault, session, RecordId(id)).await,
        Commands::Edit {
            id,
            title,
            content,
            category,
        } => cmd_edit(vault, session, RecordId(id), title, content, category).await,
        Commands::Rm { id } => cmd_rm(vault, session, RecordId(id)).await,
        Commands::Panic {
            action: PanicAction::Set,
        } => cmd_panic_set(vault, session).await,
        Commands::Panic {
            action: PanicAction::AutoDestruct { state },
        } => cmd_auto_destruct(vault, session, state).await,
        Commands::Wipe { yes } => cmd_wipe(vault, session, yes).await,
        Commands::Status | Commands::Config { .. } => Ok(()),
    }
}

/// Respond the way a freshly emptied vault would, whatever the wipe did.
fn run_decoy(command: Commands) -> Result<()> {
    match command {
        Commands::List { .. } => {
            print_records(&[]);
            Ok(())
        }
        Commands::Show { id } | Commands::Edit { id, .. } | Commands::Rm { id } => {
            Err(VaultError::NotFound(RecordId(id)).into())
        }
        // an empty vault hands out the first id
        Commands::Add { .. } => {
            println!("Saved item {}", RecordId(1));
            Ok(())
        }
        Commands::Panic {
            action: PanicAction::Set,
        } => {
            println!("Panic password saved.");
            Ok(())
        }
        Commands::Panic {
            action: PanicAction::AutoDestruct { state },
        } => {
            print_auto_destruct(state);
            Ok(())
        }
        Commands::Wipe { .. } => {
            println!("Vault wiped.");
            Ok(())
        }
        Commands::Status | Commands::Config { .. } => Ok(()),
    }
}

// ── `safevault status` ────────────────────────────────────────────────────────

async fn cmd_status(vault: &Vault) -> Result<()> {
    let secrets = &vault.config.secrets;
    let creds = vault.credentials.clone();
    let has_password = tokio::task::spawn_blocking(move || creds.has_user_password())
        .await
        .context("credential worker failed")??;

    println!("safevault status");
    println!(
        "  records:        {}",
        expand_home(&vault.config.storage.records_path).display()
    );
    match secrets.prefs_backend {
        PrefsBackendKind::Keychain => {
            println!("  credentials:    keychain ({}.prefs)", secrets.service_name)
        }
        PrefsBackendKind::File => println!(
            "  credentials:    file ({})",
            expand_home(&secrets.prefs_path).display()
        ),
    }
    let keychain = if sv_secrets::keychain::is_available(&secrets.service_name) {
        "available"
    } else {
        "unavailable"
    };
    println!("  keychain:       {keychain}");
    println!(
        "  vault password: {}",
        if has_password { "set" } else { "not set" }
    );
    // panic settings stay hidden until unlock
    Ok(())
}

// ── `safevault config show` ───────────────────────────────────────────────────

fn cmd_config_show(config: &VaultConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!(
            "# Configuration: defaults (no file at {})",
            config_path.display()
        );
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── Item commands ─────────────────────────────────────────────────────────────

async fn cmd_add(
    vault: &Vault,
    session: &UnlockedSession,
    title: &str,
    category: Category,
    content: Option<String>,
    image: Option<PathBuf>,
) -> Result<()> {
    let content = match content {
        Some(c) => Zeroizing::new(c),
        None => read_content_from_stdin()?,
    };
    let id = vault
        .items()
        .add_item(session, title, &content, category, image)
        .await?;
    println!("Saved item {id}");
    Ok(())
}

async fn cmd_list(
    vault: &Vault,
    session: &UnlockedSession,
    category: Option<Category>,
    search: Option<String>,
) -> Result<()> {
    let engine = VaultQueryEngine::new(
        session,
        Arc::clone(&vault.records),
        vault.config.query.search_case,
    );
    engine.set_filter(category);
    if let Some(term) = search {
        engine.set_search(term);
    }
    let records = engine.wait_ready().await.context("listing items")?;
    print_records(&records);
    Ok(())
}

async fn cmd_show(vault: &Vault, session: &UnlockedSession, id: RecordId) -> Result<()> {
    let opened = vault
        .items()
        .load_item(session, id)
        .await?
        .ok_or(VaultError::NotFound(id))?;

    let record = &opened.record;
    println!("title:    {}", record.title);
    println!("category: {}", record.category);
    println!("updated:  {}", fmt_age(record.updated_at));
    if let Some(ref image) = record.attached_image_ref {
        println!("image:    {}", image.display());
    }
    println!();
    println!("{}", opened.content.display_text());
    Ok(())
}

async fn cmd_edit(
    vault: &Vault,
    session: &UnlockedSession,
    id: RecordId,
    title: Option<String>,
    content: Option<String>,
    category: Option<Category>,
) -> Result<()> {
    let items = vault.items();
    let opened = items
        .load_item(session, id)
        .await?
        .ok_or(VaultError::NotFound(id))?;

    let content = match content {
        Some(c) => Zeroizing::new(c),
        None if opened.content.is_readable() => {
            Zeroizing::new(opened.content.display_text().to_owned())
        }
        None => anyhow::bail!("item {id} cannot be decrypted; pass --content to replace it"),
    };
    let title = title.unwrap_or_else(|| opened.record.title.clone());
    let category = category.unwrap_or(opened.record.category);

    items
        .update_item(session, &opened.record, &title, &content, category)
        .await?;
    println!("Updated item {id}");
    Ok(())
}

async fn cmd_rm(vault: &Vault, session: &UnlockedSession, id: RecordId) -> Result<()> {
    if vault.records.get(id).await?.is_none() {
        anyhow::bail!(VaultError::NotFound(id));
    }
    vault.items().delete_item(session, id).await?;
    println!("Deleted item {id}");
    Ok(())
}

// ── Settings commands ─────────────────────────────────────────────────────────

async fn cmd_panic_set(vault: &Vault, session: &UnlockedSession) -> Result<()> {
    let password = Zeroizing::new(
        rpassword::prompt_password("Panic password: ").context("reading password")?,
    );
    let confirm = Zeroizing::new(
        rpassword::prompt_password("Confirm panic password: ").context("reading password")?,
    );

    // the panic check runs first, so an equal password would lock the owner out
    let creds = vault.credentials.clone();
    let candidate = password.clone();
    let shadows_real = tokio::task::spawn_blocking(move || creds.verify_user_password(candidate.trim()))
        .await
        .context("credential worker failed")??;
    if shadows_real {
        anyhow::bail!("the panic password must differ from the vault password");
    }

    vault
        .settings()
        .set_panic_password(session, &password, &confirm)
        .await?;
    println!("Panic password saved.");
    Ok(())
}

async fn cmd_auto_destruct(vault: &Vault, session: &UnlockedSession, state: Toggle) -> Result<()> {
    let settings = vault.settings();
    settings
        .set_auto_destruct(session, state == Toggle::On)
        .await?;
    print_auto_destruct(state);
    if state == Toggle::On && !settings.has_panic_password().await? {
        eprintln!("note: no panic password is set; use `safevault panic set`");
    }
    Ok(())
}

async fn cmd_wipe(vault: &Vault, session: &UnlockedSession, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("refusing to wipe without --yes");
    }
    vault.settings().wipe_all(session).await?;
    println!("Vault wiped.");
    Ok(())
}

// ── Utilities ─────────────────────────────────────────────────────────────────

fn print_records(records: &[VaultRecord]) {
    if records.is_empty() {
        println!("No items.");
        return;
    }
    println!("{:>5}  {:<12}  {:<9}  TITLE", "ID", "CATEGORY", "UPDATED");
    for record in records {
        println!(
            "{:>5}  {:<12}  {:<9}  {}",
            record.id.to_string(),
            record.category.display_name(),
            fmt_age(record.updated_at),
            record.title
        );
    }
}

fn print_auto_destruct(state: Toggle) {
    match state {
        Toggle::On => println!("Auto-destruct enabled."),
        Toggle::Off => println!("Auto-destruct disabled."),
    }
}

fn read_content_from_stdin() -> Result<Zeroizing<String>> {
    eprintln!("Enter content, then Ctrl-D:");
    let mut buf = Zeroizing::new(String::new());
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("reading content from stdin")?;
    Ok(buf)
}

/// Short CLI token for each category, accepted alongside display names.
fn category_token(category: Category) -> &'static str {
    match category {
        Category::IdCard => "id-card",
        Category::Password => "password",
        Category::Note => "note",
        Category::Receipt => "receipt",
        Category::Photo => "photo",
        Category::Other => "other",
    }
}

fn parse_category(s: &str) -> Result<Category, String> {
    let wanted = s.trim().to_ascii_lowercase();
    Category::ALL
        .into_iter()
        .find(|c| category_token(*c) == wanted || c.display_name().to_ascii_lowercase() == wanted)
        .ok_or_else(|| {
            let known: Vec<&str> = Category::ALL.into_iter().map(category_token).collect();
            format!("unknown category '{s}' (expected one of: {})", known.join(", "))
        })
}

fn fmt_age(updated_at: u64) -> String {
    let secs = now_millis().saturating_sub(updated_at) / 1000;
    if secs < 60 {
        format!("{secs}s ago")
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86_400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_category_tokens_and_display_names() {
        assert_eq!(parse_category("id-card").unwrap(), Category::IdCard);
        assert_eq!(parse_category("ID Card").unwrap(), Category::IdCard);
        assert_eq!(parse_category("secure note").unwrap(), Category::Note);
        assert_eq!(parse_category(" Receipt ").unwrap(), Category::Receipt);
        assert!(parse_category("recipe").is_err());
    }

    #[test]
    fn test_parse_list_flags() {
        let cli = Cli::try_parse_from(["safevault", "list", "-k", "password", "-s", "bank"]).unwrap();
        match cli.command {
            Commands::List { category, search } => {
                assert_eq!(category, Some(Category::Password));
                assert_eq!(search.as_deref(), Some("bank"));
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_auto_destruct() {
        let cli = Cli::try_parse_from(["safevault", "panic", "auto-destruct", "on"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Panic {
                action: PanicAction::AutoDestruct { state: Toggle::On }
            }
        ));
    }

    #[test]
    fn test_fmt_age() {
        let now = now_millis();
        assert_eq!(fmt_age(now), "0s ago");
        assert_eq!(fmt_age(now - 5 * 60 * 1000), "5m ago");
        assert_eq!(fmt_age(now - 3 * 86_400 * 1000), "3d ago");
        // clock skew: future timestamps read as now
        assert_eq!(fmt_age(now + 10_000), "0s ago");
    }
}
