use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use linkgate::config::GatewayConfig;
use linkgate::credentials::{CredentialStore, TokenStore};
use tracing::info;

/// Administrative probe over the LinkedIn token store.
#[derive(Parser)]
#[command(name = "linkgate", version, about)]
struct Cli {
    /// Base64-encoded 32-byte key the store was written with
    #[arg(long, env = "LINKGATE_ENCRYPTION_KEY", hide_env_values = true)]
    encryption_key: String,

    /// Overrides the configured database path
    #[arg(long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect or clean up stored credentials
    #[command(subcommand)]
    Tokens(TokensCommand),
}

#[derive(Subcommand)]
enum TokensCommand {
    /// List every stored credential
    List,
    /// Show one user's credential
    Show { user_id: String },
    /// Delete one user's credential
    Delete { user_id: String },
    /// Delete every expired credential
    Sweep,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linkgate=info".into()),
        )
        .init();

    let config = GatewayConfig::from_env_or_file()?;
    let cli = Cli::parse();

    let database = cli.database.unwrap_or(config.storage.database_path);
    let store = CredentialStore::new(&database, &cli.encryption_key)
        .context("Failed to open credential store")?;
    info!(database = %database, "Credential store opened");

    match cli.command {
        Command::Tokens(TokensCommand::List) => {
            let records = store.list_all()?;
            if records.is_empty() {
                println!("No tokens found in the database.");
                return Ok(());
            }
            println!("Found the following tokens:");
            for record in &records {
                println!("  User ID: {}", record.user_id);
                println!("    Access Token: {}", record.token_preview(15));
                println!("    Expires At: {}", describe_expiry(record.expires_at));
                println!("    Valid: {}", record.is_valid());
            }
        }
        Command::Tokens(TokensCommand::Show { user_id }) => match store.get(&user_id)? {
            Some(record) => {
                println!("User ID:    {}", record.user_id);
                println!("Token:      {}", record.token_preview(15));
                println!("Type:       {}", record.token_type);
                println!("Scope:      {}", record.scope.as_deref().unwrap_or("-"));
                println!("Email:      {}", record.email.as_deref().unwrap_or("-"));
                println!("Expires At: {}", describe_expiry(record.expires_at));
                println!("Valid:      {}", record.is_valid());
                println!("Created:    {}", record.created_at.to_rfc3339());
                println!("Updated:    {}", record.updated_at.to_rfc3339());
            }
            None => println!("No token stored for '{}'.", user_id),
        },
        Command::Tokens(TokensCommand::Delete { user_id }) => {
            if store.delete(&user_id)? {
                println!("Deleted token for '{}'.", user_id);
            } else {
                println!("No token stored for '{}'.", user_id);
            }
        }
        Command::Tokens(TokensCommand::Sweep) => {
            let removed = store.sweep_expired()?;
            println!("Removed {} expired token(s).", removed);
        }
    }

    Ok(())
}

fn describe_expiry(expires_at: Option<chrono::DateTime<chrono::Utc>>) -> String {
    expires_at
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| "never".to_string())
}
