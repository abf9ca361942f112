//! Command-line interface.
//!
//! Without a subcommand the binary starts the server. Subcommands:
//! - `config check` - Validate the configuration file
//! - `db repair-roles [--execute]` - Fix users with invalid roles
//! - `login` / `logout` - Manage the stored API session
//! - `leads list` / `leads stats` - Query a running server

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::client::{ApiClient, FileTokenStore, TokenStore};
use crate::config::Config;
use crate::db::{repair_user_roles, LeadStats};
use crate::dashboard::{priority_badge, status_badge};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "leadgen")]
#[command(author, version, about = "Lead intake and CRM-lite backend", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "leadgen.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// API URL for client commands
    #[arg(long, env = "LEADGEN_API_URL", default_value = "http://localhost:5000")]
    pub api_url: String,

    /// Session file for client commands (default: ~/.leadgen/session.json)
    #[arg(long, env = "LEADGEN_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Database maintenance commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Sign in and store the session for later commands
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "LEADGEN_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Lead queries against a running server
    #[command(subcommand)]
    Leads(LeadsCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

#[derive(Subcommand, Debug)]
pub enum DbCommands {
    /// Map out-of-enum user roles onto valid ones
    RepairRoles {
        /// Apply the changes (without this flag, only shows what would change)
        #[arg(long)]
        execute: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum LeadsCommands {
    /// List leads visible to the signed-in user
    List,
    /// Show lead statistics
    Stats,
}

fn token_store(cli: &Cli) -> Arc<dyn TokenStore> {
    match &cli.session_file {
        Some(path) => Arc::new(FileTokenStore::new(path.clone())),
        None => Arc::new(FileTokenStore::default_location()),
    }
}

fn api_client(cli: &Cli) -> Result<ApiClient> {
    ApiClient::new(cli.api_url.clone(), token_store(cli)).context("Failed to create HTTP client")
}

/// Run a CLI command
pub async fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Config(ConfigCommands::Check)) => cmd_config_check(cli),
        Some(Commands::Db(DbCommands::RepairRoles { execute })) => {
            cmd_repair_roles(cli, *execute).await
        }
        Some(Commands::Login { email, password }) => cmd_login(cli, email, password).await,
        Some(Commands::Logout) => cmd_logout(cli),
        Some(Commands::Leads(LeadsCommands::List)) => cmd_leads_list(cli).await,
        Some(Commands::Leads(LeadsCommands::Stats)) => cmd_leads_stats(cli).await,
        None => {
            // No subcommand means start the server - this is handled in main.rs
            Ok(())
        }
    }
}

fn cmd_config_check(cli: &Cli) -> Result<()> {
    println!("Checking configuration: {}", cli.config.display());

    let config = Config::load(&cli.config)?;

    println!();
    println!("[OK] Configuration is valid");
    println!();
    println!("  Listen:         {}:{}", config.server.host, config.server.port);
    println!("  Data dir:       {}", config.server.data_dir.display());
    println!("  Production:     {}", config.server.production);
    println!("  Token lifetime: {}", config.auth.token_lifetime);
    println!(
        "  Uploads:        {:?}, max {} MB",
        config.uploads.storage,
        config.uploads.max_file_size / (1024 * 1024)
    );
    println!(
        "  E-mail:         {}",
        if config.email.is_configured() {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "  Rate limiting:  {}",
        if config.rate_limit.enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    Ok(())
}

async fn cmd_repair_roles(cli: &Cli, execute: bool) -> Result<()> {
    let config = Config::load(&cli.config)?;
    let db = crate::db::init(&config.server.data_dir).await?;

    let report = repair_user_roles(&db, execute).await?;

    if report.repairs.is_empty() {
        println!("All users have valid roles.");
        return Ok(());
    }

    println!();
    println!("{:<36}  {:<32}  {:<12}  {:<10}", "ID", "EMAIL", "FROM", "TO");
    println!("{}", "-".repeat(96));
    for repair in &report.repairs {
        println!(
            "{:<36}  {:<32}  {:<12}  {:<10}",
            repair.user_id,
            truncate(&repair.email, 32),
            truncate(&repair.from, 12),
            repair.to
        );
    }
    println!();

    if report.applied {
        println!("Repaired {} user(s).", report.repairs.len());
    } else {
        println!(
            "{} user(s) would change. Run again with --execute to apply.",
            report.repairs.len()
        );
    }
    Ok(())
}

async fn cmd_login(cli: &Cli, email: &str, password: &str) -> Result<()> {
    let client = api_client(cli)?;
    let payload = client
        .login(email, password)
        .await
        .context("Login failed")?;
    println!(
        "Signed in as {} ({}) on {}",
        payload.user.email,
        payload.user.role,
        client.base_url()
    );
    Ok(())
}

fn cmd_logout(cli: &Cli) -> Result<()> {
    api_client(cli)?.logout()?;
    println!("Signed out.");
    Ok(())
}

async fn cmd_leads_list(cli: &Cli) -> Result<()> {
    let client = api_client(cli)?;
    if !client.is_authenticated() {
        anyhow::bail!("Not signed in. Run `leadgen login` first.");
    }

    let leads = client.list_leads().await.context("Failed to fetch leads")?;
    if leads.is_empty() {
        println!("No leads found.");
        return Ok(());
    }

    println!();
    println!(
        "{:<36}  {:<24}  {:<28}  {:<14}  {:<12}  {:<10}",
        "ID", "NAME", "EMAIL", "SOURCE", "STATUS", "PRIORITY"
    );
    println!("{}", "-".repeat(134));
    for lead in leads {
        println!(
            "{:<36}  {:<24}  {:<28}  {:<14}  {:<12}  {:<10}",
            lead.id,
            truncate(&lead.name, 24),
            truncate(&lead.email, 28),
            lead.source,
            status_badge(&lead.status).label,
            priority_badge(&lead.priority).label,
        );
    }
    println!();
    Ok(())
}

async fn cmd_leads_stats(cli: &Cli) -> Result<()> {
    let client = api_client(cli)?;
    if !client.is_authenticated() {
        anyhow::bail!("Not signed in. Run `leadgen login` first.");
    }

    let stats = client
        .lead_stats()
        .await
        .context("Failed to fetch lead statistics")?;
    print_stats(&stats);
    Ok(())
}

fn print_stats(stats: &LeadStats) {
    println!();
    println!("=== Lead Statistics ===");
    println!();
    println!("Total:            {}", stats.total);
    println!("Open:             {}", stats.open);
    println!("Won / Lost:       {} / {}", stats.won, stats.lost);
    println!("New this month:   {}", stats.new_this_month);
    println!("Conversion rate:  {:.1}%", stats.conversion_rate);
    println!("Pipeline value:   {:.2} EUR", stats.pipeline_value);
    println!("Won value:        {:.2} EUR", stats.won_value);

    println!();
    println!("By status:");
    for (status, count) in &stats.by_status {
        println!("  {:<14} {}", status_badge(status).label, count);
    }
    println!();
    println!("By source:");
    for (source, count) in &stats.by_source {
        println!("  {:<14} {}", source, count);
    }
    println!();
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
