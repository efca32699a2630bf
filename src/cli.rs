//! # Command Line Interface
//!
//! `serve` runs the HTTP API (and is the default). The remaining commands are
//! one-shot maintenance tasks against the configured database.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::auth::{JwtService, LoginService, NewAdmin};
use crate::config::AppConfig;
use crate::domain::CalendarYearClock;
use crate::observability::{init_logging, init_observability, log_config_info};
use crate::storage::{create_pool, list_applied_migrations, run_migrations, MigrationInfo};

#[derive(Parser)]
#[command(name = "certificate-registry")]
#[command(about = "Certificate issuing service with serial allocation and QR verification")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, env = "CERTREG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database URL override
    #[arg(long)]
    pub database_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve,

    /// Create an admin account
    CreateAdmin {
        #[arg(long)]
        email: String,

        #[arg(long, env = "CERTREG_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Apply pending migrations and list what is installed
    Migrate,

    /// Show the serial the next certificate of this year would receive
    NextSerial,
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config =
        AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }
    if cli.verbose {
        config.observability.log_level = "debug".to_string();
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::CreateAdmin { email, password } => {
            init_logging(&config.observability)?;
            create_admin(&config, NewAdmin { email, password }).await
        }
        Commands::Migrate => {
            init_logging(&config.observability)?;
            migrate(&config).await
        }
        Commands::NextSerial => {
            init_logging(&config.observability)?;
            next_serial(&config).await
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    init_observability(&config.observability)?;
    log_config_info(&config);

    crate::startup::run(config).await?;
    Ok(())
}

async fn create_admin(config: &AppConfig, admin: NewAdmin) -> anyhow::Result<()> {
    let pool = create_pool(&config.database).await?;
    let jwt = Arc::new(JwtService::from_config(&config.auth));
    let service = LoginService::with_sqlx(pool.clone(), jwt);

    let created = service.create_admin(&admin).await?;
    println!("Created admin {} ({})", created.email, created.id);

    pool.close().await;
    Ok(())
}

async fn migrate(config: &AppConfig) -> anyhow::Result<()> {
    let pool = create_pool(&config.database).await?;

    println!("Running database migrations...");
    run_migrations(&pool).await?;

    let migrations = list_applied_migrations(&pool).await?;
    if migrations.is_empty() {
        println!("No migrations have been applied");
    } else {
        println!("Applied migrations:");
        print_migrations_table(&migrations);
    }

    pool.close().await;
    Ok(())
}

async fn next_serial(config: &AppConfig) -> anyhow::Result<()> {
    let pool = create_pool(&config.database).await?;
    let allocator = crate::startup::serial_allocator(&pool, Arc::new(CalendarYearClock));

    let serial = allocator.peek_current().await?;
    println!("{}", serial);

    pool.close().await;
    Ok(())
}

fn print_migrations_table(migrations: &[MigrationInfo]) {
    println!();
    println!("{:<15} {:<50} {:<25} {:<8}", "Version", "Description", "Applied On", "Success");
    println!("{}", "-".repeat(98));

    for migration in migrations {
        println!(
            "{:<15} {:<50} {:<25} {:<8}",
            migration.version,
            truncate_string(&migration.description, 48),
            migration.installed_on.format("%Y-%m-%d %H:%M:%S"),
            migration.success
        );
    }
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
