//! CLI administration tool for shortcode.
//!
//! Manages reserved codes and link lifecycle directly against PostgreSQL,
//! without going through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Reserve a code so it can never be claimed
//! cargo run --bin admin -- reserved add status --reason system
//!
//! # List reserved codes
//! cargo run --bin admin -- reserved list
//!
//! # Deactivate a link
//! cargo run --bin admin -- links deactivate aZ3kQ9x
//!
//! # Deactivate every expired link
//! cargo run --bin admin -- links cleanup-expired
//!
//! # Show links from the last 7 days
//! cargo run --bin admin -- links recent --limit 20
//!
//! # Preview generated codes
//! cargo run --bin admin -- codegen --length 8 --count 5
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` (required except for `codegen`): PostgreSQL connection string

use shortcode::domain::entities::{NewReservedCode, ShortLink};
use shortcode::domain::repositories::LinkRepository;
use shortcode::infrastructure::persistence::PgLinkRepository;
use shortcode::utils::code_generator::{CodeGenerator, DEFAULT_CODE_LENGTH};
use shortcode::utils::custom_code::CustomCodeValidator;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use sqlx::PgPool;
use std::sync::Arc;

const TABLES: [&str; 4] = ["urls", "reserved_codes", "click_events", "url_counters_live"];

/// CLI tool for managing shortcode.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Manage reserved codes
    Reserved {
        #[command(subcommand)]
        action: ReservedAction,
    },

    /// Manage short links
    Links {
        #[command(subcommand)]
        action: LinksAction,
    },

    /// Generate sample codes without touching the database
    Codegen {
        /// Code length (4-12)
        #[arg(short, long, default_value_t = DEFAULT_CODE_LENGTH)]
        length: usize,

        /// Number of codes
        #[arg(short, long, default_value_t = 10)]
        count: usize,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Subcommand)]
enum ReservedAction {
    /// Reserve a code
    Add {
        code: String,

        /// Why the code is reserved (e.g., "system", "brand")
        #[arg(short, long, default_value = "admin")]
        reason: String,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// List reserved codes
    List,
}

#[derive(Subcommand)]
enum LinksAction {
    /// Deactivate a link
    Deactivate {
        code: String,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Deactivate all links whose expiry has passed
    CleanupExpired,

    /// Show links created in the last 7 days
    Recent {
        #[arg(short, long, default_value_t = 10)]
        limit: i64,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection and tables
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Reserved { action } => handle_reserved_action(action, &connect().await?).await?,
        Commands::Links { action } => handle_links_action(action, &connect().await?).await?,
        Commands::Codegen { length, count } => handle_codegen(length, count)?,
        Commands::Db { action } => handle_db_action(action, &connect().await?).await?,
    }

    Ok(())
}

async fn connect() -> Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")
}

async fn handle_reserved_action(action: ReservedAction, pool: &PgPool) -> Result<()> {
    let repo = PgLinkRepository::new(Arc::new(pool.clone()));

    match action {
        ReservedAction::Add {
            code,
            reason,
            description,
        } => {
            println!("{}", "🔒 Reserve Code".bright_blue().bold());
            println!();

            CustomCodeValidator::default()
                .check_shape(code.trim())
                .with_context(|| format!("'{code}' is not a usable code"))?;

            let reserved = repo
                .add_reserved(NewReservedCode::new(&code, reason, description))
                .await
                .context("Failed to reserve code")?;

            if let Some(link) = repo.find_by_code(&reserved.code).await? {
                println!(
                    "{}",
                    format!(
                        "⚠️  A link already uses '{}' and keeps working: {}",
                        link.code, link.target_url
                    )
                    .yellow()
                );
            }

            println!(
                "{} {} ({})",
                "✅ Reserved".green().bold(),
                reserved.code.cyan(),
                reserved.reason.bright_black()
            );
        }
        ReservedAction::List => {
            println!("{}", "📋 Reserved Codes".bright_blue().bold());
            println!();

            let codes = repo.list_reserved().await.context("Failed to list codes")?;

            if codes.is_empty() {
                println!("{}", "  No reserved codes".yellow());
                return Ok(());
            }

            println!(
                "  {:<20} {:<12} {:<20} {}",
                "Code".bright_white().bold(),
                "Reason".bright_white().bold(),
                "Created".bright_white().bold(),
                "Description".bright_white().bold()
            );
            println!("  {}", "─".repeat(75).bright_black());

            for code in &codes {
                println!(
                    "  {:<20} {:<12} {:<20} {}",
                    code.code.cyan(),
                    code.reason,
                    code.created_at
                        .format("%Y-%m-%d %H:%M")
                        .to_string()
                        .bright_black(),
                    code.description.as_deref().unwrap_or("-")
                );
            }

            println!();
            println!("  Total: {}", codes.len().to_string().bright_white().bold());
        }
    }

    Ok(())
}

async fn handle_links_action(action: LinksAction, pool: &PgPool) -> Result<()> {
    let repo = PgLinkRepository::new(Arc::new(pool.clone()));

    match action {
        LinksAction::Deactivate { code, yes } => {
            println!("{}", "⛔ Deactivate Link".bright_blue().bold());
            println!();

            let link = repo
                .find_by_code(&code)
                .await?
                .with_context(|| format!("Link '{code}' not found"))?;

            if !link.is_active {
                println!("{}", "⚠️  This link is already inactive".yellow());
                return Ok(());
            }

            print_link(&link);
            println!();

            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt("Deactivate this link?")
                    .default(false)
                    .interact()?;

                if !confirmed {
                    println!("{}", "❌ Cancelled".red());
                    return Ok(());
                }
            }

            repo.deactivate(&code)
                .await
                .context("Failed to deactivate link")?;

            println!("{}", "✅ Link deactivated".green().bold());
        }
        LinksAction::CleanupExpired => {
            println!("{}", "🧹 Cleaning up expired links".bright_blue().bold());

            let affected = repo
                .deactivate_expired(Utc::now())
                .await
                .context("Failed to clean up expired links")?;

            println!(
                "{} {} link(s) deactivated",
                "✅".green(),
                affected.to_string().bright_white().bold()
            );
        }
        LinksAction::Recent { limit } => {
            println!("{}", "🕒 Recent Links (7 days)".bright_blue().bold());
            println!();

            let links = repo
                .list_recent(Utc::now() - Duration::days(7), limit.clamp(1, 100))
                .await
                .context("Failed to list links")?;

            if links.is_empty() {
                println!("{}", "  No links created in the last 7 days".yellow());
                return Ok(());
            }

            for link in &links {
                print_link(link);
                println!();
            }

            println!("  Total: {}", links.len().to_string().bright_white().bold());
        }
    }

    Ok(())
}

fn handle_codegen(length: usize, count: usize) -> Result<()> {
    let generator = CodeGenerator::new(length).context("Invalid code length")?;
    let codes = generator
        .generate_batch(count)
        .context("Failed to generate codes")?;

    println!(
        "{} (length {}, keyspace {})",
        "🎲 Generated Codes".bright_blue().bold(),
        generator.length(),
        generator.keyspace_size().to_string().bright_black()
    );
    println!();

    for code in codes {
        println!("  {}", code.cyan());
    }

    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;

            println!("{}", "✅ Database connection OK".green().bold());
            println!();

            let mut missing = 0;
            for table in TABLES {
                let query = format!("SELECT COUNT(*) FROM {table}");
                match sqlx::query_scalar::<_, i64>(&query).fetch_one(pool).await {
                    Ok(rows) => println!(
                        "  {:<20} {} rows",
                        table.cyan(),
                        rows.to_string().bright_white()
                    ),
                    Err(e) => {
                        missing += 1;
                        println!("  {:<20} {}", table.cyan(), e.to_string().red());
                    }
                }
            }

            if missing > 0 {
                anyhow::bail!("{missing} table(s) not accessible, run migrations first");
            }
        }
    }

    Ok(())
}

fn print_link(link: &ShortLink) {
    let status = if !link.is_active {
        "INACTIVE".red()
    } else if link.is_expired() {
        "EXPIRED".yellow()
    } else {
        "ACTIVE".green()
    };

    println!("  Code:    {} {}", link.code.cyan(), status);
    println!("  Target:  {}", link.target_url);
    println!(
        "  Created: {}",
        link.created_at
            .format("%Y-%m-%d %H:%M")
            .to_string()
            .bright_black()
    );
    if let Some(expires_at) = link.expires_at {
        println!(
            "  Expires: {}",
            expires_at.format("%Y-%m-%d %H:%M").to_string().bright_black()
        );
    }
}
