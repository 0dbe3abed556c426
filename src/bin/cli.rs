use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use backoffice_authz::authz::PermissionResolver;
use backoffice_authz::codes::CodeRegistry;
use backoffice_authz::db::SqliteStore;
use backoffice_authz::menu::MenuVisibilityEngine;
use backoffice_authz::models::menu::MenuTreeItem;
use backoffice_authz::tree::TreeCache;
use backoffice_authz::utils::{parse_day, utc_now};

#[derive(Parser, Debug)]
#[command(author, version, about = "back-office authorization maintenance tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Print a user's effective authority on a program and the rule behind it
    Resolve {
        user_id: Uuid,
        program_id: String,
        /// Evaluate as of YYYY-MM-DD instead of now
        #[arg(long)]
        as_of: Option<String>,
    },
    /// Print the menu tree a user can see
    MenuTree {
        user_id: Uuid,
        #[arg(long)]
        as_of: Option<String>,
    },
    /// List the usable codes of a group
    Codes { group_code: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();
    let pool = get_pool().await?;

    match cli.command {
        Commands::MigrateRun => {
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::Resolve {
            user_id,
            program_id,
            as_of,
        } => {
            let as_of = match as_of {
                Some(day) => parse_day(&day)?,
                None => utc_now(),
            };
            let resolver = PermissionResolver::new(Arc::new(SqliteStore::new(pool)));
            let resolution = resolver
                .resolve_detailed(user_id, &program_id, as_of)
                .await
                .with_context(|| format!("failed to resolve {program_id} for {user_id}"))?;
            println!("{}", serde_json::to_string_pretty(&resolution)?);
        }
        Commands::MenuTree { user_id, as_of } => {
            let as_of = match as_of {
                Some(day) => parse_day(&day)?,
                None => utc_now(),
            };
            let store = Arc::new(SqliteStore::new(pool));
            let engine = MenuVisibilityEngine::new(
                PermissionResolver::new(Arc::clone(&store)),
                store,
                Arc::new(TreeCache::new(false)),
            );
            let visible = engine.visible_menu_tree(user_id, as_of).await?;
            for item in visible.to_items() {
                print_menu(&item, 0);
            }
        }
        Commands::Codes { group_code } => {
            let registry = CodeRegistry::new(Arc::new(SqliteStore::new(pool)));
            let codes = registry.active_codes(&group_code).await?;
            if codes.is_empty() {
                println!("(no usable codes in {group_code})");
            }
            for code in codes {
                println!("{:<16} {}", code.code, code.code_name);
            }
        }
    }

    Ok(())
}

fn print_menu(item: &MenuTreeItem, depth: usize) {
    let authority = item
        .authority
        .map(|level| format!(" [{level}]"))
        .unwrap_or_default();
    println!("{}{}{}", "  ".repeat(depth), item.name, authority);
    for child in &item.children {
        print_menu(child, depth + 1);
    }
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    let has_table = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
        .fetch_optional(pool)
        .await?
        .is_some();

    let applied_versions: HashSet<i64> = if has_table {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} Name", "Status", "Version");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) {
            "applied"
        } else {
            "pending"
        };
        let desc = migration.description.trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // Prefer ./migrations; fall back to the crate's own folder when run elsewhere.
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", display))
}
