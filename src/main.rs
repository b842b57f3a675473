mod records;

use anyhow::Context;
use clap::{Parser, Subcommand};
use configuration::{init_tracing, load_config};
use database::Pool;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use orm::{Catalog, Cursor, Join, OrderBy, Record, Select, Table, statements};
use records::{Account, File, Organization};
use tracing::{error, info};

/// The main entry point for the pgtable command-line tool.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Load layered configuration (defaults, config.toml, PGTABLE__* variables)
    let config = load_config().context("failed to load configuration")?;
    let _log_guard = init_tracing(&config.logging);

    let catalog = sample_catalog()?;

    // Printing the schema needs no database.
    if let Commands::Schema = cli.command {
        for sql in catalog.create_statements() {
            println!("{sql};");
        }
        return Ok(());
    }

    let pool = database::connect(&config.database)
        .await
        .context("failed to connect to the database")?;

    // Execute the appropriate command
    let result: anyhow::Result<()> = match cli.command {
        Commands::Schema => Ok(()),
        Commands::Create => catalog.create_all(&pool).await.map_err(Into::into),
        Commands::Drop => catalog.drop_all(&pool).await.map_err(Into::into),
        Commands::Seed(args) => handle_seed(&pool, args.count).await,
        Commands::List(args) => handle_list(&pool, args.limit).await,
    };

    pool.shutdown().await;
    result
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// A lightweight Postgres record mapper, driven from the command line.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the DDL for the sample records.
    Schema,
    /// Create the sample tables, indexes and foreign keys.
    Create,
    /// Drop the sample tables.
    Drop,
    /// Insert sample organizations, each with one account and one file.
    Seed(SeedArgs),
    /// List accounts joined with their organizations.
    List(ListArgs),
}

#[derive(Parser)]
struct SeedArgs {
    /// How many organizations to insert.
    #[arg(long, default_value_t = 10)]
    count: usize,
}

#[derive(Parser)]
struct ListArgs {
    /// Maximum number of rows to print (0 prints everything).
    #[arg(long, default_value_t = 20)]
    limit: u64,
}

fn sample_catalog() -> anyhow::Result<Catalog> {
    let catalog = Catalog::new()
        .register::<Organization>()?
        .register::<Account>()?
        .register::<File>()?;
    Ok(catalog)
}

// ==============================================================================
// Seed Command Logic
// ==============================================================================

/// Inserts `count` organizations concurrently; the pool bound limits how many run at once.
async fn handle_seed(pool: &Pool, count: usize) -> anyhow::Result<()> {
    info!(count, "seeding sample records");

    // Set up the progress bar
    let progress_bar = ProgressBar::new(count as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );

    let tasks = (1..=count).map(|n| {
        let pb = progress_bar.clone();
        async move {
            let mut organization = Table::with_record(pool, Organization::sample(n))?;
            organization.save().await?;

            let mut account = Table::with_record(pool, Account::sample(n, organization.organization_id))?;
            account.save().await?;

            let file = File {
                name: format!("organization-{}.txt", organization.organization_id),
                data: organization.organization_name.clone().into_bytes(),
                content_type: "text/plain".to_string(),
                ..File::default()
            };
            Table::with_record(pool, file)?.save().await?;

            pb.inc(1);
            pb.set_message(format!("Saved {}", organization.organization_name));
            Ok::<(), anyhow::Error>(())
        }
    });

    // Wait for all concurrent inserts to complete
    let results = join_all(tasks).await;
    progress_bar.finish_with_message("Seeding complete!");

    // Check for any errors that occurred in the tasks
    let mut failed = 0;
    for result in results {
        if let Err(e) = result {
            failed += 1;
            error!(error = %e, "failed to seed an organization");
        }
    }
    info!(seeded = count - failed, failed, "seeding finished");
    Ok(())
}

// ==============================================================================
// List Command Logic
// ==============================================================================

/// Prints every account next to its organization.
async fn handle_list(pool: &Pool, limit: u64) -> anyhow::Result<()> {
    let mut organizations = Table::<Organization>::new(pool)?;
    let query = Select::new()
        .join(Join::parse("Account", "Account.organizationId = Organization.organizationId")?)
        .where_clause("Organization.organizationId > $1")?
        .param(0)
        .order_by(OrderBy::asc("Account.accountId"))
        .cursor(Cursor::new(limit, 0));
    let sql = statements::select(organizations.schema(), &query)?;
    let rows = organizations.execute(&sql).await?;

    let mut table = comfy_table::Table::new();
    table.set_header(vec!["Organization", "Store", "Account", "Email"]);
    for row in &rows {
        let mut organization = Organization::default();
        organization.decode(row)?;
        let mut account = Account::default();
        account.decode(row)?;
        table.add_row(vec![
            organization.organization_name,
            organization.organization_store.store_name.clone(),
            account.account_name,
            account.account_email,
        ]);
    }
    println!("{table}");
    info!(rows = rows.len(), "listed accounts");
    Ok(())
}
