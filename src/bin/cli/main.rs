// src/bin/cli/main.rs - ocl-conformance CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ocl_conformance::seed::{self, MemoryDatastore, SeedProfile};
use ocl_conformance::{build_info, run_all, suites, ApiClient, Config, RunnableSuite, SuiteReport, VERSION};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ocl-conformance")]
#[command(about = "Authorization-matrix conformance suites and datastore seeding for the OCL API")]
#[command(version = VERSION)]
struct Cli {
    /// Base URL of the API under test
    #[arg(long, global = true, env = "OCL_API_URL")]
    url: Option<String>,

    /// Staff account used for fixtures and cleanup
    #[arg(long, global = true, env = "OCL_ADMIN_USER")]
    admin_user: Option<String>,

    #[arg(long, global = true, env = "OCL_ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run conformance suites against the API
    Run {
        /// Suite to run (repeatable); all suites when omitted
        #[arg(long = "suite")]
        suites: Vec<String>,

        /// Print reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// List suites and their cases
    List,
    /// Check that the API answers and the admin can log in
    Ping,
    /// Show version, git revision and compiled-in features
    Version,
    /// Seed the datastore backing the API
    Seed {
        #[arg(long, value_enum)]
        profile: CliSeedProfile,

        #[arg(long, env = "OCL_MONGODB_URI")]
        mongodb_uri: Option<String>,

        #[arg(long, env = "OCL_MONGODB_DATABASE")]
        database: Option<String>,

        /// Seed an in-memory store and print the documents instead
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CliSeedProfile {
    PerfTest,
    RootUser,
}

impl From<CliSeedProfile> for SeedProfile {
    fn from(profile: CliSeedProfile) -> Self {
        match profile {
            CliSeedProfile::PerfTest => SeedProfile::PerfTest,
            CliSeedProfile::RootUser => SeedProfile::RootUser,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(url) = cli.url {
        config.server.url = url;
    }
    if let Some(user) = cli.admin_user {
        config.server.admin_user = user;
    }
    if let Some(password) = cli.admin_password {
        config.server.admin_password = password;
    }

    let result = match cli.command {
        Commands::Run { suites, json } => handle_run(&config, &suites, json).await,
        Commands::List => handle_list().map(|_| true),
        Commands::Ping => handle_ping(&config).await.map(|_| true),
        Commands::Version => {
            println!("{}", build_info());
            Ok(true)
        }
        Commands::Seed {
            profile,
            mongodb_uri,
            database,
            dry_run,
        } => {
            if let Some(uri) = mongodb_uri {
                config.seed.mongodb_uri = uri;
            }
            if let Some(database) = database {
                config.seed.database = database;
            }
            handle_seed(&config, profile.into(), dry_run).await.map(|_| true)
        }
    };

    match result {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => Ok(ExitCode::FAILURE),
        Err(e) => {
            error!("Command failed: {:#}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Run the selected suites; `Ok(false)` when any case or teardown failed
async fn handle_run(config: &Config, names: &[String], json: bool) -> Result<bool> {
    config.validate()?;
    let selected = suites::select(names)?;
    let client = ApiClient::new(config)?;

    info!("🧪 Running {} suite(s) against {}", selected.len(), config.server.url);
    let reports = run_all(&selected, &client, config).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!("{}\n", report);
        }
        print_totals(&reports);
    }

    Ok(reports.iter().all(SuiteReport::is_success))
}

fn print_totals(reports: &[SuiteReport]) {
    let passed: usize = reports.iter().map(SuiteReport::passed).sum();
    let failed: usize = reports.iter().map(SuiteReport::failed).sum();
    let skipped: usize = reports.iter().map(SuiteReport::skipped).sum();

    println!("═══════════════════════════════");
    if failed == 0 {
        println!("✅ {} passed, {} skipped", passed, skipped);
    } else {
        println!("❌ {} failed, {} passed, {} skipped", failed, passed, skipped);
    }
}

fn handle_list() -> Result<()> {
    for suite in suites::all() {
        println!("📋 {}", suite.name());
        for (name, skip) in suite.case_names() {
            if skip {
                println!("   {} (skipped)", name);
            } else {
                println!("   {}", name);
            }
        }
    }
    Ok(())
}

async fn handle_ping(config: &Config) -> Result<()> {
    info!("🔍 Checking {} with {}", config.server.url, build_info().version);
    let client = ApiClient::new(config)?;

    let orgs = client.get("orgs/", None).await?;
    println!("✅ API reachable (GET {} → {})", orgs.url, orgs.status);

    match client.authenticate_admin().await {
        Ok(_) => {
            println!("✅ Admin '{}' logged in", config.server.admin_user);
            Ok(())
        }
        Err(e) => {
            println!("❌ Admin login failed: {}", e);
            Err(e.into())
        }
    }
}

async fn handle_seed(config: &Config, profile: SeedProfile, dry_run: bool) -> Result<()> {
    if dry_run {
        info!("📝 Dry run of '{}' against an in-memory store", profile);
        let store = MemoryDatastore::preloaded();
        let report = seed::seed(&store, profile).await?;

        for collection in store.collection_names() {
            println!("── {} ──", collection);
            for document in store.documents(&collection) {
                let json = bson::Bson::Document(document).into_relaxed_extjson();
                println!("{}", serde_json::to_string(&json)?);
            }
        }
        println!("\n{}", report);
        return Ok(());
    }

    for warning in config.validate_detailed().warnings {
        println!("⚠️  {}", warning.message);
    }

    let store = seed::create_datastore(&config.seed, "mongo").await?;
    let report = seed::seed(store.as_ref(), profile).await?;
    println!("✅ Seeded '{}' into {}", profile, config.seed.database);
    println!("{}", report);
    Ok(())
}
