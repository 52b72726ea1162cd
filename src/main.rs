use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::{error, info, warn, LevelFilter};
use rust_post_scraper::config::{Config, DEFAULT_CONFIG_PATH};
use rust_post_scraper::logging::{self, DEFAULT_LOG_CONFIG};
use rust_post_scraper::models::{PostFilter, PostUpdate, SearchStatus};
use rust_post_scraper::{AppState, Result};
use serde::Serialize;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "rust_post_scraper")]
#[command(about = "Scrape posts from a logged-in browser session into a local SQLite store")]
struct Cli {
    /// Path to the TOML configuration
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// log4rs configuration; console logging when the file is missing
    #[arg(long, global = true, default_value = DEFAULT_LOG_CONFIG)]
    log_config: String,

    /// Debug logging for the console fallback; ignored when the log4rs file exists
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in through a browser window and save the session
    Auth {
        /// Log in again even when the saved session is valid; the old
        /// session is kept until the new one is saved
        #[arg(long)]
        force: bool,
    },

    /// Search posts and store the results
    Search {
        keywords: String,
        /// Extra result pages to load
        #[arg(long)]
        depth: Option<u32>,
        /// Print results without storing them
        #[arg(long)]
        dry_run: bool,
    },

    /// List stored posts
    List {
        #[arg(long, value_delimiter = ',')]
        ids: Option<Vec<i64>>,
        /// Substring match on text or author
        #[arg(long)]
        search: Option<String>,
        /// Captured on or after (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Captured on or before (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        applied: Option<bool>,
        #[arg(long)]
        saved: Option<bool>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
        /// Print only the number of matches
        #[arg(long)]
        count: bool,
    },

    /// Show one stored post
    Show { id: i64 },

    /// Set status flags or a description on stored posts
    Mark {
        #[arg(value_delimiter = ',', required = true)]
        ids: Vec<i64>,
        #[arg(long)]
        applied: Option<bool>,
        #[arg(long)]
        saved: Option<bool>,
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete stored posts
    Delete {
        #[arg(value_delimiter = ',', required = true)]
        ids: Vec<i64>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_from(&cli.config)?;
    let app = AppState::new(config)?;

    match cli.command {
        Commands::Auth { force } => {
            let outcome = app.authenticate(force).await?;
            print_json(&outcome)?;
        }
        Commands::Search {
            keywords,
            depth,
            dry_run,
        } => {
            let outcome = app.search(&keywords, depth).await?;
            if let SearchStatus::Partial { failed } = outcome.status {
                info!("{} of {} posts could not be extracted", failed, outcome.items.len());
            }
            if dry_run || outcome.items.is_empty() {
                print_json(&outcome)?;
            } else {
                let summary = app.persist(&outcome.items, Some(&keywords))?;
                print_json(&summary)?;
            }
        }
        Commands::List {
            ids,
            search,
            from,
            to,
            applied,
            saved,
            limit,
            offset,
            count,
        } => {
            let filter = PostFilter {
                ids,
                search,
                date_from: from,
                date_to: to,
                applied,
                saved,
                limit,
                offset,
            };
            if count {
                println!("{}", app.count(&filter)?);
            } else {
                print_json(&app.query(&filter)?)?;
            }
        }
        Commands::Show { id } => match app.get(id)? {
            Some(post) => print_json(&post)?,
            None => println!("Post {} not found", id),
        },
        Commands::Mark {
            ids,
            applied,
            saved,
            description,
        } => {
            let update = PostUpdate {
                applied,
                saved,
                description,
            };
            let changed = app.update(&ids, &update)?;
            println!("Updated {} posts", changed);
        }
        Commands::Delete { ids } => {
            let removed = app.delete(&ids)?;
            println!("Deleted {} posts", removed);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    match logging::init(&cli.log_config, level) {
        Ok(true) if cli.verbose => {
            warn!("--verbose ignored; levels come from {}", cli.log_config);
        }
        Ok(_) => {}
        Err(e) => eprintln!("Logging disabled: {}", e),
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
