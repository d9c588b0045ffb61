mod boards;
mod card;
mod convert;
mod error;
mod parser;
mod server;
mod settings;
mod trello;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use card::Card;
use parser::extract::{FieldExtractor, TagConvention};
use settings::Settings;

#[derive(Parser)]
#[command(name = "docket_cards", about = "Turn publication reports into Trello cards")]
struct Cli {
    /// Config file (TOML, JSON or YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert and parse a report, printing the cards it yields
    Parse {
        file: PathBuf,
        /// Owner tagging convention (default from config)
        #[arg(long, value_enum)]
        convention: Option<TagConvention>,
        /// Print cards as JSON
        #[arg(long)]
        json: bool,
    },
    /// Convert, parse and create the cards on Trello
    Publish {
        file: PathBuf,
        #[arg(long, value_enum)]
        convention: Option<TagConvention>,
        /// Parse and resolve boards without creating anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the upload web server
    Serve {
        /// Listen address (default from config)
        #[arg(short, long)]
        addr: Option<SocketAddr>,
    },
    /// Show the owner → board table
    Boards,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    info!(settings = ?settings, "Configuration loaded");

    let boards = settings.board_directory();

    let result = match cli.command {
        Commands::Parse {
            file,
            convention,
            json,
        } => {
            let convention = convention.unwrap_or(settings.convention);
            let cards = parse_file(&file, &FieldExtractor::new(&boards, convention))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&cards)?);
            } else {
                print_cards(&cards, &boards);
            }
            Ok(())
        }
        Commands::Publish {
            file,
            convention,
            dry_run,
        } => {
            let convention = convention.unwrap_or(settings.convention);
            let cards = parse_file(&file, &FieldExtractor::new(&boards, convention))?;
            if cards.is_empty() {
                println!("No publications found in {}.", file.display());
                return Ok(());
            }
            if dry_run {
                print_cards(&cards, &boards);
                println!("\nDry run: {} cards not created.", cards.len());
                return Ok(());
            }

            let client = settings.trello_client()?;
            let publisher = trello::Publisher::new(&client, &boards);

            let pb = ProgressBar::new(cards.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
                    .progress_chars("=> "),
            );
            let outcome = publisher
                .publish_all(&cards, |card, result| {
                    if let Err(e) = result {
                        pb.println(format!("  failed: {} ({}): {}", card.title, card.owner, e));
                    }
                    pb.inc(1);
                })
                .await;
            pb.finish_and_clear();

            let created = outcome?;
            println!("Created {} cards.", created);
            Ok(())
        }
        Commands::Serve { addr } => {
            let addr = addr.unwrap_or(settings.listen_addr);
            let trello = match settings.trello_client() {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::warn!(error = %e, "Uploads will fail until Trello is configured");
                    None
                }
            };
            let state = server::AppState::new(boards, settings.convention, trello);
            server::serve(addr, state).await
        }
        Commands::Boards => {
            println!("{:<16} | {}", "Owner", "Board");
            println!("{}", "-".repeat(40));
            for (owner, board) in boards.iter() {
                println!("{:<16} | {}", owner, board);
            }
            println!("\n{} owners", boards.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        info!("Done in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

fn parse_file(path: &Path, extractor: &FieldExtractor) -> anyhow::Result<Vec<Card>> {
    let body = convert::convert_path(path)
        .with_context(|| format!("Failed to convert {}", path.display()))?;
    Ok(parser::parse_document(&body, extractor))
}

fn print_cards(cards: &[Card], boards: &boards::BoardDirectory) {
    if cards.is_empty() {
        println!("No cards.");
        return;
    }

    println!(
        "{:>3} | {:<12} | {:<6} | {:<40} | {}",
        "#", "Owner", "Board", "Title", "Description"
    );
    println!("{}", "-".repeat(100));

    for (i, c) in cards.iter().enumerate() {
        let board = boards.lookup(&c.owner).unwrap_or("?");
        let first_line = c.description.lines().next().unwrap_or("");
        println!(
            "{:>3} | {:<12} | {:<6} | {:<40} | {}",
            i + 1,
            truncate(&c.owner, 12),
            board,
            truncate(&c.title, 40),
            truncate(first_line, 30)
        );
    }

    let unresolved = cards.iter().filter(|c| boards.lookup(&c.owner).is_none()).count();
    println!("\n{} cards | {} without a board", cards.len(), unresolved);
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
