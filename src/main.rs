use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use crossterm::event::KeyEventKind;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing_subscriber::EnvFilter;

mod ai;
mod app;
mod config;
mod db;
mod error;
mod feed;
mod models;
mod pipeline;
mod services;
mod tui;

use ai::Summarizer;
use app::App;
use config::Config;
use db::Repository;
use error::{AppError, Result};
use feed::FeedFetcher;
use models::{PublicationFilter, PublicationRecord};
use pipeline::Pipeline;
use services::ContentExtractor;
use tui::{draw, handle_key_event};

const WRAP_WIDTH: usize = 80;

#[derive(Parser)]
#[command(name = "presspaper")]
#[command(author, version, about = "Government publications with neutral summaries", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch sources, store new publications and summarise them
    Run,
    /// Browse stored publications (default)
    View,
    /// Print the feed
    List(ListArgs),
    /// Print one publication with its summary
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct ListArgs {
    #[arg(long)]
    category: Option<String>,
    /// Only titles containing this text (case-insensitive)
    #[arg(long)]
    search: Option<String>,
    /// Only publications tagged with this topic
    #[arg(long)]
    topic: Option<String>,
    #[arg(long)]
    limit: Option<usize>,
    #[arg(long)]
    json: bool,
}

impl ListArgs {
    fn filter(&self) -> PublicationFilter {
        PublicationFilter {
            category: self.category.clone(),
            query: self.search.clone(),
            topic: self.topic.clone(),
            limit: self.limit,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let repository = Repository::new(&config.db_path).await?;

    match cli.command.unwrap_or(Commands::View) {
        Commands::Run => run_pipeline(&config, &repository).await,
        Commands::View => run_viewer(repository).await,
        Commands::List(args) => {
            let records = repository.list_publications(args.filter()).await?;
            print_list(&records, args.json)
        }
        Commands::Show { id, json } => {
            let record = repository
                .get_publication(&id)
                .await?
                .ok_or_else(|| AppError::Other(anyhow::anyhow!("no publication with id {id}")))?;
            print_detail(&record, json)
        }
    }
}

async fn run_pipeline(config: &Config, repository: &Repository) -> Result<()> {
    let fetcher = FeedFetcher::new(config)?;
    let extractor = ContentExtractor::new(config)?;
    let summarizer = Summarizer::from_config(&config.summarizer, config.request_timeout_secs)?;
    if summarizer.is_none() {
        tracing::warn!(
            "No API key configured ({}); summaries disabled",
            config.summarizer.provider.api_key_env()
        );
    }

    let pipeline = Pipeline::new(config, repository, fetcher, extractor, summarizer);
    let report = pipeline.run().await?;
    print!("{report}");
    Ok(())
}

async fn run_viewer(repository: Repository) -> Result<()> {
    let mut app = App::new(repository).await?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = handle_key_event(key, app.search_input_active, app.show_help) {
                        if app.handle_action(action).await? {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

fn print_list(records: &[PublicationRecord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No publications stored yet. Run `presspaper run` first.");
        return Ok(());
    }

    for record in records {
        let marker = if record.summary_text.is_some() { "✓" } else { " " };
        println!(
            "{marker} {}  {}  [{}]  {}",
            record.id,
            record.display_date(),
            record.category.as_deref().unwrap_or("-"),
            record.title
        );
    }
    Ok(())
}

fn print_detail(record: &PublicationRecord, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }

    println!("=== {} ===\n", record.title);
    println!("Source:    {}", record.source_url);
    println!("Date:      {}", record.display_date());
    if let Some(category) = &record.category {
        println!("Category:  {category}");
    }
    if !record.topics.is_empty() {
        println!("Topics:    {}", record.topics.join(", "));
    }

    println!("\n--- Summary ---\n");
    match &record.summary_text {
        Some(summary) => {
            println!("{}", textwrap::fill(summary, WRAP_WIDTH));
            if let Some(model) = &record.summary_model {
                println!("\n({model})");
            }
        }
        None => println!("(not generated yet)"),
    }

    // Printed verbatim, never rewrapped
    println!("\n--- Original ---\n");
    println!("{}", record.original_text);
    Ok(())
}
