mod db;
mod discover;
mod fetch;
mod parser;
mod records;

use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ar_scraper", about = "Animal Restaurant wiki customer scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct FetchOpts {
    /// Max pages to fetch (default: all unvisited)
    #[arg(short = 'n', long)]
    limit: Option<usize>,
    /// Politeness delay between requests, in milliseconds
    #[arg(long, default_value_t = fetch::DEFAULT_DELAY_MS)]
    delay_ms: u64,
    /// Per-request timeout, in seconds
    #[arg(long, default_value_t = fetch::DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover customer URLs from the seed listing page and queue them
    Init {
        /// Per-request timeout, in seconds
        #[arg(long, default_value_t = fetch::DEFAULT_TIMEOUT_SECS)]
        timeout_secs: u64,
    },
    /// Fetch unvisited pages sequentially with a politeness delay
    Scrape(FetchOpts),
    /// Extract customer records from fetched pages
    Process {
        /// Max pages to process (default: all unprocessed)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Scrape + process in one pipeline
    Run(FetchOpts),
    /// Write all extracted records to a JSON file
    Export {
        /// Output path
        #[arg(short, long, default_value = "data/regular_customers.json")]
        out: String,
    },
    /// Show scraping statistics
    Stats,
    /// Customers overview table
    Overview {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
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

    let result = match cli.command {
        Commands::Init { timeout_secs } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let client = fetch::build_client(Duration::from_secs(timeout_secs))?;
            let pages = discover::discover_customer_urls(&client).await?;
            let inserted = db::insert_pages(&conn, &pages)?;
            println!(
                "Inserted {} new customer URLs ({} total discovered)",
                inserted,
                pages.len()
            );
            Ok(())
        }
        Commands::Scrape(opts) => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unvisited(&conn, opts.limit)?;
            if pages.is_empty() {
                println!("No unvisited pages. Run 'init' first or all pages are fetched.");
                return Ok(());
            }
            println!("Fetching {} pages (sequential, streaming to DB)...", pages.len());
            let stats = scrape_pages(&conn, &opts, pages).await?;
            println!(
                "Done: {} fetched ({} ok, {} errors).",
                stats.total, stats.ok, stats.errors
            );
            Ok(())
        }
        Commands::Process { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unprocessed(&conn, limit)?;
            if pages.is_empty() {
                println!("No unprocessed pages. Run 'scrape' first.");
                return Ok(());
            }
            println!("Processing {} pages...", pages.len());
            let counts = process_pages(&conn, &pages)?;
            counts.print();
            Ok(())
        }
        Commands::Run(opts) => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let pages = db::fetch_unvisited(&conn, opts.limit)?;
            if pages.is_empty() {
                println!("No unvisited pages. Run 'init' first.");
                return Ok(());
            }

            // Phase 1: Fetch (streaming to DB)
            let t_fetch = Instant::now();
            println!("Pipeline: fetching {} pages...", pages.len());
            let stats = scrape_pages(&conn, &opts, pages).await?;
            println!(
                "Fetched {} pages ({} ok, {} errors) in {:.1}s",
                stats.total,
                stats.ok,
                stats.errors,
                t_fetch.elapsed().as_secs_f64()
            );

            // Phase 2: Process
            let t_process = Instant::now();
            let unprocessed = db::fetch_unprocessed(&conn, None)?;
            if unprocessed.is_empty() {
                println!("Nothing to process (all fetched pages had errors).");
                return Ok(());
            }
            println!("Processing {} pages...", unprocessed.len());
            let counts = process_pages(&conn, &unprocessed)?;
            println!("Processed in {:.1}s", t_process.elapsed().as_secs_f64());
            counts.print();
            Ok(())
        }
        Commands::Export { out } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let records = db::fetch_records(&conn)?;
            if records.is_empty() {
                println!("No records to export. Run 'process' first.");
                return Ok(());
            }
            let json = serde_json::to_string_pretty(&records)?;
            std::fs::write(&out, json)?;
            println!("Saved {} records to {}", records.len(), out);
            Ok(())
        }
        Commands::Overview { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, limit)?;
            if rows.is_empty() {
                println!("No customers found.");
                return Ok(());
            }

            // Compact, readable table
            println!(
                "{:>3} | {:<24} | {:<12} | {:>6} | {:>6} | {:>8}",
                "#", "Customer", "Lives in", "Weight", "Dishes", "Mementos"
            );
            println!("{}", "-".repeat(74));

            for (i, r) in rows.iter().enumerate() {
                let name = truncate(&r.name, 24);
                let lives_in = truncate(&r.lives_in, 12);
                let weight = r
                    .appearance_weight
                    .map(|w| w.to_string())
                    .unwrap_or_else(|| "-".into());

                println!(
                    "{:>3} | {:<24} | {:<12} | {:>6} | {:>6} | {:>8}",
                    i + 1,
                    name,
                    lives_in,
                    weight,
                    r.dish_count,
                    r.memento_count
                );
            }

            println!("\n{} customers | id: slug of display name", rows.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Total:     {}", s.total);
            println!("Visited:   {}", s.visited);
            println!("Unvisited: {}", s.unvisited);
            println!("Fetched:   {}", s.scraped);
            println!("Errors:    {}", s.errors);
            println!("Processed: {}", s.processed);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn scrape_pages(
    conn: &rusqlite::Connection,
    opts: &FetchOpts,
    pages: Vec<(i64, String, String)>,
) -> anyhow::Result<fetch::FetchStats> {
    let client = fetch::build_client(Duration::from_secs(opts.timeout_secs))?;
    fetch::fetch_pages_sequential(conn, &client, pages, Duration::from_millis(opts.delay_ms)).await
}

struct ProcessCounts {
    customers: usize,
    mementos: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!(
            "Saved {} customers, {} mementos.",
            self.customers, self.mementos,
        );
    }
}

fn process_pages(
    conn: &rusqlite::Connection,
    pages: &[db::ScrapedPage],
) -> anyhow::Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut counts = ProcessCounts {
        customers: 0,
        mementos: 0,
    };

    for chunk in pages.chunks(100) {
        let records: Vec<(String, records::CustomerRecord)> = chunk
            .par_iter()
            .map(|page| (page.slug.clone(), parser::process_page(page)))
            .collect();

        counts.customers += records.len();
        counts.mementos += records.iter().map(|(_, r)| r.mementos.len()).sum::<usize>();
        db::save_customers(conn, &records)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
