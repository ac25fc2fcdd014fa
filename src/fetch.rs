use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::FetchRow;

/// Descriptive agent so wiki operators can identify and contact us.
const USER_AGENT: &str =
    "AnimalRestaurantTracker/1.0 (customer data scraper; +https://example.com)";

pub const DEFAULT_DELAY_MS: u64 = 350;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Fetch stats returned after completion.
pub struct FetchStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Fetch pages one at a time with a politeness delay between requests,
/// saving each result to DB as it arrives. A failed URL is recorded and
/// skipped; it never aborts the batch.
pub async fn fetch_pages_sequential(
    conn: &Connection,
    client: &reqwest::Client,
    pages: Vec<(i64, String, String)>,
    delay: Duration,
) -> Result<FetchStats> {
    let total = pages.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Prepare statements once, reuse for each row
    let mut insert_stmt = conn.prepare(
        "INSERT INTO page_data (page_id, url, slug, html, status, error, latency_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    let mut update_stmt = conn.prepare(
        "UPDATE pages SET visited = 1, visited_at = datetime('now') WHERE id = ?1",
    )?;

    let mut ok = 0usize;
    let mut errors = 0usize;

    for (i, (page_id, url, slug)) in pages.into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(delay).await;
        }

        let row = fetch_one(client, page_id, &url, &slug).await;
        match &row.error {
            Some(e) => {
                errors += 1;
                warn!("Fetch failed for {}: {}", url, e);
            }
            None => ok += 1,
        }

        save_one(&mut insert_stmt, &mut update_stmt, &row)?;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Fetched {} pages ({} ok, {} errors)", total, ok, errors);

    Ok(FetchStats { total, ok, errors })
}

/// Save a single fetch result to DB using pre-prepared statements.
fn save_one(
    insert: &mut rusqlite::Statement,
    update: &mut rusqlite::Statement,
    row: &FetchRow,
) -> Result<()> {
    insert.execute(rusqlite::params![
        row.page_id, row.url, row.slug, row.html, row.status, row.error, row.latency_ms,
    ])?;
    update.execute(rusqlite::params![row.page_id])?;
    Ok(())
}

async fn fetch_one(client: &reqwest::Client, page_id: i64, url: &str, slug: &str) -> FetchRow {
    let start = Instant::now();
    let response = client.get(url).send().await;
    let elapsed = start.elapsed().as_millis() as i64;

    let row = |html, status, error| FetchRow {
        page_id,
        url: url.to_string(),
        slug: slug.to_string(),
        html,
        status,
        error,
        latency_ms: Some(elapsed),
    };

    match response {
        Ok(resp) => {
            let status = resp.status();
            if !status.is_success() {
                return row(
                    None,
                    Some(status.as_u16() as i32),
                    Some(format!("HTTP {}", status)),
                );
            }
            match resp.text().await {
                Ok(html) => row(Some(html), Some(status.as_u16() as i32), None),
                Err(e) => row(None, Some(status.as_u16() as i32), Some(e.to_string())),
            }
        }
        Err(e) => row(None, None, Some(e.to_string())),
    }
}
