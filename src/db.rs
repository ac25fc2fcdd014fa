use anyhow::Result;
use rusqlite::Connection;

use crate::records::{CustomerRecord, MementoRecord, Requirements, MEMENTO_SOURCE};

const DB_PATH: &str = "data/customers.sqlite";

pub fn connect() -> Result<Connection> {
    std::fs::create_dir_all("data")?;
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pages (
            id         INTEGER PRIMARY KEY,
            url        TEXT UNIQUE NOT NULL,
            slug       TEXT NOT NULL,
            visited    BOOLEAN NOT NULL DEFAULT 0,
            visited_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_pages_visited ON pages(visited);

        CREATE TABLE IF NOT EXISTS page_data (
            id         INTEGER PRIMARY KEY,
            page_id    INTEGER NOT NULL REFERENCES pages(id),
            url        TEXT NOT NULL,
            slug       TEXT NOT NULL,
            html       TEXT,
            status     INTEGER,
            error      TEXT,
            latency_ms INTEGER,
            scraped_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_page_data_slug ON page_data(slug);

        -- Extracted records. List-valued fields are stored as JSON text
        -- so the export reproduces them exactly, order included.
        CREATE TABLE IF NOT EXISTS customers (
            url               TEXT PRIMARY KEY,
            page_slug         TEXT NOT NULL,
            id                TEXT NOT NULL,
            name              TEXT NOT NULL,
            tags              TEXT NOT NULL,
            lives_in          TEXT,
            appearance_weight INTEGER,
            required_food_id  TEXT,
            dishes_ordered    TEXT NOT NULL,
            description       TEXT NOT NULL,
            facilities        TEXT NOT NULL,
            letters           TEXT NOT NULL,
            flowers           TEXT NOT NULL,
            created_at        TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_customers_id ON customers(id);

        CREATE TABLE IF NOT EXISTS mementos (
            id           INTEGER PRIMARY KEY,
            page_url     TEXT NOT NULL REFERENCES customers(url),
            position     INTEGER NOT NULL,
            memento_id   TEXT NOT NULL,
            name         TEXT NOT NULL,
            stars        INTEGER,
            requirement  TEXT,
            description  TEXT,
            UNIQUE(page_url, position)
        );
        CREATE INDEX IF NOT EXISTS idx_mementos_page ON mementos(page_url);
        ",
    )?;
    Ok(())
}

// ── Discovery / fetching ──

pub fn insert_pages(conn: &Connection, pages: &[(String, String)]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare("INSERT OR IGNORE INTO pages (url, slug) VALUES (?1, ?2)")?;
        for (url, slug) in pages {
            count += stmt.execute(rusqlite::params![url, slug])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_unvisited(
    conn: &Connection,
    limit: Option<usize>,
) -> Result<Vec<(i64, String, String)>> {
    // Discovery order is alphabetical by URL; keep it for output ordering.
    let sql = match limit {
        Some(n) => format!(
            "SELECT id, url, slug FROM pages WHERE visited = 0 ORDER BY url LIMIT {}",
            n
        ),
        None => "SELECT id, url, slug FROM pages WHERE visited = 0 ORDER BY url".to_string(),
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct FetchRow {
    pub page_id: i64,
    pub url: String,
    pub slug: String,
    pub html: Option<String>,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

// ── Processing ──

pub struct ScrapedPage {
    pub slug: String,
    pub url: String,
    pub html: String,
}

pub fn fetch_unprocessed(conn: &Connection, limit: Option<usize>) -> Result<Vec<ScrapedPage>> {
    let sql = format!(
        "SELECT pd.slug, pd.url, pd.html
         FROM page_data pd
         LEFT JOIN customers c ON c.url = pd.url
         WHERE pd.html IS NOT NULL AND c.url IS NULL
         ORDER BY pd.url{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ScrapedPage {
                slug: row.get(0)?,
                url: row.get(1)?,
                html: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Extracted data ──

pub fn save_customers(conn: &Connection, rows: &[(String, CustomerRecord)]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut c_stmt = tx.prepare(
            "INSERT OR REPLACE INTO customers
             (url, page_slug, id, name, tags, lives_in, appearance_weight,
              required_food_id, dishes_ordered, description, facilities, letters, flowers)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
        )?;
        let mut m_del = tx.prepare("DELETE FROM mementos WHERE page_url = ?1")?;
        let mut m_stmt = tx.prepare(
            "INSERT INTO mementos
             (page_url, position, memento_id, name, stars, requirement, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;

        // REPLACE deletes the old parent row; child rows must go first.
        for (page_slug, c) in rows {
            m_del.execute(rusqlite::params![c.source_url])?;
            c_stmt.execute(rusqlite::params![
                c.source_url,
                page_slug,
                c.id,
                c.name,
                serde_json::to_string(&c.tags)?,
                c.lives_in,
                c.appearance_weight,
                c.required_food_id,
                serde_json::to_string(&c.dishes_ordered_ids)?,
                c.customer_description,
                serde_json::to_string(&c.requirements.facilities)?,
                serde_json::to_string(&c.requirements.letters)?,
                serde_json::to_string(&c.requirements.flowers)?,
            ])?;

            for (pos, m) in c.mementos.iter().enumerate() {
                m_stmt.execute(rusqlite::params![
                    c.source_url,
                    pos as i64,
                    m.id,
                    m.name,
                    m.stars,
                    m.requirement,
                    m.description,
                ])?;
            }
        }
    }
    tx.commit()?;
    Ok(())
}

/// Rebuild the full record list in discovery (alphabetical URL) order.
pub fn fetch_records(conn: &Connection) -> Result<Vec<CustomerRecord>> {
    let mut stmt = conn.prepare(
        "SELECT url, id, name, tags, lives_in, appearance_weight,
                required_food_id, dishes_ordered, description, facilities, letters, flowers
         FROM customers
         ORDER BY url",
    )?;
    let mut m_stmt = conn.prepare(
        "SELECT memento_id, name, stars, requirement, description
         FROM mementos WHERE page_url = ?1 ORDER BY position",
    )?;

    let partial = stmt
        .query_map([], |row| {
            let tags: String = row.get(3)?;
            let dishes: String = row.get(7)?;
            let facilities: String = row.get(9)?;
            let letters: String = row.get(10)?;
            let flowers: String = row.get(11)?;
            Ok(CustomerRecord {
                source_url: row.get(0)?,
                id: row.get(1)?,
                name: row.get(2)?,
                tags: serde_json::from_str(&tags).unwrap_or_default(),
                lives_in: row.get(4)?,
                appearance_weight: row.get(5)?,
                required_food_id: row.get(6)?,
                dishes_ordered_ids: serde_json::from_str(&dishes).unwrap_or_default(),
                customer_description: row.get(8)?,
                requirements: Requirements {
                    rating: None,
                    recipes: Vec::new(),
                    facilities: serde_json::from_str(&facilities).unwrap_or_default(),
                    letters: serde_json::from_str(&letters).unwrap_or_default(),
                    customers: Vec::new(),
                    flowers: serde_json::from_str(&flowers).unwrap_or_default(),
                },
                mementos: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut records = Vec::with_capacity(partial.len());
    for mut record in partial {
        record.mementos = m_stmt
            .query_map([&record.source_url], |row| {
                Ok(MementoRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    stars: row.get(2)?,
                    requirement: row.get(3)?,
                    description: row.get(4)?,
                    tags: vec![MEMENTO_SOURCE.to_string()],
                    source: MEMENTO_SOURCE.to_string(),
                    share_reward: None,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        records.push(record);
    }
    Ok(records)
}

// ── Overview ──

pub struct OverviewRow {
    pub id: String,
    pub name: String,
    pub lives_in: String,
    pub appearance_weight: Option<i64>,
    pub dish_count: i64,
    pub memento_count: i64,
}

pub fn fetch_overview(conn: &Connection, limit: usize) -> Result<Vec<OverviewRow>> {
    let sql = format!(
        "SELECT c.id, c.name, COALESCE(c.lives_in,''), c.appearance_weight,
                c.dishes_ordered,
                (SELECT COUNT(*) FROM mementos m WHERE m.page_url = c.url)
         FROM customers c
         ORDER BY c.url
         LIMIT {}",
        limit
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            let dishes: String = row.get(4)?;
            let dish_count = serde_json::from_str::<Vec<String>>(&dishes)
                .map(|v| v.len() as i64)
                .unwrap_or(0);
            Ok(OverviewRow {
                id: row.get(0)?,
                name: row.get(1)?,
                lives_in: row.get(2)?,
                appearance_weight: row.get(3)?,
                dish_count,
                memento_count: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub visited: usize,
    pub unvisited: usize,
    pub scraped: usize,
    pub errors: usize,
    pub processed: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM pages", [], |r| r.get(0))?;
    let visited: usize =
        conn.query_row("SELECT COUNT(*) FROM pages WHERE visited = 1", [], |r| r.get(0))?;
    let scraped: usize = conn.query_row("SELECT COUNT(*) FROM page_data", [], |r| r.get(0))?;
    let errors: usize = conn.query_row(
        "SELECT COUNT(*) FROM page_data WHERE error IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let processed: usize =
        conn.query_row("SELECT COUNT(*) FROM customers", [], |r| r.get(0))?;
    Ok(Stats {
        total,
        visited,
        unvisited: total - visited,
        scraped,
        errors,
        processed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn wiki(name: &str) -> String {
        format!("https://animalrestaurant.fandom.com/wiki/{}", name)
    }

    fn store_page_data(conn: &Connection, row: &FetchRow) {
        conn.execute(
            "INSERT INTO page_data (page_id, url, slug, html, status, error, latency_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                row.page_id, row.url, row.slug, row.html, row.status, row.error, row.latency_ms,
            ],
        )
        .unwrap();
    }

    fn fetched(page_id: i64, slug: &str, html: Option<&str>, error: Option<&str>) -> FetchRow {
        FetchRow {
            page_id,
            url: wiki(slug),
            slug: slug.to_string(),
            html: html.map(str::to_string),
            status: if error.is_some() { None } else { Some(200) },
            error: error.map(str::to_string),
            latency_ms: Some(5),
        }
    }

    fn customer(name: &str, url: &str) -> CustomerRecord {
        CustomerRecord {
            id: crate::parser::text::slugify(name),
            name: name.to_string(),
            tags: vec!["customer".to_string()],
            lives_in: None,
            appearance_weight: None,
            required_food_id: None,
            dishes_ordered_ids: Vec::new(),
            customer_description: String::new(),
            requirements: Requirements::default(),
            mementos: Vec::new(),
            source_url: url.to_string(),
        }
    }

    #[test]
    fn failed_fetch_drops_only_its_own_record() {
        let conn = mem_conn();
        let slugs = ["Ada", "Bell", "Coco", "Daisy", "Elva"];
        let pages: Vec<_> = slugs
            .iter()
            .map(|s| (wiki(s), s.to_lowercase()))
            .collect();
        assert_eq!(insert_pages(&conn, &pages).unwrap(), 5);

        for (i, slug) in slugs.iter().enumerate() {
            let row = if *slug == "Coco" {
                fetched(i as i64 + 1, slug, None, Some("HTTP 404 Not Found"))
            } else {
                fetched(i as i64 + 1, slug, Some("<html></html>"), None)
            };
            store_page_data(&conn, &row);
        }

        let unprocessed = fetch_unprocessed(&conn, None).unwrap();
        assert_eq!(unprocessed.len(), 4);
        assert!(unprocessed.iter().all(|p| p.slug != "coco"));

        let rows: Vec<_> = unprocessed
            .iter()
            .map(|p| (p.slug.clone(), customer(&p.slug, &p.url)))
            .collect();
        save_customers(&conn, &rows).unwrap();

        let records = fetch_records(&conn).unwrap();
        let urls: Vec<_> = records.iter().map(|r| r.source_url.clone()).collect();
        assert_eq!(urls, vec![wiki("Ada"), wiki("Bell"), wiki("Daisy"), wiki("Elva")]);

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.processed, 4);
    }

    #[test]
    fn distinct_urls_sharing_a_slug_both_survive() {
        let conn = mem_conn();
        let mut a = customer("Mr. Smith", &wiki("Mr._Smith"));
        a.mementos = vec![MementoRecord::customer_gift(
            "Top Hat".to_string(),
            Some(45),
            None,
            None,
        )];
        let mut b = customer("Mr Smith", &wiki("Mr_Smith"));
        b.mementos = vec![MementoRecord::customer_gift(
            "Pocket Watch".to_string(),
            Some(60),
            None,
            None,
        )];
        save_customers(
            &conn,
            &[("mr_smith".to_string(), a), ("mr_smith".to_string(), b)],
        )
        .unwrap();

        let records = fetch_records(&conn).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].mementos[0].name, "Top Hat");
        assert_eq!(records[1].mementos[0].name, "Pocket Watch");
    }

    #[test]
    fn reprocessing_a_page_replaces_its_mementos() {
        let conn = mem_conn();
        let mut c = customer("Gumi", &wiki("Gumi"));
        c.mementos = vec![MementoRecord::customer_gift(
            "Tiny Umbrella".to_string(),
            Some(45),
            None,
            None,
        )];
        save_customers(&conn, &[("gumi".to_string(), c.clone())]).unwrap();

        c.mementos = vec![MementoRecord::customer_gift(
            "Acorn Pouch".to_string(),
            Some(90),
            None,
            None,
        )];
        save_customers(&conn, &[("gumi".to_string(), c)]).unwrap();

        let records = fetch_records(&conn).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].mementos.len(), 1);
        assert_eq!(records[0].mementos[0].name, "Acorn Pouch");
    }
}
