pub mod dom;
pub mod extract;
pub mod resolve;
pub mod text;

use scraper::Html;

use crate::db::ScrapedPage;
use crate::records::CustomerRecord;

/// Parse a stored article page into one customer record.
pub fn process_page(page: &ScrapedPage) -> CustomerRecord {
    let doc = Html::parse_document(&page.html);
    extract::customer::extract(&doc, &page.url)
}
