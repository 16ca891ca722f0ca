//! Demo catalogue loaded into empty stores.

use time::macros::datetime;
use time::OffsetDateTime;

use crate::error::Result;
use crate::record::CatalogEntry;
use crate::store::CatalogStore;

fn entry(
    title: &str,
    author: &str,
    publisher: &str,
    published: OffsetDateTime,
    category: &str,
    isbn: &str,
    page_count: u32,
) -> CatalogEntry {
    CatalogEntry {
        title: title.to_string(),
        author: author.to_string(),
        description: format!("{title} by {author}."),
        cover_image: String::new(),
        publisher: publisher.to_string(),
        publication_date: Some(published),
        category: category.to_string(),
        isbn: isbn.to_string(),
        page_count,
    }
}

fn demo_catalog() -> Vec<CatalogEntry> {
    vec![
        entry(
            "The Rust Programming Language",
            "Steve Klabnik",
            "No Starch Press",
            datetime!(2019-08-12 0:00 UTC),
            "Programming",
            "9781718500440",
            560,
        ),
        entry(
            "Programming Rust",
            "Jim Blandy",
            "O'Reilly Media",
            datetime!(2021-07-20 0:00 UTC),
            "Programming",
            "9781492052593",
            738,
        ),
        entry(
            "A Wizard of Earthsea",
            "Ursula K. Le Guin",
            "Parnassus Press",
            datetime!(1968-11-01 0:00 UTC),
            "Fantasy",
            "9780547773742",
            183,
        ),
        entry(
            "The Left Hand of Darkness",
            "Ursula K. Le Guin",
            "Ace Books",
            datetime!(1969-03-01 0:00 UTC),
            "Science Fiction",
            "9780441478125",
            304,
        ),
    ]
}

/// Populate `store` with the demo catalogue unless it already holds books.
///
/// Returns the number of books inserted.
pub async fn seed_demo_catalog(store: &dyn CatalogStore) -> Result<usize> {
    if !store.list_books().await?.is_empty() {
        tracing::debug!(target: "biblio-db", "catalog already populated; skipping seed");
        return Ok(0);
    }

    let catalog = demo_catalog();
    let count = catalog.len();
    for entry in catalog {
        store.insert_book(entry).await?;
    }

    tracing::info!(target: "biblio-db", count, "seeded demo catalog");
    Ok(count)
}
