//! Search pipeline: discover post identifiers on a results page, then extract
//! each post on its own surface.

pub mod discovery;
pub mod extractor;
pub mod pool;

use crate::browser::{BrowserSession, PageSurface};
use crate::config::Config;
use crate::error::Result;
use crate::models::SearchOutcome;
use crate::session::SessionCredential;
use log::{debug, info};

pub use discovery::{discover_identifiers, parse_identifiers};
pub use extractor::{Absent, ContentExtractor, FieldResult};
pub use pool::ExtractionPool;

/// Run one search against an authenticated session. Nothing is persisted.
///
/// An empty discovery pass returns [`SearchOutcome::empty`] without starting
/// the extraction pool.
pub async fn search<B: BrowserSession>(
    session: &B,
    credential: &SessionCredential,
    config: &Config,
    keywords: &str,
    depth: u32,
) -> Result<SearchOutcome> {
    let url = config.site.search_url(keywords);
    info!("Searching {:?} (depth {})", keywords, depth);

    let surface = session.open_surface().await?;
    let discovered = async {
        credential.restore(surface.as_ref(), &config.site.base_url).await?;
        surface.navigate(&url).await?;
        discover_identifiers(
            surface.as_ref(),
            &config.selectors,
            depth,
            config.scrape.scroll_settle(),
        )
        .await
    }
    .await;
    if let Err(e) = surface.close().await {
        debug!("Closing results surface failed: {}", e);
    }
    let identifiers = discovered?;

    if identifiers.is_empty() {
        info!("No posts found for {:?}", keywords);
        return Ok(SearchOutcome::empty());
    }

    let extractor = ContentExtractor::new(config);
    let items = ExtractionPool::new(
        session,
        &extractor,
        &config.site.base_url,
        config.scrape.max_concurrency,
    )
    .with_item_timeout(config.scrape.item_timeout())
    .run(&identifiers)
    .await;

    let outcome = SearchOutcome::from_items(items);
    info!("Search {:?} finished: {:?}", keywords, outcome.status);
    Ok(outcome)
}
