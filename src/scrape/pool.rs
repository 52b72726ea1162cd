use super::extractor::ContentExtractor;
use crate::browser::{BrowserError, BrowserSession, PageSurface};
use crate::models::{ContentIdentifier, ExtractedItem};
use futures::future::join_all;
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Fans single-post extraction out over a fixed number of workers
///
/// Every identifier gets its own surface. The output has one entry per input
/// identifier, in input order; failed items come back as placeholders.
pub struct ExtractionPool<'a, B: BrowserSession> {
    session: &'a B,
    extractor: &'a ContentExtractor,
    base_url: &'a str,
    max_concurrency: usize,
    item_timeout: Option<Duration>,
}

type Queue<'q> = Mutex<VecDeque<(usize, &'q ContentIdentifier)>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<'a, B: BrowserSession> ExtractionPool<'a, B> {
    pub fn new(
        session: &'a B,
        extractor: &'a ContentExtractor,
        base_url: &'a str,
        max_concurrency: usize,
    ) -> Self {
        Self {
            session,
            extractor,
            base_url,
            max_concurrency,
            item_timeout: None,
        }
    }

    /// Abandon an item that takes longer than `timeout`
    pub fn with_item_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.item_timeout = timeout;
        self
    }

    /// Number of workers used for `items` identifiers
    pub fn worker_count(&self, items: usize) -> usize {
        self.max_concurrency.max(1).min(items)
    }

    pub async fn run(&self, identifiers: &[ContentIdentifier]) -> Vec<ExtractedItem> {
        if identifiers.is_empty() {
            return Vec::new();
        }

        let workers = self.worker_count(identifiers.len());
        info!(
            "Extracting {} posts with {} workers",
            identifiers.len(),
            workers
        );

        let queue: Queue<'_> = Mutex::new(identifiers.iter().enumerate().collect());
        let results: Mutex<Vec<Option<ExtractedItem>>> = Mutex::new(vec![None; identifiers.len()]);

        join_all((0..workers).map(|worker| self.worker(worker, &queue, &results))).await;

        let slots = results
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slots
            .into_iter()
            .zip(identifiers)
            .map(|(slot, id)| {
                slot.unwrap_or_else(|| ExtractedItem::placeholder(id.canonical_link(self.base_url)))
            })
            .collect()
    }

    async fn worker(
        &self,
        worker: usize,
        queue: &Queue<'_>,
        results: &Mutex<Vec<Option<ExtractedItem>>>,
    ) {
        loop {
            // Guard dropped before any await
            let next = lock(queue).pop_front();
            let Some((index, identifier)) = next else {
                debug!("Worker {} idle, queue drained", worker);
                return;
            };

            let link = identifier.canonical_link(self.base_url);
            let item = match self.process(identifier, &link).await {
                Ok(item) => item,
                Err(e) => {
                    warn!("Extraction failed for {}: {}", link, e);
                    ExtractedItem::placeholder(link)
                }
            };
            lock(results)[index] = Some(item);
        }
    }

    async fn process(
        &self,
        identifier: &ContentIdentifier,
        link: &str,
    ) -> Result<ExtractedItem, BrowserError> {
        let surface = self.session.open_surface().await?;

        let work = async {
            surface.navigate(link).await?;
            self.extractor.extract(surface.as_ref(), identifier, link).await
        };
        let outcome = match self.item_timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(result) => result,
                Err(_) => Err(BrowserError::Timeout(format!(
                    "{} after {}s",
                    link,
                    limit.as_secs()
                ))),
            },
            None => work.await,
        };

        if let Err(e) = surface.close().await {
            debug!("Closing surface for {} failed: {}", link, e);
        }
        outcome
    }
}
