//! Frontier and visited set
//!
//! The visited set is only reachable through [`Frontier::seed`],
//! [`Frontier::offer`] and [`Frontier::redirect`]; each checks and inserts
//! under the same lock as the queue push, so a URL is accepted at most once no
//! matter how many workers offer it or how many redirects point at it.

use crate::url::{normalize_parsed, normalize_url, SiteScope};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use url::Url;

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Normalized URL
    pub url: Url,

    /// Page the URL was found on; None for the seed
    pub discovered_from: Option<String>,

    /// Link distance from the seed
    pub depth: u32,
}

/// Why an offered URL was not enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferRejection {
    /// Unparseable, non-HTTP(S), or without a host
    Invalid,

    /// Host or port differs from the seed
    OutOfScope,

    /// Already accepted once during this run
    AlreadyVisited,

    /// Beyond the configured maximum depth
    TooDeep,
}

#[derive(Debug, Default)]
struct FrontierInner {
    /// Normalized URL -> depth it was accepted at
    visited: HashMap<String, u32>,
    queue: VecDeque<CrawlTask>,
}

/// FIFO queue of URLs still to fetch, with the run's visited set
#[derive(Debug)]
pub struct Frontier {
    scope: SiteScope,
    max_depth: Option<u32>,
    inner: Mutex<FrontierInner>,
}

impl Frontier {
    pub fn new(scope: SiteScope, max_depth: Option<u32>) -> Self {
        Self {
            scope,
            max_depth,
            inner: Mutex::new(FrontierInner::default()),
        }
    }

    pub fn scope(&self) -> &SiteScope {
        &self.scope
    }

    fn inner(&self) -> MutexGuard<'_, FrontierInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues the seed at depth 0
    ///
    /// Returns false if the seed is out of scope or was already seeded.
    pub fn seed(&self, seed: &Url) -> bool {
        let url = match normalize_parsed(seed.clone()) {
            Ok(url) => url,
            Err(_) => return false,
        };
        if !self.scope.contains(&url) {
            return false;
        }

        let mut inner = self.inner();
        if inner.visited.contains_key(url.as_str()) {
            return false;
        }
        inner.visited.insert(url.as_str().to_string(), 0);
        inner.queue.push_back(CrawlTask {
            url,
            discovered_from: None,
            depth: 0,
        });
        true
    }

    /// Offers a discovered link; returns true if it was enqueued
    pub fn offer(&self, url: &str, source_page: &str) -> bool {
        self.try_offer(url, source_page).is_ok()
    }

    /// Offers a discovered link, reporting why it was rejected
    ///
    /// The new task's depth is one more than the depth `source_page` was
    /// accepted at (0 if the source is unknown).
    pub fn try_offer(&self, url: &str, source_page: &str) -> Result<(), OfferRejection> {
        let url = normalize_url(url).map_err(|_| OfferRejection::Invalid)?;
        if !self.scope.contains(&url) {
            return Err(OfferRejection::OutOfScope);
        }

        let mut inner = self.inner();
        if inner.visited.contains_key(url.as_str()) {
            return Err(OfferRejection::AlreadyVisited);
        }

        let source_depth = normalize_url(source_page)
            .ok()
            .and_then(|source| inner.visited.get(source.as_str()).copied())
            .unwrap_or(0);
        let depth = source_depth.saturating_add(1);
        if matches!(self.max_depth, Some(max) if depth > max) {
            return Err(OfferRejection::TooDeep);
        }

        inner.visited.insert(url.as_str().to_string(), depth);
        inner.queue.push_back(CrawlTask {
            url,
            discovered_from: Some(source_page.to_string()),
            depth,
        });
        Ok(())
    }

    /// Hands a redirect target back to the queue
    ///
    /// The target inherits the redirected task's depth and source page, so a
    /// document reached through a redirect keeps the page that linked to it as
    /// its provenance.
    pub fn redirect(&self, target: &Url, from: &CrawlTask) -> Result<(), OfferRejection> {
        let url = normalize_parsed(target.clone()).map_err(|_| OfferRejection::Invalid)?;
        if !self.scope.contains(&url) {
            return Err(OfferRejection::OutOfScope);
        }

        let mut inner = self.inner();
        if inner.visited.contains_key(url.as_str()) {
            return Err(OfferRejection::AlreadyVisited);
        }

        inner.visited.insert(url.as_str().to_string(), from.depth);
        inner.queue.push_back(CrawlTask {
            url,
            discovered_from: from.discovered_from.clone(),
            depth: from.depth,
        });
        Ok(())
    }

    /// Takes the oldest queued task
    pub fn next(&self) -> Option<CrawlTask> {
        self.inner().queue.pop_front()
    }

    /// Number of tasks waiting in the queue
    pub fn pending(&self) -> usize {
        self.inner().queue.len()
    }

    /// Number of URLs ever accepted
    pub fn visited_count(&self) -> usize {
        self.inner().visited.len()
    }

    /// Returns true if the URL (after normalization) was already accepted
    pub fn is_visited(&self, url: &str) -> bool {
        match normalize_url(url) {
            Ok(url) => self.inner().visited.contains_key(url.as_str()),
            Err(_) => false,
        }
    }
}
