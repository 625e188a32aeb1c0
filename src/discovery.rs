use scraper::Html;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::AppConfig;
use crate::fetcher::PageFetcher;
use crate::models::SelectorSpec;
use crate::selector_engine::SelectorEngine;
use crate::utils::error::DiscoveryError;

/// How listing pages are found and walked.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub base_url: String,
    pub start_page: u32,
    pub max_pages: Option<u32>,
    pub page_url_pattern: Option<String>,
    pub product_links: SelectorSpec,
    pub pagination_next: Option<SelectorSpec>,
}

impl From<&AppConfig> for DiscoveryOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.scraper.base_url.clone(),
            start_page: config.scraper.start_page,
            max_pages: config.scraper.max_pages,
            page_url_pattern: config.scraper.page_url_pattern.clone(),
            product_links: config.selectors.product_links.clone(),
            pagination_next: config.selectors.pagination_next.clone(),
        }
    }
}

impl DiscoveryOptions {
    fn page_url(&self, page: u32) -> String {
        match &self.page_url_pattern {
            Some(pattern) if page > 1 => pattern.replace("{page}", &page.to_string()),
            _ => self.base_url.clone(),
        }
    }
}

struct ListingPage {
    links: Vec<String>,
    next: Option<String>,
}

/// Walks paginated listings sequentially and collects product URLs in first-seen order.
pub struct LinkDiscoverer {
    fetcher: Arc<dyn PageFetcher>,
    engine: SelectorEngine,
    options: DiscoveryOptions,
}

impl LinkDiscoverer {
    pub fn new(fetcher: Arc<dyn PageFetcher>, options: DiscoveryOptions) -> Self {
        Self {
            fetcher,
            engine: SelectorEngine::new(),
            options,
        }
    }

    /// Stops at the first page with no new links, at `max_pages`, when pagination runs out,
    /// or when `cancel` fires. A listing that cannot be fetched is a `DiscoveryError`, except
    /// a 404 past the first page in URL-pattern mode, which is the end of the catalog.
    pub async fn discover(&self, cancel: &CancellationToken) -> Result<Vec<String>, DiscoveryError> {
        if Url::parse(&self.options.base_url).is_err() {
            return Err(DiscoveryError::InvalidUrl {
                url: self.options.base_url.clone(),
                message: "not an absolute URL".to_string(),
            });
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut links: Vec<String> = Vec::new();
        let mut visited_pages: HashSet<String> = HashSet::new();
        let mut page = self.options.start_page.max(1);
        let mut page_url = self.options.page_url(page);
        let mut pages_fetched: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                info!("Discovery interrupted after {} pages", pages_fetched);
                break;
            }
            if let Some(max_pages) = self.options.max_pages {
                if pages_fetched >= max_pages {
                    info!("Reached page limit ({})", max_pages);
                    break;
                }
            }
            if !visited_pages.insert(page_url.clone()) {
                debug!("Pagination looped back to {}", page_url);
                break;
            }

            let html = match self.fetcher.fetch(&page_url).await {
                Ok(html) => html,
                Err(e)
                    if e.is_not_found()
                        && pages_fetched > 0
                        && self.options.page_url_pattern.is_some() =>
                {
                    debug!("Listing page {} not found, end of catalog", page);
                    break;
                }
                Err(source) => {
                    return Err(DiscoveryError::ListingFetch {
                        page,
                        url: page_url,
                        source,
                    });
                }
            };
            pages_fetched += 1;

            let listing = self.parse_listing(&html, &page_url);
            let new_links = listing
                .links
                .into_iter()
                .filter(|link| seen.insert(link.clone()))
                .fold(0usize, |count, link| {
                    links.push(link);
                    count + 1
                });

            info!(
                "Page {}: {} new products (total {})",
                page,
                new_links,
                links.len()
            );

            if new_links == 0 {
                break;
            }

            page += 1;
            page_url = if self.options.page_url_pattern.is_some() {
                self.options.page_url(page)
            } else {
                match listing.next {
                    Some(next) => next,
                    None => break,
                }
            };
        }

        Ok(links)
    }

    // Parsing stays synchronous: `Html` is not `Send` and must not live across an await.
    fn parse_listing(&self, html: &str, page_url: &str) -> ListingPage {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();

        let links = self
            .engine
            .extract_all(&document, &self.options.product_links)
            .into_iter()
            .filter_map(|href| resolve(base.as_ref(), &href))
            .collect();

        let next = self
            .options
            .pagination_next
            .as_ref()
            .and_then(|spec| self.engine.extract(&document, spec))
            .and_then(|href| resolve(base.as_ref(), &href));

        ListingPage { links, next }
    }
}

pub(crate) fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    let resolved = match base {
        Some(base) => base.join(href),
        None => Url::parse(href),
    };
    match resolved {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url.to_string()),
        Ok(_) => None,
        Err(e) => {
            warn!("Skipping unresolvable link '{}': {}", href, e);
            None
        }
    }
}
