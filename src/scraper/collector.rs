// collector.rs
use crate::domain::{CollectionResult, CollectionStatus, Listing, PropertyType, TradeType};
use crate::scraper::models::{ArticleQuery, BoundingBox, UpstreamFilter};
use crate::scraper::retry::RequestPolicy;
use crate::scraper::{FetchFailure, ListingSource};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// When to ask for another page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContinuationPolicy {
    /// Follow the `more` flag, but also keep going after a full page. Upstream
    /// sometimes reports `more=false` on a page that is not the last.
    #[default]
    FlagOrFullPage,
    FlagOnly,
}

impl FromStr for ContinuationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "flag-or-full-page" => Ok(ContinuationPolicy::FlagOrFullPage),
            "flag-only" => Ok(ContinuationPolicy::FlagOnly),
            other => Err(format!("Invalid ContinuationPolicy: {other}")),
        }
    }
}

impl fmt::Display for ContinuationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContinuationPolicy::FlagOrFullPage => write!(f, "flag-or-full-page"),
            ContinuationPolicy::FlagOnly => write!(f, "flag-only"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectorOptions {
    pub page_size: usize,
    pub max_pages: u32,
    pub continuation: ContinuationPolicy,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            page_size: 20,
            max_pages: 100,
            continuation: ContinuationPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    Exhausted,
    Truncated,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Init,
    Fetching { page: u32 },
    Done { reason: DoneReason, pages: u32 },
    Failed { page: u32 },
}

/// What a fetched page told us about continuing.
#[derive(Debug, Clone, Copy)]
pub struct PageOutcome {
    pub record_count: usize,
    pub more: bool,
}

/// The pagination state machine, free of any I/O.
#[derive(Debug, Clone)]
pub struct Pagination {
    options: CollectorOptions,
    state: PageState,
}

impl Pagination {
    pub fn new(options: CollectorOptions) -> Self {
        Self {
            options,
            state: PageState::Init,
        }
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn start(&mut self) {
        if self.state == PageState::Init {
            self.state = if self.options.max_pages == 0 {
                PageState::Done {
                    reason: DoneReason::Truncated,
                    pages: 0,
                }
            } else {
                PageState::Fetching { page: 1 }
            };
        }
    }

    /// The page to fetch next, if any.
    pub fn next_page(&self) -> Option<u32> {
        match self.state {
            PageState::Fetching { page } => Some(page),
            _ => None,
        }
    }

    pub fn advance(&mut self, outcome: PageOutcome) -> PageState {
        let PageState::Fetching { page } = self.state else {
            return self.state;
        };

        let wants_more = outcome.record_count > 0
            && (outcome.more
                || (self.options.continuation == ContinuationPolicy::FlagOrFullPage
                    && outcome.record_count >= self.options.page_size));

        self.state = if !wants_more {
            PageState::Done {
                reason: DoneReason::Exhausted,
                pages: page,
            }
        } else if page >= self.options.max_pages {
            PageState::Done {
                reason: DoneReason::Truncated,
                pages: page,
            }
        } else {
            PageState::Fetching { page: page + 1 }
        };
        self.state
    }

    pub fn fail(&mut self) {
        if let PageState::Fetching { page } = self.state {
            self.state = PageState::Failed { page };
        }
    }

    pub fn cancel(&mut self) {
        let pages = match self.state {
            PageState::Fetching { page } => page - 1,
            PageState::Init => 0,
            _ => return,
        };
        self.state = PageState::Done {
            reason: DoneReason::Cancelled,
            pages,
        };
    }
}

/// Everything needed to collect one region.
#[derive(Debug, Clone)]
pub struct CollectionRequest {
    pub region_code: String,
    pub trade_type: TradeType,
    pub property_type: PropertyType,
    pub bbox: BoundingBox,
    pub filter: UpstreamFilter,
}

/// Walks every page of one region and normalizes what comes back.
pub struct Collector<S> {
    source: S,
    policy: RequestPolicy,
    options: CollectorOptions,
    stop: Option<Arc<AtomicBool>>,
}

impl<S: ListingSource> Collector<S> {
    pub fn new(source: S, policy: RequestPolicy, options: CollectorOptions) -> Self {
        Self {
            source,
            policy,
            options,
            stop: None,
        }
    }

    /// Checked before every page request; raising it ends the run as cancelled.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// The source and the shared request policy, for callers that issue their
    /// own paced requests (region discovery).
    pub fn parts_mut(&mut self) -> (&S, &mut RequestPolicy) {
        (&self.source, &mut self.policy)
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    pub fn collect_region(&mut self, request: &CollectionRequest) -> CollectionResult {
        let region = request.region_code.as_str();
        let mut result = CollectionResult::new(region);
        let mut seen: HashSet<String> = HashSet::new();
        let mut failure: Option<FetchFailure> = None;

        let mut pagination = Pagination::new(self.options.clone());
        pagination.start();

        tracing::info!(region, trade_type = %request.trade_type, "collection started");

        while let Some(page) = pagination.next_page() {
            if self.stop_requested() {
                tracing::info!(region, page, "stop requested");
                pagination.cancel();
                break;
            }

            let query = ArticleQuery {
                region_code: request.region_code.clone(),
                property_type: request.property_type,
                trade_type: request.trade_type,
                bbox: request.bbox,
                page,
                filter: request.filter,
            };
            let label = format!("articleList {region} page {page}");
            let source = &self.source;

            let article_page = match self.policy.run(&label, || source.fetch_articles(&query)) {
                Ok(p) => p,
                Err(e) => {
                    tracing::error!(region, page, error = %e, "page failed");
                    failure = Some(e);
                    pagination.fail();
                    break;
                }
            };

            if let Some(echoed) = article_page.echoed_page() {
                if echoed != page {
                    tracing::debug!(region, page, echoed, "upstream echoed a different page");
                }
            }

            let outcome = PageOutcome {
                record_count: article_page.body.len(),
                more: article_page.more,
            };

            for fields in article_page.body {
                match Listing::from_article(fields, region, request.trade_type) {
                    Ok(listing) => {
                        if seen.insert(listing.id.clone()) {
                            result.push(listing);
                        } else {
                            result.duplicates_dropped += 1;
                        }
                    }
                    Err(reason) => {
                        result.records_skipped += 1;
                        tracing::warn!(region, page, %reason, "skipping record");
                    }
                }
            }
            result.pages_fetched += 1;

            tracing::debug!(
                region,
                page,
                records = outcome.record_count,
                more = outcome.more,
                total = result.listings.len(),
                "page fetched"
            );

            if let PageState::Done {
                reason: DoneReason::Truncated,
                ..
            } = pagination.advance(outcome)
            {
                tracing::warn!(
                    region,
                    max_pages = self.options.max_pages,
                    "page limit reached, results truncated"
                );
            }
        }

        result.status = match (pagination.state(), failure) {
            (PageState::Failed { page }, Some(failure)) => CollectionStatus::Failed { page, failure },
            (PageState::Done { reason: DoneReason::Truncated, .. }, _) => CollectionStatus::Truncated {
                max_pages: self.options.max_pages,
            },
            (PageState::Done { reason: DoneReason::Cancelled, pages }, _) => {
                CollectionStatus::Cancelled { after_page: pages }
            }
            _ => CollectionStatus::Complete,
        };

        tracing::info!(
            region,
            status = result.status.label(),
            listings = result.listings.len(),
            pages = result.pages_fetched,
            duplicates = result.duplicates_dropped,
            skipped = result.records_skipped,
            "collection finished"
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::ApiError;
    use crate::tests::utils::{article, page_of, ScriptedSource};

    fn request() -> CollectionRequest {
        CollectionRequest {
            region_code: "4113110100".to_string(),
            trade_type: TradeType::Sale,
            property_type: PropertyType::Apartment,
            bbox: BoundingBox::around_region(37.44, 127.15),
            filter: UpstreamFilter::default(),
        }
    }

    fn ids(range: std::ops::Range<u32>) -> Vec<String> {
        range.map(|i| i.to_string()).collect()
    }

    fn collector(source: &ScriptedSource, max_pages: u32) -> Collector<&ScriptedSource> {
        let options = CollectorOptions {
            page_size: 20,
            max_pages,
            continuation: ContinuationPolicy::FlagOrFullPage,
        };
        Collector::new(source, RequestPolicy::immediate(2), options)
    }

    #[test]
    fn test_pagination_stops_on_short_last_page() {
        let source = ScriptedSource::new(vec![
            Ok(page_of(&ids(0..20), true)),
            Ok(page_of(&ids(20..40), true)),
            Ok(page_of(&ids(40..47), false)),
        ]);

        let result = collector(&source, 100).collect_region(&request());

        assert_eq!(result.listings.len(), 47);
        assert_eq!(result.pages_fetched, 3);
        assert!(matches!(result.status, CollectionStatus::Complete));
        assert_eq!(source.requested_pages(), vec![1, 2, 3]);
    }

    #[test]
    fn test_always_full_pages_stop_at_page_limit() {
        let pages = (0..10)
            .map(|p| Ok(page_of(&ids(p * 20..p * 20 + 20), true)))
            .collect();
        let source = ScriptedSource::new(pages);

        let result = collector(&source, 5).collect_region(&request());

        assert_eq!(source.requested_pages(), vec![1, 2, 3, 4, 5]);
        assert_eq!(result.listings.len(), 100);
        assert!(matches!(result.status, CollectionStatus::Truncated { max_pages: 5 }));
    }

    #[test]
    fn test_duplicates_across_pages_are_dropped() {
        let source = ScriptedSource::new(vec![
            Ok(page_of(&ids(0..20), true)),
            Ok(page_of(&ids(15..25), false)),
        ]);

        let result = collector(&source, 100).collect_region(&request());

        assert_eq!(result.listings.len(), 25);
        assert_eq!(result.duplicates_dropped, 5);
        let unique: HashSet<_> = result.listings.iter().map(|l| l.id.clone()).collect();
        assert_eq!(unique.len(), result.listings.len());
    }

    #[test]
    fn test_full_page_with_false_flag_depends_on_policy() {
        let script = || {
            ScriptedSource::new(vec![
                Ok(page_of(&ids(0..20), false)),
                Ok(page_of(&ids(20..23), false)),
            ])
        };

        let source = script();
        let result = collector(&source, 100).collect_region(&request());
        assert_eq!(result.listings.len(), 23);

        let source = script();
        let options = CollectorOptions {
            continuation: ContinuationPolicy::FlagOnly,
            ..CollectorOptions::default()
        };
        let result = Collector::new(&source, RequestPolicy::immediate(0), options)
            .collect_region(&request());
        assert_eq!(result.listings.len(), 20);
        assert_eq!(source.requested_pages(), vec![1]);
    }

    #[test]
    fn test_empty_first_page_is_complete() {
        let source = ScriptedSource::new(vec![Ok(page_of(&[], true))]);
        let result = collector(&source, 100).collect_region(&request());
        assert!(result.listings.is_empty());
        assert!(matches!(result.status, CollectionStatus::Complete));
    }

    #[test]
    fn test_failure_keeps_earlier_pages() {
        let source = ScriptedSource::new(vec![
            Ok(page_of(&ids(0..20), true)),
            Err(ApiError::Transient("timeout".into())),
            Err(ApiError::Transient("timeout".into())),
            Err(ApiError::Transient("timeout".into())),
        ]);

        let result = collector(&source, 100).collect_region(&request());

        assert_eq!(result.listings.len(), 20);
        match &result.status {
            CollectionStatus::Failed { page, failure } => {
                assert_eq!(*page, 2);
                assert_eq!(failure.attempts, 3);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(result.status.is_partial());
    }

    #[test]
    fn test_transient_error_then_success_continues() {
        let source = ScriptedSource::new(vec![
            Err(ApiError::Transient("HTTP 503".into())),
            Ok(page_of(&ids(0..5), false)),
        ]);
        let result = collector(&source, 100).collect_region(&request());
        assert_eq!(result.listings.len(), 5);
        assert!(matches!(result.status, CollectionStatus::Complete));
    }

    #[test]
    fn test_records_without_id_are_skipped_and_counted() {
        let mut page = page_of(&ids(0..3), false);
        let mut broken = article("x", "단지", 1000, 84.0);
        broken.remove("atclNo");
        page.body.push(broken);

        let source = ScriptedSource::new(vec![Ok(page)]);
        let result = collector(&source, 100).collect_region(&request());

        assert_eq!(result.listings.len(), 3);
        assert_eq!(result.records_skipped, 1);
    }

    #[test]
    fn test_stop_flag_cancels_at_page_boundary() {
        let source = ScriptedSource::new(vec![Ok(page_of(&ids(0..20), true))]);
        let stop = Arc::new(AtomicBool::new(true));

        let result = collector(&source, 100)
            .with_stop_flag(stop)
            .collect_region(&request());

        assert!(source.requested_pages().is_empty());
        assert!(matches!(result.status, CollectionStatus::Cancelled { after_page: 0 }));
    }

    #[test]
    fn test_state_machine_transitions() {
        let mut p = Pagination::new(CollectorOptions::default());
        assert_eq!(p.state(), PageState::Init);
        p.start();
        assert_eq!(p.next_page(), Some(1));
        p.advance(PageOutcome { record_count: 20, more: false });
        assert_eq!(p.next_page(), Some(2));
        p.fail();
        assert_eq!(p.state(), PageState::Failed { page: 2 });
        assert_eq!(p.next_page(), None);
    }

    #[test]
    fn test_continuation_policy_parsing() {
        assert_eq!("flag-only".parse::<ContinuationPolicy>(), Ok(ContinuationPolicy::FlagOnly));
        assert_eq!(
            ContinuationPolicy::FlagOrFullPage.to_string().parse::<ContinuationPolicy>(),
            Ok(ContinuationPolicy::FlagOrFullPage)
        );
        assert!("always".parse::<ContinuationPolicy>().is_err());
    }
}
