//! Filter, search and pagination state for list views.
//!
//! Search input is debounced on the trailing edge: the committed search,
//! which is what reaches the query parameters, only changes once the
//! input has been quiet for [`SEARCH_DEBOUNCE`].

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::api::{ParamValue, QueryParams};

/// Quiet period before typed search text is committed.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Page size of the club listing.
pub const CLUB_PAGE_SIZE: u32 = 12;

/// Trailing-edge debounce over a single pending value.
///
/// Time is passed in rather than read, so callers decide whether they
/// poll from an event loop or sleep until [`Debouncer::deadline`].
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
    pending: Option<String>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            pending: None,
        }
    }

    /// Replace the pending value and restart the timer.
    pub fn push(&mut self, value: String, now: Instant) {
        self.pending = Some(value);
        self.deadline = Some(now + self.delay);
    }

    /// Take the pending value once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
        self.pending = None;
    }
}

/// Filters, search and page of one list view.
#[derive(Debug, Clone)]
pub struct FilterState {
    filters: QueryParams,
    search_input: String,
    search: String,
    page: u32,
    page_size: Option<u32>,
    debouncer: Debouncer,
    revision: u64,
}

impl FilterState {
    /// `page_size` of `None` means the view is not paginated and sends no
    /// `page`/`limit` parameters.
    pub fn new(page_size: Option<u32>) -> Self {
        Self {
            filters: QueryParams::new(),
            search_input: String::new(),
            search: String::new(),
            page: 1,
            page_size,
            debouncer: Debouncer::new(SEARCH_DEBOUNCE),
            revision: 0,
        }
    }

    /// Club listing: `facultyId`, `categoryId`, `search`, twelve per page.
    pub fn clubs() -> Self {
        Self::new(Some(CLUB_PAGE_SIZE))
    }

    /// Attendance history: `clubId`, `startDate`, `endDate`, unpaged.
    pub fn attendance() -> Self {
        Self::new(None)
    }

    /// Set one filter and go back to the first page.
    /// An empty value removes the filter.
    pub fn set_filter(&mut self, key: &str, value: impl Into<ParamValue>) {
        let before = self.params();
        self.filters.insert(key, value);
        self.page = 1;
        self.bump_if_changed(&before, "filter");
    }

    pub fn clear_filter(&mut self, key: &str) {
        let before = self.params();
        self.filters.remove(key);
        self.page = 1;
        self.bump_if_changed(&before, "filter");
    }

    /// Record raw search input. The committed search follows after the
    /// debounce period; each call restarts it.
    pub fn set_search(&mut self, text: &str) {
        self.search_input = text.to_string();
        self.debouncer.push(text.to_string(), Instant::now());
    }

    /// Commit pending search input whose quiet period has elapsed.
    /// Returns `true` when the effective parameters changed.
    pub fn tick(&mut self) -> bool {
        match self.debouncer.poll(Instant::now()) {
            Some(value) => self.commit_search(value),
            None => false,
        }
    }

    /// Wait out the debounce period and commit.
    pub async fn settle(&mut self) -> bool {
        let mut changed = false;
        while let Some(deadline) = self.debouncer.deadline() {
            tokio::time::sleep_until(deadline).await;
            changed |= self.tick();
        }
        changed
    }

    /// Commit pending search input right away.
    pub fn flush(&mut self) -> bool {
        self.debouncer.cancel();
        let value = self.search_input.clone();
        self.commit_search(value)
    }

    fn commit_search(&mut self, value: String) -> bool {
        if value == self.search {
            return false;
        }
        self.search = value;
        self.page = 1;
        self.bump("search");
        true
    }

    /// Move to page `page`, keeping filters. Pages start at 1.
    pub fn set_page(&mut self, page: u32) {
        let before = self.params();
        self.page = page.max(1);
        self.bump_if_changed(&before, "page");
    }

    pub fn next_page(&mut self) {
        self.set_page(self.page.saturating_add(1));
    }

    pub fn prev_page(&mut self) {
        self.set_page(self.page.saturating_sub(1));
    }

    /// Back to the initial state.
    pub fn clear(&mut self) {
        let before = self.params();
        self.filters = QueryParams::new();
        self.search_input.clear();
        self.search.clear();
        self.debouncer.cancel();
        self.page = 1;
        self.bump_if_changed(&before, "clear");
    }

    /// Effective request parameters: filters, committed search, then
    /// `page`/`limit` for paginated views.
    pub fn params(&self) -> QueryParams {
        let mut params = self.filters.clone();
        params.insert("search", self.search.as_str());
        if let Some(limit) = self.page_size {
            params.insert("page", self.page);
            params.insert("limit", limit);
        }
        params
    }

    pub fn filter(&self, key: &str) -> Option<&ParamValue> {
        self.filters.get(key)
    }

    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> Option<u32> {
        self.page_size
    }

    /// Pending debounce deadline, for event loops that select on it.
    pub fn deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    pub fn is_debouncing(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Incremented whenever [`FilterState::params`] changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn bump_if_changed(&mut self, before: &QueryParams, cause: &'static str) {
        if self.params() != *before {
            self.bump(cause);
        }
    }

    fn bump(&mut self, cause: &'static str) {
        self.revision += 1;
        debug!(cause, revision = self.revision, params = %self.params().canonical(), "Filter state changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_debouncer_restarts_on_push() {
        let start = Instant::now();
        let mut d = Debouncer::new(ms(500));
        d.push("a".into(), start);
        d.push("ab".into(), start + ms(100));

        assert_eq!(d.poll(start + ms(500)), None);
        assert_eq!(d.poll(start + ms(600)), Some("ab".to_string()));
        assert_eq!(d.poll(start + ms(2000)), None);
        assert!(!d.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_commits_once_after_quiet_period() {
        let mut state = FilterState::clubs();
        state.set_page(3);
        let rev = state.revision();

        state.set_search("a");
        tokio::time::advance(ms(100)).await;
        state.set_search("ab");
        assert_eq!(state.search_input(), "ab");

        tokio::time::advance(ms(400)).await;
        assert!(!state.tick());
        assert_eq!(state.search(), "");
        assert_eq!(state.page(), 3);

        tokio::time::advance(ms(100)).await;
        assert!(state.tick());
        assert_eq!(state.search(), "ab");
        assert_eq!(state.page(), 1);
        assert_eq!(state.revision(), rev + 1);

        assert!(!state.tick());
        assert_eq!(state.revision(), rev + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_waits_for_debounce() {
        let mut state = FilterState::clubs();
        let start = Instant::now();
        state.set_search("robot");

        assert!(state.settle().await);
        assert!(start.elapsed() >= SEARCH_DEBOUNCE);
        assert_eq!(state.params().get("search"), Some(&ParamValue::from("robot")));
        assert!(!state.is_debouncing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retyping_committed_text_changes_nothing() {
        let mut state = FilterState::clubs();
        state.set_search("chess");
        state.settle().await;
        let rev = state.revision();

        state.set_search("chess!");
        state.set_search("chess");
        assert!(!state.settle().await);
        assert_eq!(state.revision(), rev);
    }

    #[test]
    fn test_filter_resets_page_and_empty_removes() {
        let mut state = FilterState::clubs();
        state.set_page(4);
        state.set_filter("facultyId", "f2");
        assert_eq!(state.page(), 1);
        assert_eq!(state.params().canonical(), "facultyId=f2&limit=12&page=1");

        state.set_page(2);
        assert_eq!(state.filter("facultyId"), Some(&ParamValue::from("f2")));

        state.set_filter("facultyId", "");
        assert_eq!(state.page(), 1);
        assert_eq!(state.params().canonical(), "limit=12&page=1");
    }

    #[test]
    fn test_page_clamps_to_one() {
        let mut state = FilterState::clubs();
        state.set_page(0);
        assert_eq!(state.page(), 1);
        state.prev_page();
        assert_eq!(state.page(), 1);
        state.next_page();
        assert_eq!(state.page(), 2);
    }

    #[test]
    fn test_clear_restores_initial_params() {
        let initial = FilterState::clubs().params();
        let mut state = FilterState::clubs();
        state.set_filter("categoryId", "c1");
        state.set_search("art");
        state.flush();
        state.set_page(5);
        state.set_search("pending");

        state.clear();
        assert_eq!(state.params(), initial);
        assert_eq!(state.search_input(), "");
        assert!(!state.is_debouncing());
    }

    #[test]
    fn test_unpaged_view_sends_no_page() {
        let mut state = FilterState::attendance();
        state.set_filter("clubId", "c9");
        state.set_page(3);
        assert_eq!(state.params().canonical(), "clubId=c9");
    }

    #[test]
    fn test_flush_commits_immediately() {
        let mut state = FilterState::clubs();
        state.set_search("robotics");
        assert!(state.flush());
        assert_eq!(state.search(), "robotics");
        assert!(!state.is_debouncing());
    }
}
