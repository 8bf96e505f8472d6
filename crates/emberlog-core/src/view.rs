//! Explicit view state for the incident table.
//!
//! Search text, type filter and page live in one [`ViewState`]. Changing the search or
//! the filter resets the page to 1; every change bumps a fetch generation so page
//! responses that were requested under an older state can be recognised and dropped.
//! [`IncidentView`] couples that state with the displayed list and applies both page
//! results and live stream arrivals to it.

use crate::incident::Incident;
use crate::live::{FeedStats, LiveState};
use crate::query::{total_pages, IncidentPage, IncidentQuery, DEFAULT_PAGE_SIZE};
use crate::reconcile::{merge_into, MergeOutcome};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Filter-selector entry meaning "no type filter".
pub const ALL_TYPES: &str = "ALL";

/// Generation stamp carried by a page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    search: String,
    type_filter: Option<String>,
    page: u32,
    page_size: u32,
    generation: u64,
}

impl ViewState {
    pub fn new(page_size: u32) -> Self {
        Self {
            search: String::new(),
            type_filter: None,
            page: 1,
            page_size: page_size.max(1),
            generation: 0,
        }
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn type_filter(&self) -> Option<&str> {
        self.type_filter.as_deref()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Returns true when the state changed (and a refetch is due).
    pub fn set_search(&mut self, search: &str) -> bool {
        let search = search.trim();
        if search == self.search {
            return false;
        }
        self.search = search.to_string();
        self.page = 1;
        self.bump();
        true
    }

    /// `None`, blank or [`ALL_TYPES`] clear the filter.
    pub fn set_type_filter(&mut self, incident_type: Option<&str>) -> bool {
        let next = incident_type
            .map(str::trim)
            .filter(|t| !t.is_empty() && *t != ALL_TYPES)
            .map(str::to_string);
        if next == self.type_filter {
            return false;
        }
        self.type_filter = next;
        self.page = 1;
        self.bump();
        true
    }

    pub fn set_page(&mut self, page: u32) -> bool {
        let page = page.max(1);
        if page == self.page {
            return false;
        }
        self.page = page;
        self.bump();
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.set_page(self.page.saturating_add(1))
    }

    pub fn prev_page(&mut self) -> bool {
        self.set_page(self.page.saturating_sub(1))
    }

    /// Force a new generation without changing any parameter.
    pub fn refresh(&mut self) -> FetchTicket {
        self.bump();
        self.ticket()
    }

    pub fn ticket(&self) -> FetchTicket {
        FetchTicket(self.generation)
    }

    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        ticket.0 == self.generation
    }

    pub fn to_query(&self) -> IncidentQuery {
        IncidentQuery {
            page: self.page,
            page_size: self.page_size,
            incident_type: self.type_filter.clone(),
            address_search: (!self.search.is_empty()).then(|| self.search.clone()),
            ..Default::default()
        }
    }

    /// Live arrivals are capped to one page.
    pub fn merge_cap(&self) -> usize {
        self.page_size as usize
    }

    /// Live incidents only land on the first page, and only when they match the
    /// filters the server applied to that page.
    pub fn accepts_live(&self, incident: &Incident) -> bool {
        self.page == 1
            && self
                .type_filter
                .as_deref()
                .map_or(true, |t| t == incident.incident_type)
            && incident.address_matches(&self.search)
    }

    fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveOutcome {
    Applied(MergeOutcome),
    /// Not part of the current page or filter; the list is untouched.
    OutOfView,
}

/// Everything the table needs to render.
#[derive(Debug, Clone)]
pub struct IncidentView {
    state: ViewState,
    incidents: Vec<Incident>,
    total: Option<u64>,
    last_page_len: usize,
    loading: bool,
    error: Option<String>,
    known_types: BTreeSet<String>,
    pub stats: FeedStats,
}

impl IncidentView {
    pub fn new(state: ViewState) -> Self {
        Self {
            state,
            incidents: Vec::new(),
            total: None,
            last_page_len: 0,
            loading: false,
            error: None,
            known_types: BTreeSet::new(),
            stats: FeedStats::default(),
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ViewState {
        &mut self.state
    }

    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    /// Rows after the client-side type filter.
    pub fn visible(&self) -> Vec<&Incident> {
        match self.state.type_filter() {
            None => self.incidents.iter().collect(),
            Some(t) => self.incidents.iter().filter(|i| i.incident_type == t).collect(),
        }
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn live_state(&self) -> LiveState {
        self.stats.state
    }

    pub fn set_live_state(&mut self, state: LiveState) {
        self.stats.state = state;
    }

    /// Mark a fetch in flight and hand back what to request.
    pub fn begin_fetch(&mut self) -> (FetchTicket, IncidentQuery) {
        self.loading = true;
        (self.state.ticket(), self.state.to_query())
    }

    /// Replace the list with a fetched page. Returns false for a stale ticket.
    /// A repeated id keeps its first occurrence.
    pub fn apply_page(&mut self, ticket: FetchTicket, page: IncidentPage) -> bool {
        if !self.state.is_current(ticket) {
            debug!(page = page.page, "Discarding stale page response");
            return false;
        }
        self.last_page_len = page.items.len();

        let mut items = page.items;
        let mut seen = HashSet::with_capacity(items.len());
        items.retain(|i| seen.insert(i.id));
        if items.len() < self.last_page_len {
            debug!(
                page = page.page,
                dropped = self.last_page_len - items.len(),
                "Dropped repeated incident ids from page"
            );
        }

        self.known_types
            .extend(items.iter().map(|i| i.incident_type.clone()));
        self.incidents = items;
        self.total = page.total;
        self.loading = false;
        self.error = None;
        true
    }

    /// Record a failed fetch. The displayed list is kept.
    pub fn apply_fetch_error(&mut self, ticket: FetchTicket, message: impl Into<String>) -> bool {
        if !self.state.is_current(ticket) {
            return false;
        }
        self.loading = false;
        self.error = Some(message.into());
        true
    }

    pub fn apply_live(&mut self, incident: Incident) -> LiveOutcome {
        self.known_types.insert(incident.incident_type.clone());
        self.stats.record_received();

        if !self.state.accepts_live(&incident) {
            return LiveOutcome::OutOfView;
        }

        let id = incident.id;
        let outcome = merge_into(&mut self.incidents, incident, self.state.merge_cap());
        match outcome {
            MergeOutcome::Duplicate => self.stats.record_duplicate(),
            MergeOutcome::Inserted { evicted } => {
                self.stats.record_evicted(evicted);
                self.bump_total();
                if evicted > 0 {
                    debug!(id, evicted, "Live incident evicted older rows");
                }
            }
            MergeOutcome::Dropped => {
                self.stats.record_evicted(1);
                self.bump_total();
            }
        }
        LiveOutcome::Applied(outcome)
    }

    /// "ALL" followed by every type seen so far, sorted.
    pub fn incident_types(&self) -> Vec<String> {
        std::iter::once(ALL_TYPES.to_string())
            .chain(self.known_types.iter().cloned())
            .collect()
    }

    /// The entry after the active filter in [`incident_types`](Self::incident_types), wrapping.
    pub fn next_type_filter(&self, backwards: bool) -> String {
        let types = self.incident_types();
        let current = self.state.type_filter().unwrap_or(ALL_TYPES);
        let idx = types.iter().position(|t| t == current).unwrap_or(0);
        let len = types.len();
        let next = if backwards { (idx + len - 1) % len } else { (idx + 1) % len };
        types[next].clone()
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.total.map(|t| total_pages(t, self.state.page_size()))
    }

    pub fn has_next(&self) -> bool {
        match self.total_pages() {
            Some(pages) => self.state.page() < pages,
            None => self.last_page_len >= self.state.page_size() as usize,
        }
    }

    pub fn has_prev(&self) -> bool {
        self.state.page() > 1
    }

    fn bump_total(&mut self) {
        if let Some(total) = self.total.as_mut() {
            *total += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::tests::incident;

    fn typed(id: i64, ts: &str, incident_type: &str) -> Incident {
        Incident {
            incident_type: incident_type.to_string(),
            ..incident(id, ts)
        }
    }

    fn page_of(items: Vec<Incident>, total: Option<u64>, page: u32, page_size: u32) -> IncidentPage {
        IncidentPage {
            items,
            total,
            page,
            page_size,
            rejected: 0,
        }
    }

    #[test]
    fn test_filter_and_search_reset_page() {
        let mut state = ViewState::new(10);
        assert!(state.set_page(4));
        assert!(state.set_type_filter(Some("MVA")));
        assert_eq!(state.page(), 1);

        state.set_page(3);
        assert!(state.set_search(" Camelback "));
        assert_eq!(state.search(), "Camelback");
        assert_eq!(state.page(), 1);

        // unchanged values do not bump
        let ticket = state.ticket();
        assert!(!state.set_search("Camelback"));
        assert!(!state.set_type_filter(Some("MVA")));
        assert!(state.is_current(ticket));

        assert!(state.set_type_filter(Some(ALL_TYPES)));
        assert_eq!(state.type_filter(), None);
    }

    #[test]
    fn test_paging_bounds() {
        let mut state = ViewState::new(10);
        assert!(!state.prev_page());
        assert_eq!(state.page(), 1);
        assert!(state.next_page());
        assert_eq!(state.page(), 2);
        assert!(state.prev_page());
        assert_eq!(state.page(), 1);
    }

    #[test]
    fn test_to_query() {
        let mut state = ViewState::new(25);
        state.set_type_filter(Some("MEDICAL"));
        state.set_search("van buren");
        state.next_page();

        let query = state.to_query();
        assert_eq!(query.page, 2);
        assert_eq!(query.page_size, 25);
        assert_eq!(query.incident_type.as_deref(), Some("MEDICAL"));
        assert_eq!(query.address_search.as_deref(), Some("van buren"));
    }

    #[test]
    fn test_stale_page_discarded() {
        let mut view = IncidentView::new(ViewState::new(10));
        let (old_ticket, _) = view.begin_fetch();

        view.state_mut().set_type_filter(Some("MVA"));
        let (new_ticket, _) = view.begin_fetch();

        let stale = page_of(vec![typed(1, "2025-01-01T00:00:00Z", "MEDICAL")], Some(1), 1, 10);
        assert!(!view.apply_page(old_ticket, stale));
        assert!(view.incidents().is_empty());
        assert!(view.is_loading());

        let fresh = page_of(vec![typed(2, "2025-01-01T00:00:00Z", "MVA")], Some(1), 1, 10);
        assert!(view.apply_page(new_ticket, fresh));
        assert_eq!(view.incidents()[0].id, 2);
        assert!(!view.is_loading());
    }

    #[test]
    fn test_page_with_repeated_ids_keeps_first() {
        let mut view = IncidentView::new(ViewState::new(10));
        let (ticket, _) = view.begin_fetch();
        let items = vec![
            typed(7, "2025-01-01T00:03:00Z", "MVA"),
            typed(6, "2025-01-01T00:02:00Z", "FIRE"),
            typed(7, "2025-01-01T00:01:00Z", "MEDICAL"),
        ];

        assert!(view.apply_page(ticket, page_of(items, Some(3), 1, 10)));

        let ids: Vec<i64> = view.incidents().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![7, 6]);
        assert_eq!(view.incidents()[0].incident_type, "MVA");
    }

    #[test]
    fn test_fetch_error_keeps_list() {
        let mut view = IncidentView::new(ViewState::new(10));
        let (ticket, _) = view.begin_fetch();
        view.apply_page(ticket, page_of(vec![incident(1, "2025-01-01T00:00:00Z")], None, 1, 10));

        let ticket = view.state_mut().refresh();
        view.begin_fetch();
        assert!(view.apply_fetch_error(ticket, "Failed to fetch incidents (500)"));
        assert_eq!(view.incidents().len(), 1);
        assert_eq!(view.error(), Some("Failed to fetch incidents (500)"));
    }

    #[test]
    fn test_live_merge_on_first_page() {
        let mut view = IncidentView::new(ViewState::new(2));
        let (ticket, _) = view.begin_fetch();
        view.apply_page(
            ticket,
            page_of(
                vec![incident(2, "2025-01-01T00:02:00Z"), incident(1, "2025-01-01T00:01:00Z")],
                Some(7),
                1,
                2,
            ),
        );

        let outcome = view.apply_live(incident(3, "2025-01-01T00:03:00Z"));
        assert_eq!(outcome, LiveOutcome::Applied(MergeOutcome::Inserted { evicted: 1 }));
        let ids: Vec<i64> = view.incidents().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![3, 2]);
        assert_eq!(view.total(), Some(8));

        let dup = view.apply_live(incident(3, "2025-01-01T00:09:00Z"));
        assert_eq!(dup, LiveOutcome::Applied(MergeOutcome::Duplicate));
        assert_eq!(view.total(), Some(8));
        assert_eq!(view.stats.duplicates, 1);
    }

    #[test]
    fn test_live_out_of_view() {
        let mut view = IncidentView::new(ViewState::new(10));
        view.state_mut().set_type_filter(Some("MVA"));
        assert_eq!(
            view.apply_live(typed(1, "2025-01-01T00:00:00Z", "MEDICAL")),
            LiveOutcome::OutOfView
        );
        assert!(view.incidents().is_empty());
        // the type still shows up in the selector
        assert!(view.incident_types().contains(&"MEDICAL".to_string()));

        view.state_mut().set_type_filter(None);
        view.state_mut().next_page();
        assert_eq!(
            view.apply_live(incident(2, "2025-01-01T00:00:00Z")),
            LiveOutcome::OutOfView
        );
    }

    #[test]
    fn test_incident_types_and_cycle() {
        let mut view = IncidentView::new(ViewState::new(10));
        let (ticket, _) = view.begin_fetch();
        view.apply_page(
            ticket,
            page_of(
                vec![
                    typed(1, "2025-01-01T00:00:00Z", "STRUCTURE FIRE"),
                    typed(2, "2025-01-01T00:00:00Z", "MEDICAL"),
                    typed(3, "2025-01-01T00:00:00Z", "MEDICAL"),
                ],
                None,
                1,
                10,
            ),
        );
        assert_eq!(view.incident_types(), vec!["ALL", "MEDICAL", "STRUCTURE FIRE"]);
        assert_eq!(view.next_type_filter(false), "MEDICAL");
        assert_eq!(view.next_type_filter(true), "STRUCTURE FIRE");

        view.state_mut().set_type_filter(Some("MEDICAL"));
        assert_eq!(view.visible().len(), 2);
    }

    #[test]
    fn test_has_next_without_total() {
        let mut view = IncidentView::new(ViewState::new(2));
        let (ticket, _) = view.begin_fetch();
        view.apply_page(
            ticket,
            page_of(
                vec![incident(1, "2025-01-01T00:00:00Z"), incident(2, "2025-01-01T00:00:00Z")],
                None,
                1,
                2,
            ),
        );
        assert!(view.has_next());
        assert!(!view.has_prev());
        assert_eq!(view.total_pages(), None);
    }
}
