//! The suggestion search behind the @mention picker.
//!
//! ```text
//!            search(q)                 result lands
//!   Idle ───────────────▶ Searching ───────────────▶ ResultsReady
//!    ▲                       ▲  │                         │
//!    │                       │  └─ on_scroll_to_bottom ◀──┤ (more pages)
//!    └───────── consume() / search(None) ─────────────────┘
//!
//!   any state ── selected >= limit ──▶ Disabled ── selected < limit ──▶ Idle (or Searching,
//!                                                                      if a query was waiting)
//! ```
//!
//! Lookups run on the session's tokio runtime. Each one is tagged with the
//! generation of the search that issued it and reports back through a
//! channel that is only drained on the UI thread, by
//! [`SuggestionSearch::process_updates`]. A response whose generation is no
//! longer current (the query changed, the list was consumed, or the limit
//! was hit in the meantime) is dropped, so a slow lookup can never
//! overwrite the results of a newer one.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use eyeball::SharedObservable;
use eyeball_im::{ObservableVector, VectorSubscriber};
use imbl::Vector;
use serde::{Deserialize, Serialize};

use crate::directory::{DirectoryEntry, DirectoryPage, DirectoryRequest, DirectoryScope};
use crate::error::DirectoryError;
use crate::formatter::SuggestionItem;
use crate::model::ConversationTarget;
use crate::session::ChatSession;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_MENTION_LIMIT: usize = 10;

/// Which directory a mention search looks in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionRequestType {
    /// Always search the global user directory.
    Users,
    /// Search the group roster in group conversations, the user directory otherwise.
    #[default]
    UsersAndGroupMembers,
}

/// In which conversations suggestions are offered at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionsVisibility {
    #[default]
    Both,
    UsersConversationOnly,
    GroupConversationOnly,
}

impl MentionsVisibility {
    pub fn allows(self, target: Option<&ConversationTarget>) -> bool {
        match (self, target) {
            (Self::Both, _) => true,
            (Self::UsersConversationOnly, Some(ConversationTarget::User(_))) => true,
            (Self::GroupConversationOnly, Some(ConversationTarget::Group(_))) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    Searching { generation: u64 },
    ResultsReady,
    /// The selection limit is reached; searches are suppressed.
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResultMode {
    /// First page of a new search: replaces the list.
    Replace,
    /// A further page of the active search: appends to the list.
    Append,
}

/// The completion of one directory lookup.
#[derive(Debug)]
pub(crate) struct SearchResponse {
    generation: u64,
    mode: ResultMode,
    request: DirectoryRequest,
    result: Result<DirectoryPage, DirectoryError>,
}

pub struct SuggestionSearch {
    session: Arc<ChatSession>,
    request_type: MentionRequestType,
    visibility: MentionsVisibility,
    page_size: usize,
    mention_limit: usize,
    limit_info_text: Option<String>,
    target: Option<ConversationTarget>,

    state: SearchState,
    generation: u64,
    last_query: Option<String>,
    /// A query received while disabled, re-issued once the limit clears.
    pending_query: Option<String>,
    /// The most recent page requested for the current search.
    active_request: Option<DirectoryRequest>,
    has_more: bool,
    in_flight: bool,
    selected_count: usize,

    suggestions: ObservableVector<SuggestionItem>,
    loading: SharedObservable<bool>,
    info_visible: SharedObservable<bool>,
    info_text: SharedObservable<String>,

    sender: Sender<SearchResponse>,
    receiver: Receiver<SearchResponse>,
}

impl SuggestionSearch {
    pub fn new(session: Arc<ChatSession>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            session,
            request_type: MentionRequestType::default(),
            visibility: MentionsVisibility::default(),
            page_size: DEFAULT_PAGE_SIZE,
            mention_limit: DEFAULT_MENTION_LIMIT,
            limit_info_text: None,
            target: None,
            state: SearchState::Idle,
            generation: 0,
            last_query: None,
            pending_query: None,
            active_request: None,
            has_more: false,
            in_flight: false,
            selected_count: 0,
            suggestions: ObservableVector::new(),
            loading: SharedObservable::new(false),
            info_visible: SharedObservable::new(false),
            info_text: SharedObservable::new(String::new()),
            sender,
            receiver,
        }
    }

    pub fn set_request_type(&mut self, request_type: MentionRequestType) {
        self.request_type = request_type;
    }

    pub fn set_visibility(&mut self, visibility: MentionsVisibility) {
        self.visibility = visibility;
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
    }

    pub fn set_limit_info_text(&mut self, text: Option<String>) {
        self.limit_info_text = text;
    }

    pub fn set_mention_limit(&mut self, limit: usize) {
        self.mention_limit = limit;
        self.update_limit_gate();
    }

    pub fn mention_limit(&self) -> usize {
        self.mention_limit
    }

    pub fn set_conversation_target(&mut self, target: Option<ConversationTarget>) {
        if self.target != target {
            self.target = target;
            self.reset();
        }
    }

    pub fn conversation_target(&self) -> Option<&ConversationTarget> {
        self.target.as_ref()
    }

    /// Forgets the selection after a message is sent.
    ///
    /// Unlike `set_selected_count(0)`, a query held back while disabled is
    /// dropped rather than re-issued, since it belonged to the sent draft.
    pub fn clear_selection(&mut self) {
        self.pending_query = None;
        self.set_selected_count(0);
    }

    /// Updates how many mentions are currently selected in the composer.
    pub fn set_selected_count(&mut self, count: usize) {
        self.selected_count = count;
        self.update_limit_gate();
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    /// Whether the selection limit has been reached.
    pub fn disable_suggestions(&self) -> bool {
        self.selected_count >= self.mention_limit
    }

    /// Whether suggestions may be shown for the current conversation.
    pub fn suggestions_enabled(&self) -> bool {
        self.visibility.allows(self.target.as_ref()) && !self.disable_suggestions()
    }

    pub fn suggestions(&self) -> Vec<SuggestionItem> {
        self.suggestions.iter().cloned().collect()
    }

    pub fn subscribe_suggestions(&self) -> VectorSubscriber<SuggestionItem> {
        self.suggestions.subscribe()
    }

    pub fn loading(&self) -> SharedObservable<bool> {
        self.loading.clone()
    }

    pub fn info_visible(&self) -> SharedObservable<bool> {
        self.info_visible.clone()
    }

    pub fn info_text(&self) -> SharedObservable<String> {
        self.info_text.clone()
    }

    /// Starts a new search, or clears the list when `query` is `None`.
    pub fn search(&mut self, query: Option<&str>) {
        let Some(query) = query else {
            self.pending_query = None;
            self.reset();
            return;
        };

        if self.disable_suggestions() {
            self.pending_query = Some(query.to_owned());
            self.enter_disabled();
            return;
        }
        if !self.visibility.allows(self.target.as_ref()) {
            tracing::debug!("Mention suggestions are not offered in this conversation ({:?})", self.visibility);
            self.reset();
            return;
        }

        let already_active = matches!(self.state, SearchState::Searching { .. } | SearchState::ResultsReady);
        if already_active && self.last_query.as_deref() == Some(query) {
            return;
        }

        self.generation += 1;
        self.suggestions.clear();
        self.has_more = false;
        self.last_query = Some(query.to_owned());

        let keyword = Some(query.trim()).filter(|q| !q.is_empty()).map(str::to_owned);
        let request = DirectoryRequest::new(self.scope(), keyword, self.page_size);
        self.spawn_fetch(request, ResultMode::Replace);
    }

    /// Fetches the next page of the current search, if there is one.
    pub fn load_more(&mut self) {
        if self.in_flight || !self.has_more || self.state != SearchState::ResultsReady {
            return;
        }
        let Some(request) = self.active_request.as_ref().map(DirectoryRequest::next_page) else {
            return;
        };
        self.spawn_fetch(request, ResultMode::Append);
    }

    /// Marks the current list as used (an item was picked): clears it and goes idle.
    pub fn consume(&mut self) {
        self.reset();
    }

    /// Applies every response queued so far. Must be called on the UI thread.
    ///
    /// Returns `true` if the published state changed.
    pub fn process_updates(&mut self, to_item: impl Fn(&DirectoryEntry) -> SuggestionItem) -> bool {
        let mut changed = false;
        while let Ok(response) = self.receiver.try_recv() {
            changed |= self.apply(response, &to_item);
        }
        changed
    }

    /// Blocks until one response arrives (or `timeout` elapses), then applies
    /// it along with anything else queued.
    ///
    /// Returns `false` on timeout. For hosts without an event loop, and tests.
    pub fn wait_for_update(
        &mut self,
        timeout: Duration,
        to_item: impl Fn(&DirectoryEntry) -> SuggestionItem,
    ) -> bool {
        let Ok(response) = self.receiver.recv_timeout(timeout) else {
            return false;
        };
        self.apply(response, &to_item);
        self.process_updates(to_item);
        true
    }

    fn scope(&self) -> DirectoryScope {
        match (self.request_type, self.target.as_ref()) {
            (MentionRequestType::UsersAndGroupMembers, Some(ConversationTarget::Group(group))) => {
                DirectoryScope::GroupMembers { guid: group.guid.clone() }
            }
            _ => DirectoryScope::Users,
        }
    }

    fn spawn_fetch(&mut self, request: DirectoryRequest, mode: ResultMode) {
        let generation = self.generation;
        let directory = self.session.directory();
        let sender = self.sender.clone();
        let session = self.session.clone();

        self.active_request = Some(request.clone());
        self.in_flight = true;
        self.loading.set(true);
        self.state = SearchState::Searching { generation };

        self.session.runtime().spawn(async move {
            let result = directory.fetch(request.clone()).await;
            let response = SearchResponse { generation, mode, request, result };
            if sender.send(response).is_err() {
                tracing::debug!("Mention search {generation} finished after its formatter was dropped");
                return;
            }
            session.signal_ui();
        });
    }

    fn apply(&mut self, response: SearchResponse, to_item: &impl Fn(&DirectoryEntry) -> SuggestionItem) -> bool {
        if response.generation != self.generation {
            tracing::debug!(
                "Dropping stale mention results (generation {}, current {})",
                response.generation, self.generation,
            );
            return false;
        }

        self.in_flight = false;
        self.loading.set(false);
        match response.result {
            Ok(page) => {
                let items: Vector<SuggestionItem> = page.entries.iter().map(to_item).collect();
                if response.mode == ResultMode::Replace {
                    self.suggestions.clear();
                }
                self.suggestions.append(items);
                self.has_more = page.has_more;
                self.active_request = Some(response.request);
            }
            Err(DirectoryError::NotLoggedIn) => {
                tracing::error!("Mention lookup attempted without a logged-in user");
                self.suggestions.clear();
                self.has_more = false;
            }
            Err(error) => {
                tracing::warn!("Mention lookup for {:?} failed: {error}", response.request.keyword);
                self.suggestions.clear();
                self.has_more = false;
            }
        }
        self.state = SearchState::ResultsReady;
        true
    }

    /// Forgets the current search; any lookup still running becomes stale.
    fn reset(&mut self) {
        self.generation += 1;
        self.suggestions.clear();
        self.last_query = None;
        self.active_request = None;
        self.has_more = false;
        self.in_flight = false;
        self.loading.set(false);
        if self.state != SearchState::Disabled {
            self.state = SearchState::Idle;
        }
    }

    fn update_limit_gate(&mut self) {
        if self.disable_suggestions() {
            if self.state != SearchState::Disabled {
                self.enter_disabled();
            }
        } else if self.state == SearchState::Disabled {
            self.info_visible.set(false);
            self.info_text.set(String::new());
            self.state = SearchState::Idle;
            if let Some(query) = self.pending_query.take() {
                self.search(Some(&query));
            }
        }
    }

    fn enter_disabled(&mut self) {
        self.reset();
        let text = self.limit_info_text.clone().unwrap_or_else(|| {
            format!("You can add up to {} mentions at a time.", self.mention_limit)
        });
        self.info_text.set(text);
        self.info_visible.set(true);
        self.state = SearchState::Disabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::model::{Group, GroupMember, MemberScope, User};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn to_item(entry: &DirectoryEntry) -> SuggestionItem {
        let user = entry.user();
        SuggestionItem::new(&user.uid, &user.name, format!("@{}", user.name), format!("<@uid:{}>", user.uid))
    }

    fn names(search: &SuggestionSearch) -> Vec<String> {
        search.suggestions().into_iter().map(|item| item.name).collect()
    }

    fn setup(directory: InMemoryDirectory) -> (tokio::runtime::Runtime, Arc<InMemoryDirectory>, SuggestionSearch) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let directory = Arc::new(directory);
        let session = ChatSession::new(User::new("me", "Me"), directory.clone(), runtime.handle().clone());
        let search = SuggestionSearch::new(Arc::new(session));
        (runtime, directory, search)
    }

    fn people() -> Vec<User> {
        ["Ann", "Andy", "Bob", "Anita", "Bea"]
            .iter()
            .enumerate()
            .map(|(i, name)| User::new(format!("u{i}"), *name))
            .collect()
    }

    #[test]
    fn test_search_publishes_results() {
        let (_rt, _dir, mut search) = setup(InMemoryDirectory::new(people()));
        search.search(Some("an"));
        assert!(matches!(search.state(), SearchState::Searching { .. }));
        assert!(search.loading().get());

        assert!(search.wait_for_update(TIMEOUT, to_item));
        assert_eq!(search.state(), SearchState::ResultsReady);
        assert!(!search.loading().get());
        assert_eq!(names(&search), ["Andy", "Anita", "Ann"]);
    }

    #[test]
    fn test_repeated_query_is_not_reissued() {
        let (_rt, dir, mut search) = setup(InMemoryDirectory::new(people()));
        search.search(Some("b"));
        search.search(Some("b"));
        assert!(search.wait_for_update(TIMEOUT, to_item));
        search.search(Some("b"));
        assert_eq!(dir.requests().len(), 1);
        assert_eq!(names(&search), ["Bea", "Bob"]);
    }

    #[test]
    fn test_stale_results_do_not_overwrite_newer_search() {
        let (_rt, dir, mut search) = setup(InMemoryDirectory::new(people()));
        dir.delay_keyword("a", Duration::from_millis(300));

        search.search(Some("a"));
        search.search(Some("b"));
        // "b" lands first, then the slow "a" which must be dropped.
        assert!(search.wait_for_update(TIMEOUT, to_item));
        assert_eq!(names(&search), ["Bea", "Bob"]);
        assert!(search.wait_for_update(TIMEOUT, to_item));
        assert_eq!(names(&search), ["Bea", "Bob"]);
        assert_eq!(search.state(), SearchState::ResultsReady);
    }

    #[test]
    fn test_lookup_failure_publishes_empty_list() {
        let (_rt, dir, mut search) = setup(InMemoryDirectory::new(people()));
        search.search(Some("b"));
        assert!(search.wait_for_update(TIMEOUT, to_item));
        assert_eq!(names(&search).len(), 2);

        dir.fail_next(DirectoryError::Unavailable);
        search.search(Some("a"));
        assert!(search.wait_for_update(TIMEOUT, to_item));
        assert!(names(&search).is_empty());
        assert_eq!(search.state(), SearchState::ResultsReady);
        assert!(!search.info_visible().get());
        // No automatic retry.
        assert_eq!(dir.requests().len(), 2);
    }

    #[test]
    fn test_scroll_to_bottom_appends_next_page() {
        let (_rt, dir, mut search) = setup(InMemoryDirectory::new(people()));
        search.set_page_size(2);
        search.search(Some(""));
        assert!(search.wait_for_update(TIMEOUT, to_item));
        assert_eq!(names(&search), ["Andy", "Anita"]);

        search.load_more();
        // A second scroll while the page is in flight is ignored.
        search.load_more();
        assert!(search.wait_for_update(TIMEOUT, to_item));
        assert_eq!(names(&search), ["Andy", "Anita", "Ann", "Bea"]);

        search.load_more();
        assert!(search.wait_for_update(TIMEOUT, to_item));
        assert_eq!(names(&search).len(), 5);

        // Nothing left to fetch.
        search.load_more();
        assert_eq!(dir.requests().len(), 3);
        assert_eq!(dir.requests()[2].page, 2);
        assert_eq!(dir.requests()[2].keyword, None);
    }

    #[test]
    fn test_clearing_query_makes_in_flight_result_stale() {
        let (_rt, _dir, mut search) = setup(InMemoryDirectory::new(people()));
        search.search(Some("a"));
        search.search(None);
        assert_eq!(search.state(), SearchState::Idle);
        assert!(search.wait_for_update(TIMEOUT, to_item));
        assert!(names(&search).is_empty());
        assert_eq!(search.state(), SearchState::Idle);
    }

    #[test]
    fn test_selection_limit_disables_and_reenables() {
        let (_rt, dir, mut search) = setup(InMemoryDirectory::new(people()));
        search.set_mention_limit(2);
        search.set_selected_count(1);
        assert!(!search.disable_suggestions());

        search.set_selected_count(2);
        assert!(search.disable_suggestions());
        assert!(!search.suggestions_enabled());
        assert_eq!(search.state(), SearchState::Disabled);
        assert!(search.info_visible().get());
        assert!(!search.info_text().get().is_empty());

        // Suppressed while disabled, but remembered.
        search.search(Some("bo"));
        assert_eq!(search.state(), SearchState::Disabled);
        assert!(dir.requests().is_empty());

        search.set_selected_count(1);
        assert!(!search.info_visible().get());
        assert!(search.info_text().get().is_empty());
        assert!(matches!(search.state(), SearchState::Searching { .. }));
        assert!(search.wait_for_update(TIMEOUT, to_item));
        assert_eq!(names(&search), ["Bob"]);
    }

    #[test]
    fn test_clear_selection_drops_held_back_query() {
        let (_rt, dir, mut search) = setup(InMemoryDirectory::new(people()));
        search.set_mention_limit(1);
        search.set_selected_count(1);
        search.search(Some("bo"));
        assert_eq!(search.state(), SearchState::Disabled);

        search.clear_selection();
        assert_eq!(search.state(), SearchState::Idle);
        assert!(!search.info_visible().get());
        assert!(!search.wait_for_update(Duration::from_millis(200), to_item));
        assert!(names(&search).is_empty());
        assert!(dir.requests().is_empty());
    }

    #[test]
    fn test_logged_out_lookup_publishes_empty_list() {
        let (_rt, dir, mut search) = setup(InMemoryDirectory::new(people()));
        dir.fail_next(DirectoryError::NotLoggedIn);
        search.search(Some("b"));
        assert!(search.wait_for_update(TIMEOUT, to_item));
        assert!(names(&search).is_empty());
        assert_eq!(search.state(), SearchState::ResultsReady);
        assert!(!search.loading().get());
    }

    #[test]
    fn test_custom_limit_text() {
        let (_rt, _dir, mut search) = setup(InMemoryDirectory::new(people()));
        search.set_limit_info_text(Some("Too many!".into()));
        search.set_mention_limit(0);
        assert_eq!(search.info_text().get(), "Too many!");
    }

    #[test]
    fn test_group_scope_and_visibility() {
        let directory = InMemoryDirectory::new(people()).with_group("g1", vec![
            GroupMember::new(User::new("m1", "Mia"), MemberScope::Admin),
        ]);
        let (_rt, dir, mut search) = setup(directory);
        let group = ConversationTarget::Group(Group::new("g1", "Team"));

        search.set_conversation_target(Some(group.clone()));
        search.search(Some(""));
        assert!(search.wait_for_update(TIMEOUT, to_item));
        assert_eq!(names(&search), ["Mia"]);

        search.set_request_type(MentionRequestType::Users);
        search.search(Some("mi"));
        assert!(search.wait_for_update(TIMEOUT, to_item));
        assert!(names(&search).is_empty());
        assert_eq!(dir.requests()[1].scope, DirectoryScope::Users);

        search.set_visibility(MentionsVisibility::UsersConversationOnly);
        assert!(!search.suggestions_enabled());
        search.search(Some("b"));
        assert_eq!(search.state(), SearchState::Idle);
        assert_eq!(dir.requests().len(), 2);
    }
}
