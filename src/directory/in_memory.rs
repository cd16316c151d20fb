//! An in-process [`Directory`] backed by plain vectors of users and group members.
//!
//! Used by the demo binary and by tests. Search results are ranked the way
//! a mention picker expects: exact matches first, then prefixes, then
//! word-boundary and substring matches; ties go to higher-ranked group
//! members and then to names sorted alphabetically (letters before digits
//! before symbols).

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use unicode_segmentation::UnicodeSegmentation;

use super::{Directory, DirectoryEntry, DirectoryPage, DirectoryRequest, DirectoryScope};
use crate::error::DirectoryError;
use crate::model::{GroupMember, MemberScope, User};

/// Sort key used to order matches of equal priority.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct EntrySortKey {
    /// 0=Admin, 1=Moderator, 2=Participant (plain users count as participants)
    scope_rank: u8,
    /// 0=Alphabetic, 1=Numeric, 2=Symbols
    name_category: u8,
    /// Lowercase name with leading symbols stripped
    sort_key: String,
}

impl EntrySortKey {
    fn new(user: &User, scope: MemberScope) -> Self {
        let scope_rank = match scope {
            MemberScope::Admin => 0,
            MemberScope::Moderator => 1,
            MemberScope::Participant => 2,
        };
        let raw_name = user.display_name();

        // "!!!alice" sorts as "alice", but pure-symbol names keep their symbols.
        let stripped = raw_name.trim_start_matches(|c: char| !c.is_alphanumeric());
        let basis = if stripped.is_empty() { raw_name } else { stripped };
        let sort_key = if basis.is_ascii() { basis.to_ascii_lowercase() } else { basis.to_lowercase() };
        let name_category = match basis.chars().next() {
            Some(c) if c.is_alphabetic() => 0,
            Some(c) if c.is_numeric() => 1,
            _ => 2,
        };

        Self { scope_rank, name_category, sort_key }
    }
}

#[derive(Default)]
struct Script {
    failures: VecDeque<DirectoryError>,
    delays: BTreeMap<String, Duration>,
    requests: Vec<DirectoryRequest>,
}

#[derive(Default)]
pub struct InMemoryDirectory {
    users: Vec<User>,
    groups: BTreeMap<String, Vec<GroupMember>>,
    /// The logged-in user, who is never offered as a suggestion.
    exclude_uid: Option<String>,
    script: Mutex<Script>,
}

impl InMemoryDirectory {
    pub fn new(users: Vec<User>) -> Self {
        Self { users, ..Self::default() }
    }

    pub fn with_group(mut self, guid: impl Into<String>, members: Vec<GroupMember>) -> Self {
        self.groups.insert(guid.into(), members);
        self
    }

    pub fn excluding(mut self, uid: impl Into<String>) -> Self {
        self.exclude_uid = Some(uid.into());
        self
    }

    /// Makes the next request fail with `error`. Failures queue up in order.
    pub fn fail_next(&self, error: DirectoryError) {
        self.lock_script().failures.push_back(error);
    }

    /// Delays every request whose keyword equals `keyword` (`""` for no keyword).
    pub fn delay_keyword(&self, keyword: impl Into<String>, delay: Duration) {
        self.lock_script().delays.insert(keyword.into(), delay);
    }

    /// All requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<DirectoryRequest> {
        self.lock_script().requests.clone()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, Script> {
        // The script holds no invariants across fields, so a poisoned lock is still usable.
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn candidates(&self, scope: &DirectoryScope) -> Result<Vec<(DirectoryEntry, EntrySortKey)>, DirectoryError> {
        let entries = match scope {
            DirectoryScope::Users => self.users
                .iter()
                .map(|user| (DirectoryEntry::User(user.clone()), EntrySortKey::new(user, MemberScope::Participant)))
                .collect(),
            DirectoryScope::GroupMembers { guid } => {
                let Some(members) = self.groups.get(guid) else {
                    return Err(DirectoryError::Request {
                        code: "ERR_GUID_NOT_FOUND".into(),
                        message: format!("group {guid} does not exist"),
                    });
                };
                members
                    .iter()
                    .map(|member| (DirectoryEntry::GroupMember(member.clone()), EntrySortKey::new(&member.user, member.scope)))
                    .collect()
            }
        };
        Ok(entries)
    }

    /// Ranks and filters without pagination.
    pub fn search(&self, scope: &DirectoryScope, keyword: Option<&str>) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let keyword = keyword.map(str::trim).unwrap_or_default();
        let mut matches: Vec<(u8, EntrySortKey, DirectoryEntry)> = self
            .candidates(scope)?
            .into_iter()
            .filter(|(entry, _)| self.exclude_uid.as_deref() != Some(entry.user().uid.as_str()))
            .filter_map(|(entry, key)| {
                match_user_with_priority(entry.user(), keyword).map(|priority| (priority, key, entry))
            })
            .collect();

        matches.sort_by(|(priority_a, key_a, _), (priority_b, key_b, _)| {
            priority_a.cmp(priority_b).then_with(|| key_a.cmp(key_b))
        });
        Ok(matches.into_iter().map(|(_, _, entry)| entry).collect())
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn fetch(&self, request: DirectoryRequest) -> Result<DirectoryPage, DirectoryError> {
        let (failure, delay) = {
            let mut script = self.lock_script();
            script.requests.push(request.clone());
            let keyword = request.keyword.clone().unwrap_or_default();
            (script.failures.pop_front(), script.delays.get(&keyword).copied())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = failure {
            return Err(error);
        }

        let all = self.search(&request.scope, request.keyword.as_deref())?;
        let start = (request.page as usize).saturating_mul(request.limit);
        let entries: Vec<DirectoryEntry> = all.iter().skip(start).take(request.limit).cloned().collect();
        let has_more = start.saturating_add(entries.len()) < all.len();
        Ok(DirectoryPage { entries, has_more })
    }
}

/// Check if `search_text` appears right after a word boundary in `text`.
///
/// Word boundaries are any non-alphanumeric character; a match at index 0
/// doesn't count here because prefix matches are ranked separately.
fn check_word_boundary_match(text: &str, search_text: &str, case_insensitive: bool) -> bool {
    let (text_to_search, search_pattern) = if case_insensitive && search_text.is_ascii() {
        (text.to_lowercase(), search_text.to_lowercase())
    } else {
        (text.to_string(), search_text.to_string())
    };

    text_to_search
        .match_indices(&search_pattern)
        .filter(|(index, _)| *index > 0)
        .any(|(index, _)| {
            text_to_search[..index]
                .chars()
                .last()
                .is_some_and(|prev_char| !prev_char.is_alphanumeric())
        })
}

/// Check if `haystack` starts with `needle`, comparing whole grapheme clusters.
///
/// Only used for search text containing multi-codepoint characters
/// (emoji sequences, combining accents), where `str::starts_with`
/// could match half of a user-perceived character.
fn grapheme_starts_with(haystack: &str, needle: &str, case_insensitive: bool) -> bool {
    let mut haystack_graphemes = haystack.graphemes(true);
    needle.graphemes(true).all(|n_grapheme| {
        let Some(h_grapheme) = haystack_graphemes.next() else {
            return false;
        };
        if case_insensitive && h_grapheme.is_ascii() && n_grapheme.is_ascii() {
            h_grapheme.eq_ignore_ascii_case(n_grapheme)
        } else {
            h_grapheme == n_grapheme
        }
    })
}

/// Match a user against `search_text`, returning a priority (lower is better)
/// or `None` if it doesn't match at all.
///
/// 0. exact display name
/// 1. exact display name, ignoring ASCII case
/// 2. exact uid
/// 3. exact uid, ignoring ASCII case
/// 4. display name prefix
/// 5. display name prefix, ignoring ASCII case
/// 6. uid prefix
/// 7. uid prefix, ignoring ASCII case
/// 8. display name contains the text (word boundary first, then anywhere)
/// 9. uid contains the text
///
/// An empty search matches everyone with priority 10.
fn match_user_with_priority(user: &User, search_text: &str) -> Option<u8> {
    if search_text.is_empty() {
        return Some(10);
    }

    let display_name = user.display_name();
    let uid = user.uid.as_str();
    let case_insensitive = search_text.is_ascii();
    let search_lower = search_text.to_lowercase();
    let display_lower = display_name.to_lowercase();
    let uid_lower = uid.to_lowercase();

    if display_name == search_text {
        return Some(0);
    }
    if case_insensitive && display_lower == search_lower {
        return Some(1);
    }
    if uid == search_text {
        return Some(2);
    }
    if case_insensitive && uid_lower == search_lower {
        return Some(3);
    }
    if display_name.starts_with(search_text) {
        return Some(4);
    }
    if case_insensitive && display_lower.starts_with(&search_lower) {
        return Some(5);
    }
    if uid.starts_with(search_text) {
        return Some(6);
    }
    if case_insensitive && uid_lower.starts_with(&search_lower) {
        return Some(7);
    }

    if check_word_boundary_match(display_name, search_text, case_insensitive) {
        return Some(8);
    }
    let display_contains = if case_insensitive {
        display_lower.contains(&search_lower)
    } else {
        display_name.contains(search_text)
    };
    if display_contains {
        return Some(8);
    }

    let uid_contains = if case_insensitive { uid_lower.contains(&search_lower) } else { uid.contains(search_text) };
    if uid_contains {
        return Some(9);
    }

    // Complex graphemes: e.g. a decomposed accent typed against a name using the same sequence.
    if !case_insensitive
        && search_text.graphemes(true).count() != search_text.chars().count()
        && grapheme_starts_with(display_name, search_text, false)
    {
        return Some(8);
    }

    None
}
