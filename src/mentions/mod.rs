//! The @mention formatter.
//!
//! While composing, it searches the directory for the text typed after the
//! trigger and publishes suggestions. A picked suggestion shows up as `@Name`
//! in the composer and is sent as `<@uid:ID>`, with the mentioned users
//! attached to the message. When a message is drawn, those tokens are turned
//! back into styled, clickable `@Name` spans.

pub mod composer;
pub mod search;
pub mod styles;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

use eyeball::SharedObservable;
use eyeball_im::VectorSubscriber;
use indexmap::IndexMap;
use regex::Regex;

use crate::config::MentionsConfig;
use crate::directory::DirectoryEntry;
use crate::error::FormatterError;
use crate::formatter::{
    BubbleAlignment, FormattingType, PromptTextStyle, Span, SpanAction, SpannableText, SuggestionItem,
    TextFormatter, Theme,
};
use crate::model::{ConversationTarget, Message, User};
use crate::session::ChatSession;
use search::{MentionRequestType, MentionsVisibility, SearchState, SuggestionSearch};
use styles::{MentionStyleOverrides, ResolvedMentionStyles};

pub struct MentionsFormatter {
    session: Arc<ChatSession>,
    trigger: char,
    pattern: Regex,
    theme: Theme,
    style_overrides: MentionStyleOverrides,
    styles: ResolvedMentionStyles,
    search: SuggestionSearch,
    /// Mentions picked in the composer for the message being written, keyed by id.
    selected: IndexMap<String, SuggestionItem>,
}

impl MentionsFormatter {
    /// A formatter for `@` with the default configuration.
    pub fn new(session: Arc<ChatSession>) -> Result<Self, FormatterError> {
        Self::with_config(session, MentionsConfig::default())
    }

    pub fn with_config(session: Arc<ChatSession>, config: MentionsConfig) -> Result<Self, FormatterError> {
        let pattern = token::token_pattern(config.trigger)?;
        let mut search = SuggestionSearch::new(session.clone());
        search.set_request_type(config.request_type);
        search.set_visibility(config.visibility);
        search.set_page_size(config.page_size);
        search.set_limit_info_text(config.limit_info_text);
        search.set_mention_limit(config.mention_limit);

        Ok(Self {
            session,
            trigger: config.trigger,
            pattern,
            styles: ResolvedMentionStyles::resolve(&config.theme, &config.styles),
            theme: config.theme,
            style_overrides: config.styles,
            search,
            selected: IndexMap::new(),
        })
    }

    pub fn set_conversation_target(&mut self, target: Option<ConversationTarget>) {
        self.search.set_conversation_target(target);
    }

    pub fn set_request_type(&mut self, request_type: MentionRequestType) {
        self.search.set_request_type(request_type);
    }

    pub fn set_visibility(&mut self, visibility: MentionsVisibility) {
        self.search.set_visibility(visibility);
    }

    pub fn set_mention_limit(&mut self, limit: usize) {
        self.search.set_mention_limit(limit);
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        self.styles = ResolvedMentionStyles::resolve(&self.theme, &self.style_overrides);
    }

    pub fn set_style_overrides(&mut self, overrides: MentionStyleOverrides) {
        self.style_overrides = overrides;
        self.styles = ResolvedMentionStyles::resolve(&self.theme, &self.style_overrides);
    }

    pub fn styles(&self) -> &ResolvedMentionStyles {
        &self.styles
    }

    pub fn search_state(&self) -> SearchState {
        self.search.state()
    }

    /// Whether the selection limit has been reached.
    pub fn disable_suggestions(&self) -> bool {
        self.search.disable_suggestions()
    }

    /// Whether suggestions are offered in the current conversation right now.
    pub fn suggestions_enabled(&self) -> bool {
        self.search.suggestions_enabled()
    }

    pub fn suggestions(&self) -> Vec<SuggestionItem> {
        self.search.suggestions()
    }

    pub fn subscribe_suggestions(&self) -> VectorSubscriber<SuggestionItem> {
        self.search.subscribe_suggestions()
    }

    pub fn loading(&self) -> SharedObservable<bool> {
        self.search.loading()
    }

    pub fn info_visible(&self) -> SharedObservable<bool> {
        self.search.info_visible()
    }

    pub fn info_text(&self) -> SharedObservable<String> {
        self.search.info_text()
    }

    pub fn selected_items(&self) -> impl Iterator<Item = &SuggestionItem> {
        self.selected.values()
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// Replaces the selection, e.g. when a draft is restored.
    pub fn set_selected(&mut self, items: impl IntoIterator<Item = SuggestionItem>) {
        self.selected = items.into_iter().map(|item| (item.id.clone(), item)).collect();
        self.search.set_selected_count(self.selected.len());
    }

    /// Forgets a selected mention, e.g. after its text was deleted from the composer.
    pub fn remove_selected(&mut self, id: &str) -> Option<SuggestionItem> {
        let removed = self.selected.shift_remove(id);
        self.search.set_selected_count(self.selected.len());
        removed
    }

    /// Drops every selected mention that no longer has a span in `composer`.
    pub fn retain_selected_in(&mut self, composer: &SpannableText) {
        self.selected.retain(|id, _| composer.spans.iter().any(|span| &span.item.id == id));
        self.search.set_selected_count(self.selected.len());
    }

    /// Inserts `item` over the typed `trigger..cursor` range of `composer`
    /// and records the selection. Returns the new cursor.
    pub fn select_suggestion(
        &mut self,
        composer: &mut SpannableText,
        trigger_start: usize,
        cursor: usize,
        item: &SuggestionItem,
    ) -> Option<usize> {
        if !self.accepts_selection(item) {
            tracing::warn!("Not inserting mention of {}: mention limit reached", item.id);
            return None;
        }
        let new_cursor = composer::insert_suggestion(composer, trigger_start, cursor, item)?;
        self.on_item_click(item);
        Some(new_cursor)
    }

    /// Whether picking `item` now would be recorded: it is already selected,
    /// or the limit leaves room for one more.
    pub fn accepts_selection(&self, item: &SuggestionItem) -> bool {
        self.selected.contains_key(&item.id) || !self.search.disable_suggestions()
    }

    /// Blocks until a pending search result arrives and applies it.
    ///
    /// Returns `false` if nothing arrived within `timeout`.
    pub fn wait_for_search_update(&mut self, timeout: Duration) -> bool {
        let (trigger, session, styles) = (self.trigger, &self.session, &self.styles);
        self.search.wait_for_update(timeout, |entry| suggestion_for_entry(entry, trigger, session, styles))
    }

    /// Builds the suggestion for `entry`, styled for the composer.
    pub fn suggestion_for_entry(&self, entry: &DirectoryEntry) -> SuggestionItem {
        suggestion_for_entry(entry, self.trigger, &self.session, &self.styles)
    }

    fn mention_span(
        &self,
        user: &User,
        range: std::ops::Range<usize>,
        alignment: BubbleAlignment,
        formatting_type: FormattingType,
    ) -> Span {
        let is_self = self.session.is_logged_in_user(&user.uid);
        let style = self.styles.style_for(formatting_type, alignment, is_self).clone();
        let item = suggestion_for_user(user, self.trigger, Some(style.clone()), user_json(user));
        Span {
            range,
            item,
            style,
            action: SpanAction::OpenUser { uid: user.uid.clone() },
        }
    }
}

fn user_json(user: &User) -> serde_json::Value {
    serde_json::to_value(user).unwrap_or_else(|e| {
        tracing::error!("Failed to serialize user {}: {e}", user.uid);
        serde_json::Value::Null
    })
}

fn suggestion_for_user(user: &User, trigger: char, style: Option<PromptTextStyle>, data: serde_json::Value) -> SuggestionItem {
    SuggestionItem::new(
        &user.uid,
        user.display_name(),
        token::prompt_text(trigger, user),
        token::encode_token(trigger, &user.uid),
    )
    .with_avatar(user.avatar.clone())
    .with_status(user.status)
    .with_data(data)
    .with_style(style)
}

fn suggestion_for_entry(
    entry: &DirectoryEntry,
    trigger: char,
    session: &ChatSession,
    styles: &ResolvedMentionStyles,
) -> SuggestionItem {
    let user = entry.user();
    let is_self = session.is_logged_in_user(&user.uid);
    let style = styles
        .style_for(FormattingType::MessageComposer, BubbleAlignment::Right, is_self)
        .clone();
    suggestion_for_user(user, trigger, Some(style), entry.to_json())
}

/// Recovers the user behind a selected suggestion.
fn user_for_item(item: &SuggestionItem) -> User {
    match serde_json::from_value::<User>(item.data.clone()) {
        Ok(user) if user.uid == item.id => user,
        _ => User {
            uid: item.id.clone(),
            name: item.name.clone(),
            avatar: item.avatar.clone(),
            status: item.status,
        },
    }
}

impl TextFormatter for MentionsFormatter {
    fn tracking_character(&self) -> char {
        self.trigger
    }

    fn search(&mut self, query: Option<&str>) {
        self.search.search(query);
    }

    fn prepare_message_string(
        &self,
        message: &Message,
        text: SpannableText,
        alignment: BubbleAlignment,
        formatting_type: FormattingType,
    ) -> SpannableText {
        if message.mentioned_users.is_empty() {
            return text;
        }
        let plan = token::plan_replacements(&text, &self.pattern, self.trigger, &message.mentioned_users);
        if plan.is_empty() {
            return text;
        }
        token::materialize(text, &plan, |replacement, range| {
            self.mention_span(&replacement.user, range, alignment, formatting_type)
        })
    }

    fn on_item_click(&mut self, item: &SuggestionItem) {
        if !self.accepts_selection(item) {
            tracing::warn!("Ignoring selection of {}: mention limit reached", item.id);
            return;
        }
        self.selected.insert(item.id.clone(), item.clone());
        self.search.consume();
        self.search.set_selected_count(self.selected.len());
    }

    fn handle_pre_message_send(&mut self, message: &mut Message) {
        for item in self.selected.values() {
            if !message.text.contains(&item.underlying_text) {
                continue;
            }
            if message.mentioned_users.iter().any(|user| user.uid == item.id) {
                continue;
            }
            message.mentioned_users.push(user_for_item(item));
        }
        self.selected.clear();
        self.search.clear_selection();
    }

    fn on_scroll_to_bottom(&mut self) {
        self.search.load_more();
    }

    fn process_search_updates(&mut self) -> bool {
        let (trigger, session, styles) = (self.trigger, &self.session, &self.styles);
        self.search.process_updates(|entry| suggestion_for_entry(entry, trigger, session, styles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::model::{Group, GroupMember, MemberScope};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn formatter_with(directory: InMemoryDirectory, config: MentionsConfig) -> (tokio::runtime::Runtime, MentionsFormatter) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let session = ChatSession::new(User::new("me", "Myself"), Arc::new(directory), runtime.handle().clone());
        let formatter = MentionsFormatter::with_config(Arc::new(session), config).unwrap();
        (runtime, formatter)
    }

    fn formatter() -> (tokio::runtime::Runtime, MentionsFormatter) {
        let users = vec![User::new("42", "Ann"), User::new("7", "Bob"), User::new("me", "Myself")];
        formatter_with(InMemoryDirectory::new(users).excluding("me"), MentionsConfig::default())
    }

    #[test]
    fn test_bubble_rendering_end_to_end() {
        let (_rt, formatter) = formatter();
        let message = Message::new("hello <@uid:42>!").with_mentions(vec![User::new("42", "Ann")]);
        let output = formatter.prepare_message_string(
            &message,
            SpannableText::new(message.text.as_str()),
            BubbleAlignment::Left,
            FormattingType::MessageBubble,
        );
        assert_eq!(output.as_str(), "hello @Ann!");
        assert_eq!(output.spans.len(), 1);
        let span = &output.spans[0];
        assert_eq!(span.range, 6..10);
        assert_eq!(span.item.id, "42");
        assert_eq!(span.item.underlying_text, "<@uid:42>");
        assert_eq!(span.action, SpanAction::OpenUser { uid: "42".into() });
        // The message is left alone.
        assert_eq!(message.text, "hello <@uid:42>!");
    }

    #[test]
    fn test_self_mentions_use_self_style_in_every_context() {
        let (_rt, formatter) = formatter();
        let message = Message::new("<@uid:me> and <@uid:42>")
            .with_mentions(vec![User::new("me", "Myself"), User::new("42", "Ann")]);
        let contexts = [
            (FormattingType::MessageComposer, BubbleAlignment::Left),
            (FormattingType::MessageBubble, BubbleAlignment::Left),
            (FormattingType::MessageBubble, BubbleAlignment::Right),
            (FormattingType::ConversationList, BubbleAlignment::Left),
        ];
        for (formatting_type, alignment) in contexts {
            let output = formatter.prepare_message_string(
                &message,
                SpannableText::new(message.text.as_str()),
                alignment,
                formatting_type,
            );
            assert_eq!(output.as_str(), "@Myself and @Ann");
            let styles = formatter.styles();
            assert_eq!(&output.spans[0].style, styles.style_for(formatting_type, alignment, true));
            assert_eq!(&output.spans[1].style, styles.style_for(formatting_type, alignment, false));
            assert_ne!(output.spans[0].style, output.spans[1].style);
        }
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let (_rt, formatter) = formatter();
        let message = Message::new("<@uid:42> <@uid:7>")
            .with_mentions(vec![User::new("42", "Ann"), User::new("7", "Bob")]);
        let once = formatter.prepare_message_string(
            &message,
            SpannableText::new(message.text.as_str()),
            BubbleAlignment::Right,
            FormattingType::MessageBubble,
        );
        let twice = formatter.prepare_message_string(&message, once.clone(), BubbleAlignment::Right, FormattingType::MessageBubble);
        assert_eq!(twice, once);
        assert_eq!(twice.as_str(), "@Ann @Bob");
    }

    #[test]
    fn test_message_without_mentions_is_unchanged() {
        let (_rt, formatter) = formatter();
        let message = Message::new("see <@uid:42>");
        let output = formatter.prepare_message_string(
            &message,
            SpannableText::new(message.text.as_str()),
            BubbleAlignment::Left,
            FormattingType::ConversationList,
        );
        assert_eq!(output, SpannableText::new("see <@uid:42>"));
    }

    #[test]
    fn test_compose_select_and_send() {
        let (_rt, mut formatter) = formatter();
        let mut composer = SpannableText::new("hi @an");

        formatter.search(Some("an"));
        assert!(formatter.wait_for_search_update(TIMEOUT));
        let suggestions = formatter.suggestions();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].prompt_text, "@Ann");
        assert_eq!(suggestions[0].data["uid"], "42");

        let cursor = formatter.select_suggestion(&mut composer, 3, 6, &suggestions[0]).unwrap();
        assert_eq!(composer.as_str(), "hi @Ann ");
        assert_eq!(cursor, 8);
        assert_eq!(formatter.selected_count(), 1);
        assert_eq!(formatter.search_state(), SearchState::Idle);
        assert!(formatter.suggestions().is_empty());

        let mut message = Message::new(composer.to_underlying_text());
        formatter.handle_pre_message_send(&mut message);
        assert_eq!(message.text, "hi <@uid:42> ");
        assert_eq!(message.mentioned_users, vec![User::new("42", "Ann")]);
        assert_eq!(formatter.selected_count(), 0);
    }

    #[test]
    fn test_pre_send_skips_mentions_deleted_from_text() {
        let (_rt, mut formatter) = formatter();
        formatter.set_selected([
            SuggestionItem::new("42", "Ann", "@Ann", "<@uid:42>"),
            SuggestionItem::new("7", "Bob", "@Bob", "<@uid:7>"),
        ]);
        let mut message = Message::new("just <@uid:7>");
        formatter.handle_pre_message_send(&mut message);
        assert_eq!(message.mentioned_users, vec![User::new("7", "Bob")]);
    }

    #[test]
    fn test_limit_gate_through_selection() {
        let config = MentionsConfig { mention_limit: 1, ..MentionsConfig::default() };
        let (_rt, mut formatter) = formatter_with(InMemoryDirectory::new(vec![User::new("42", "Ann")]), config);
        let ann = SuggestionItem::new("42", "Ann", "@Ann", "<@uid:42>");
        let bob = SuggestionItem::new("7", "Bob", "@Bob", "<@uid:7>");

        formatter.on_item_click(&ann);
        assert!(formatter.disable_suggestions());
        assert!(formatter.info_visible().get());
        assert!(!formatter.info_text().get().is_empty());
        assert_eq!(formatter.search_state(), SearchState::Disabled);

        // Over the limit: ignored.
        formatter.on_item_click(&bob);
        assert_eq!(formatter.selected_count(), 1);

        // Ann's text was deleted from the composer.
        formatter.retain_selected_in(&SpannableText::new("nothing left"));
        assert!(!formatter.disable_suggestions());
        assert!(!formatter.info_visible().get());
        assert_eq!(formatter.search_state(), SearchState::Idle);
        assert!(formatter.remove_selected("42").is_none());
    }

    #[test]
    fn test_selection_over_the_limit_leaves_composer_untouched() {
        let config = MentionsConfig { mention_limit: 1, ..MentionsConfig::default() };
        let (_rt, mut formatter) = formatter_with(InMemoryDirectory::default(), config);
        let ann = SuggestionItem::new("42", "Ann", "@Ann", "<@uid:42>");
        let bob = SuggestionItem::new("7", "Bob", "@Bob", "<@uid:7>");

        let mut composer = SpannableText::new("@a");
        let cursor = formatter.select_suggestion(&mut composer, 0, 2, &ann).unwrap();
        composer.replace_range(cursor..cursor, "@b");
        let before = composer.clone();

        assert!(!formatter.accepts_selection(&bob));
        assert_eq!(formatter.select_suggestion(&mut composer, cursor, cursor + 2, &bob), None);
        assert_eq!(composer, before);
        assert_eq!(formatter.selected_count(), 1);

        // Every token that goes out has its user attached.
        let mut message = Message::new(composer.to_underlying_text());
        formatter.handle_pre_message_send(&mut message);
        assert_eq!(message.text, "<@uid:42> @b");
        assert_eq!(message.mentioned_users, vec![User::new("42", "Ann")]);
    }

    #[test]
    fn test_query_held_back_at_limit_is_dropped_on_send() {
        let config = MentionsConfig { mention_limit: 1, ..MentionsConfig::default() };
        let users = vec![User::new("42", "Ann"), User::new("7", "Bob")];
        let (_rt, mut formatter) = formatter_with(InMemoryDirectory::new(users), config);
        formatter.on_item_click(&SuggestionItem::new("42", "Ann", "@Ann", "<@uid:42>"));
        formatter.search(Some("bo"));
        assert_eq!(formatter.search_state(), SearchState::Disabled);

        let mut message = Message::new("<@uid:42> @bo");
        formatter.handle_pre_message_send(&mut message);
        assert_eq!(formatter.search_state(), SearchState::Idle);
        assert!(!formatter.wait_for_search_update(Duration::from_millis(200)));
        assert!(formatter.suggestions().is_empty());
    }

    #[test]
    fn test_group_member_suggestions_keep_member_payload() {
        let directory = InMemoryDirectory::default().with_group("g1", vec![
            GroupMember::new(User::new("9", "Nia"), MemberScope::Moderator),
        ]);
        let (_rt, mut formatter) = formatter_with(directory, MentionsConfig::default());
        formatter.set_conversation_target(Some(ConversationTarget::Group(Group::new("g1", "Crew"))));
        formatter.search(Some("ni"));
        assert!(formatter.wait_for_search_update(TIMEOUT));

        let item = formatter.suggestions().remove(0);
        assert_eq!(item.data["scope"], "moderator");
        assert_eq!(user_for_item(&item), User::new("9", "Nia"));
    }

    #[test]
    fn test_custom_trigger() {
        let config = MentionsConfig { trigger: '+', ..MentionsConfig::default() };
        let (_rt, formatter) = formatter_with(InMemoryDirectory::default(), config);
        assert_eq!(formatter.tracking_character(), '+');
        let message = Message::new("<+uid:1> <@uid:1>").with_mentions(vec![User::new("1", "Ann")]);
        let output = formatter.prepare_message_string(
            &message,
            SpannableText::new(message.text.as_str()),
            BubbleAlignment::Left,
            FormattingType::MessageBubble,
        );
        assert_eq!(output.as_str(), "+Ann <@uid:1>");
    }

    #[test]
    fn test_invalid_trigger_is_rejected() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let session = ChatSession::new(User::new("me", "Me"), Arc::new(InMemoryDirectory::default()), runtime.handle().clone());
        let config = MentionsConfig { trigger: ' ', ..MentionsConfig::default() };
        assert!(MentionsFormatter::with_config(Arc::new(session), config).is_err());
    }
}
