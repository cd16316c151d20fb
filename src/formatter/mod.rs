//! The pluggable text formatter contract and the ordered registry that applies formatters.
//!
//! A formatter is keyed by one trigger character (e.g. `@` for mentions).
//! When a message is drawn, every registered formatter gets a turn at
//! rewriting its text, in registration order.

pub mod spannable;
pub mod style;
pub mod suggestion;

use serde::{Deserialize, Serialize};

use crate::model::Message;
pub use spannable::{Span, SpanAction, SpannableText};
pub use style::{Color, FontStyle, PromptTextStyle, TextAppearance, Theme};
pub use suggestion::SuggestionItem;

/// Where the formatted text is going to be displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormattingType {
    MessageComposer,
    MessageBubble,
    ConversationList,
}

/// Which side of the thread a bubble is drawn on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BubbleAlignment {
    /// Messages received from others.
    #[default]
    Left,
    /// Messages sent by the logged-in user.
    Right,
}

/// A pluggable text-transformation unit keyed by a trigger character.
///
/// Only [`tracking_character`](Self::tracking_character) and
/// [`prepare_message_string`](Self::prepare_message_string) are required;
/// formatters without a suggestion picker can ignore the rest.
pub trait TextFormatter: Send {
    /// The character that activates this formatter in the composer.
    fn tracking_character(&self) -> char;

    /// Starts a lookup for `query`, scoped to the formatter's conversation.
    ///
    /// `None` means the composer left the trigger context: prior results are cleared.
    fn search(&mut self, _query: Option<&str>) {}

    /// Rewrites `text` for display in the given context.
    ///
    /// Must not modify `message`, and must leave text it does not understand untouched.
    fn prepare_message_string(
        &self,
        message: &Message,
        text: SpannableText,
        alignment: BubbleAlignment,
        formatting_type: FormattingType,
    ) -> SpannableText;

    /// Called when the user picks one of this formatter's suggestions.
    fn on_item_click(&mut self, _item: &SuggestionItem) {}

    /// Last chance to attach structured data to an outgoing message.
    fn handle_pre_message_send(&mut self, _message: &mut Message) {}

    /// Called when the suggestion list is scrolled to its end.
    fn on_scroll_to_bottom(&mut self) {}

    /// Applies any search results delivered since the last call.
    ///
    /// Must be called from the UI thread. Returns `true` if published state changed.
    fn process_search_updates(&mut self) -> bool {
        false
    }
}

/// An ordered list of formatters.
#[derive(Default)]
pub struct FormatterRegistry {
    formatters: Vec<Box<dyn TextFormatter>>,
}

impl FormatterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a formatter; it runs after every formatter already registered.
    pub fn register(&mut self, formatter: Box<dyn TextFormatter>) {
        let trigger = formatter.tracking_character();
        if self.formatters.iter().any(|f| f.tracking_character() == trigger) {
            tracing::warn!("Registering a second formatter for trigger {trigger:?}; only the first receives searches");
        }
        self.formatters.push(formatter);
    }

    pub fn len(&self) -> usize {
        self.formatters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formatters.is_empty()
    }

    /// Returns the first formatter registered for `trigger`.
    pub fn formatter_for(&mut self, trigger: char) -> Option<&mut (dyn TextFormatter + 'static)> {
        self.formatters
            .iter_mut()
            .find(|f| f.tracking_character() == trigger)
            .map(|f| f.as_mut())
    }

    /// Runs every formatter over `message.text`, in registration order.
    pub fn format(
        &self,
        message: &Message,
        alignment: BubbleAlignment,
        formatting_type: FormattingType,
    ) -> SpannableText {
        self.formatters.iter().fold(
            SpannableText::new(message.text.as_str()),
            |text, formatter| formatter.prepare_message_string(message, text, alignment, formatting_type),
        )
    }

    pub fn handle_pre_message_send(&mut self, message: &mut Message) {
        for formatter in &mut self.formatters {
            formatter.handle_pre_message_send(message);
        }
    }

    /// Drains pending search results of every formatter.
    pub fn process_search_updates(&mut self) -> bool {
        let mut changed = false;
        for formatter in &mut self.formatters {
            changed |= formatter.process_search_updates();
        }
        changed
    }
}
