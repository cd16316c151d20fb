//! Composer-side helpers: spotting the trigger the user is typing after, and
//! inserting a picked suggestion in its place.

use unicode_segmentation::UnicodeSegmentation;

use crate::formatter::{Span, SpanAction, SpannableText, SuggestionItem};

/// The trigger being typed and the query after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerQuery {
    /// Byte offset of the trigger character.
    pub start: usize,
    /// The text between the trigger and the cursor.
    pub query: String,
}

/// Finds the active trigger before `cursor` (a byte offset).
///
/// A trigger starts a search only when it was just typed at the start of the
/// text or after whitespace. While `already_searching`, the search continues
/// from the last trigger before the cursor as long as the query has no
/// line break.
pub fn find_trigger_query(text: &str, cursor: usize, trigger: char, already_searching: bool) -> Option<TriggerQuery> {
    if cursor == 0 || cursor > text.len() || !text.is_char_boundary(cursor) {
        return None;
    }
    let mut buf = [0; 4];
    let trigger_str: &str = trigger.encode_utf8(&mut buf);
    let graphemes: Vec<(usize, &str)> = text[..cursor].grapheme_indices(true).collect();

    // Trigger right before the cursor, preceded by whitespace or nothing.
    if let Some(&(last_start, last)) = graphemes.last()
        && last == trigger_str
    {
        let preceded_by_space = graphemes.len() == 1
            || graphemes.get(graphemes.len() - 2).is_some_and(|(_, g)| g.trim().is_empty());
        if preceded_by_space {
            return Some(TriggerQuery { start: last_start, query: String::new() });
        }
    }

    if !already_searching {
        return None;
    }
    let &(at_start, _) = graphemes.iter().rev().find(|(_, g)| *g == trigger_str)?;
    let query = &text[at_start + trigger_str.len()..cursor];
    if query.contains(['\n', '\r']) {
        return None;
    }
    Some(TriggerQuery { start: at_start, query: query.to_owned() })
}

/// Replaces `trigger_start..cursor` with the item's prompt text plus a
/// trailing space, covering the prompt text with a span for the item.
///
/// Returns the new cursor position, or `None` if the range is not valid for `text`.
pub fn insert_suggestion(
    text: &mut SpannableText,
    trigger_start: usize,
    cursor: usize,
    item: &SuggestionItem,
) -> Option<usize> {
    if trigger_start > cursor
        || cursor > text.text.len()
        || !text.text.is_char_boundary(trigger_start)
        || !text.text.is_char_boundary(cursor)
    {
        tracing::warn!("Cannot insert mention of {} at {trigger_start}..{cursor}", item.id);
        return None;
    }

    let insertion = format!("{} ", item.prompt_text);
    text.replace_range(trigger_start..cursor, &insertion);
    text.add_span(Span {
        range: trigger_start..trigger_start + item.prompt_text.len(),
        item: item.clone(),
        style: item.prompt_text_style.clone().unwrap_or_default(),
        action: SpanAction::OpenUser { uid: item.id.clone() },
    });
    Some(trigger_start + insertion.len())
}
