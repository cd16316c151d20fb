//! A string with styled, clickable annotations layered on top of it.
//!
//! All ranges are byte offsets into [`SpannableText::text`] and always fall on
//! `char` boundaries. Use [`SpannableText::char_range`] when a host toolkit
//! indexes by characters instead.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::style::PromptTextStyle;
use super::suggestion::SuggestionItem;

/// What happens when the user taps a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpanAction {
    /// Open the profile of the given user.
    OpenUser { uid: String },
    None,
}

/// A styled annotation over `range` of the rendered text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub range: Range<usize>,
    pub item: SuggestionItem,
    pub style: PromptTextStyle,
    pub action: SpanAction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpannableText {
    pub text: String,
    pub spans: Vec<Span>,
}

impl From<&str> for SpannableText {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for SpannableText {
    fn from(text: String) -> Self {
        Self { text, spans: Vec::new() }
    }
}

impl SpannableText {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), spans: Vec::new() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Attaches a span, keeping the span list ordered by start offset.
    ///
    /// Returns `false` (and does nothing) if the range is out of bounds or
    /// does not fall on `char` boundaries.
    pub fn add_span(&mut self, span: Span) -> bool {
        let Range { start, end } = span.range;
        if start > end || !self.text.is_char_boundary(start) || !self.text.is_char_boundary(end) {
            tracing::warn!("Ignoring span with invalid range {start}..{end} over {} bytes", self.text.len());
            return false;
        }
        let index = self.spans.partition_point(|existing| existing.range.start <= start);
        self.spans.insert(index, span);
        true
    }

    /// Returns the spans that intersect `range`.
    pub fn spans_overlapping(&self, range: Range<usize>) -> impl Iterator<Item = &Span> {
        self.spans
            .iter()
            .filter(move |span| span.range.start < range.end && range.start < span.range.end)
    }

    /// Replaces `range` of the text with `replacement`.
    ///
    /// Spans entirely before the range are untouched, spans entirely after it
    /// are shifted, and spans intersecting it are dropped.
    pub fn replace_range(&mut self, range: Range<usize>, replacement: &str) {
        let removed = range.end - range.start;
        let inserted = replacement.len();
        self.text.replace_range(range.clone(), replacement);
        self.spans.retain_mut(|span| {
            if span.range.end <= range.start {
                true
            } else if span.range.start >= range.end {
                span.range.start = span.range.start - removed + inserted;
                span.range.end = span.range.end - removed + inserted;
                true
            } else {
                false
            }
        });
    }

    /// Converts a span's byte range into a `char` index range.
    pub fn char_range(&self, span: &Span) -> Range<usize> {
        let start = self.text[..span.range.start].chars().count();
        let len = self.text[span.range.clone()].chars().count();
        start..start + len
    }

    /// Returns the text to send over the wire: every span's visible text is
    /// swapped for its item's `underlying_text` (e.g. `@Ann` becomes `<@uid:42>`).
    pub fn to_underlying_text(&self) -> String {
        let mut output = String::with_capacity(self.text.len());
        let mut last = 0;
        for span in &self.spans {
            // overlapping spans can't both be substituted; keep the first one.
            if span.range.start < last {
                continue;
            }
            output.push_str(&self.text[last..span.range.start]);
            output.push_str(&span.item.underlying_text);
            last = span.range.end;
        }
        output.push_str(&self.text[last..]);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(range: Range<usize>, id: &str, name: &str) -> Span {
        Span {
            range,
            item: SuggestionItem::new(id, name, format!("@{name}"), format!("<@uid:{id}>")),
            style: PromptTextStyle::default(),
            action: SpanAction::OpenUser { uid: id.to_string() },
        }
    }

    #[test]
    fn test_replace_range_shifts_later_spans() {
        let mut text = SpannableText::new("hi @Ann and @Bob");
        assert!(text.add_span(span(3..7, "1", "Ann")));
        assert!(text.add_span(span(12..16, "2", "Bob")));

        text.replace_range(0..2, "hello");
        assert_eq!(text.as_str(), "hello @Ann and @Bob");
        assert_eq!(text.spans[0].range, 6..10);
        assert_eq!(text.spans[1].range, 15..19);

        // Editing inside a span drops it.
        text.replace_range(7..8, "x");
        assert_eq!(text.spans.len(), 1);
        assert_eq!(text.spans[0].item.id, "2");
    }

    #[test]
    fn test_add_span_rejects_invalid_ranges() {
        let mut text = SpannableText::new("héllo");
        assert!(!text.add_span(span(0..2, "1", "x")));
        assert!(!text.add_span(span(4..10, "1", "x")));
        assert!(text.add_span(span(0..3, "1", "x")));
    }

    #[test]
    fn test_underlying_text_restores_tokens() {
        let mut text = SpannableText::new("@Ann, ping @Bob");
        text.add_span(span(11..15, "2", "Bob"));
        text.add_span(span(0..4, "1", "Ann"));
        assert_eq!(text.to_underlying_text(), "<@uid:1>, ping <@uid:2>");
    }

    #[test]
    fn test_char_range_counts_chars_not_bytes() {
        let mut text = SpannableText::new("héllo @Zoë!");
        text.add_span(span(7..12, "9", "Zoë"));
        assert_eq!(text.char_range(&text.spans[0]), 6..10);
    }
}
