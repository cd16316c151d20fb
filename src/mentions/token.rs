//! Encoding mention tokens and turning tokens found in message text back into spans.
//!
//! A mention is stored in message bodies as `<@uid:ID>` (with `@` being the
//! formatter's trigger), next to a list of the mentioned users attached to
//! the message. Rendering swaps each token for `@Name` and covers it with a
//! span.
//!
//! Rendering is done in two passes. The first pass replaces tokens in order
//! and tracks the drift caused by each replacement: when a token of length
//! `L` becomes display text of length `D`, every later token moves by
//! `L - D` bytes. The spans for each replacement are only collected during
//! that pass and are attached in a second pass once all text edits are done,
//! so no span is ever shifted by an edit that was meant for its own range.

use std::ops::Range;

use regex::Regex;

use crate::error::FormatterError;
use crate::formatter::{Span, SpannableText};
use crate::model::User;

/// Builds the token for `id`, e.g. `<@uid:42>`.
pub fn encode_token(trigger: char, id: &str) -> String {
    format!("<{trigger}uid:{id}>")
}

/// The display text for a mention, e.g. `@Ann`.
pub fn prompt_text(trigger: char, user: &User) -> String {
    format!("{trigger}{}", user.display_name())
}

/// Compiles the pattern matching `trigger`'s tokens; capture group 1 is the id.
pub fn token_pattern(trigger: char) -> Result<Regex, FormatterError> {
    if trigger.is_whitespace() || trigger.is_control() || trigger == '<' || trigger == '>' {
        return Err(FormatterError::InvalidTrigger(trigger));
    }
    let escaped = regex::escape(trigger.encode_utf8(&mut [0; 4]));
    // Ids never contain `<`, `>` or whitespace, so a broken token can't swallow the next one.
    Regex::new(&format!(r"<{escaped}uid:([^<>\s]*)>"))
        .map_err(|source| FormatterError::InvalidPattern { trigger, source })
}

/// Extracts the id from a complete token, or `None` if `token` isn't one.
pub fn decode_token_id<'t>(pattern: &Regex, token: &'t str) -> Option<&'t str> {
    let captures = pattern.captures(token)?;
    let whole = captures.get(0)?;
    if whole.start() != 0 || whole.end() != token.len() {
        return None;
    }
    captures.get(1).map(|id| id.as_str()).filter(|id| is_valid_id(id))
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(|c| c.is_whitespace() || c == '<')
}

/// One planned token substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    /// Where the token sits in the text as it was before any replacement.
    pub raw_range: Range<usize>,
    /// Where the token starts once all earlier replacements are applied.
    pub adjusted_start: usize,
    pub display_text: String,
    pub user: User,
}

impl Replacement {
    /// The range the token occupies at the moment it is replaced.
    pub fn adjusted_token_range(&self) -> Range<usize> {
        self.adjusted_start..self.adjusted_start + self.raw_range.len()
    }

    /// The range of the display text once it has been substituted.
    pub fn rendered_range(&self) -> Range<usize> {
        self.adjusted_start..self.adjusted_start + self.display_text.len()
    }
}

/// Pass one: find every token in `text` that resolves to one of `mentions`.
///
/// Tokens with an unknown or malformed id, and tokens that overlap a span
/// already present on `text` (i.e. text that was substituted by an earlier
/// render), are skipped and stay literal.
pub fn plan_replacements(
    text: &SpannableText,
    pattern: &Regex,
    trigger: char,
    mentions: &[User],
) -> Vec<Replacement> {
    let mut replacements = Vec::new();
    // Signed: display names can be longer than their tokens.
    let mut drift: isize = 0;

    for captures in pattern.captures_iter(&text.text) {
        let (Some(whole), Some(id)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let id = id.as_str();
        if !is_valid_id(id) {
            tracing::warn!("Skipping malformed mention token {:?}", whole.as_str());
            continue;
        }
        if text.spans_overlapping(whole.range()).next().is_some() {
            tracing::debug!("Skipping mention token {:?} inside an existing span", whole.as_str());
            continue;
        }
        let Some(user) = mentions.iter().find(|user| user.uid == id) else {
            tracing::debug!("No mentioned user attached for token {:?}; leaving it as text", whole.as_str());
            continue;
        };

        let display_text = prompt_text(trigger, user);
        let adjusted = whole.start() as isize - drift;
        let Ok(adjusted_start) = usize::try_from(adjusted) else {
            tracing::error!("Mention offset underflow at {} (drift {drift}); stopping", whole.start());
            break;
        };
        drift += whole.len() as isize - display_text.len() as isize;

        replacements.push(Replacement {
            raw_range: whole.range(),
            adjusted_start,
            display_text,
            user: user.clone(),
        });
    }
    replacements
}

/// Pass two: apply `replacements` to `text`, then attach one span per
/// replacement built by `make_span`.
///
/// `make_span` receives the rendered range of the display text.
pub fn materialize(
    mut text: SpannableText,
    replacements: &[Replacement],
    mut make_span: impl FnMut(&Replacement, Range<usize>) -> Span,
) -> SpannableText {
    let mut pending: Vec<Span> = Vec::with_capacity(replacements.len());

    for replacement in replacements {
        let token_range = replacement.adjusted_token_range();
        let expected = &replacement.user.uid;
        let still_there = text.text.get(token_range.clone()).is_some_and(|token| {
            token.starts_with('<') && token.ends_with(&format!("uid:{expected}>"))
        });
        if !still_there {
            // Every later offset was computed against this token being replaced.
            tracing::error!("Mention token for {expected} not found at {token_range:?}; skipping the remaining mentions");
            break;
        }
        text.replace_range(token_range, &replacement.display_text);
        pending.push(make_span(replacement, replacement.rendered_range()));
    }

    for span in pending {
        text.add_span(span);
    }
    text
}
