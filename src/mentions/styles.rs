//! Mention styles for each render context.
//!
//! Resolving (theme + overrides → concrete styles) happens once, when the
//! formatter is configured. Rendering only looks styles up.

use serde::{Deserialize, Serialize};

use crate::formatter::{BubbleAlignment, FontStyle, FormattingType, PromptTextStyle, TextAppearance, Theme};

/// Optional styles for mentions of the logged-in user ("self") and of anyone else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MentionStylePair {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_mention: Option<PromptTextStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_mention: Option<PromptTextStyle>,
}

/// User-supplied styles; any unset slot falls back to the theme default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MentionStyleOverrides {
    pub composer: MentionStylePair,
    pub outgoing_bubble: MentionStylePair,
    pub incoming_bubble: MentionStylePair,
    pub conversation_list: MentionStylePair,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStylePair {
    pub self_mention: PromptTextStyle,
    pub other_mention: PromptTextStyle,
}

impl ResolvedStylePair {
    fn resolve(overrides: &MentionStylePair, defaults: ResolvedStylePair) -> Self {
        let pick = |custom: &Option<PromptTextStyle>, default: PromptTextStyle| match custom {
            Some(custom) => custom.clone().or(&default),
            None => default,
        };
        Self {
            self_mention: pick(&overrides.self_mention, defaults.self_mention),
            other_mention: pick(&overrides.other_mention, defaults.other_mention),
        }
    }

    pub fn get(&self, is_self: bool) -> &PromptTextStyle {
        if is_self { &self.self_mention } else { &self.other_mention }
    }
}

/// Concrete styles for all four render contexts.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMentionStyles {
    pub composer: ResolvedStylePair,
    pub outgoing_bubble: ResolvedStylePair,
    pub incoming_bubble: ResolvedStylePair,
    pub conversation_list: ResolvedStylePair,
}

impl Default for ResolvedMentionStyles {
    fn default() -> Self {
        Self::resolve(&Theme::default(), &MentionStyleOverrides::default())
    }
}

impl ResolvedMentionStyles {
    pub fn resolve(theme: &Theme, overrides: &MentionStyleOverrides) -> Self {
        Self {
            composer: ResolvedStylePair::resolve(&overrides.composer, default_composer(theme)),
            outgoing_bubble: ResolvedStylePair::resolve(&overrides.outgoing_bubble, default_outgoing(theme)),
            incoming_bubble: ResolvedStylePair::resolve(&overrides.incoming_bubble, default_incoming(theme)),
            conversation_list: ResolvedStylePair::resolve(&overrides.conversation_list, default_conversation_list(theme)),
        }
    }

    /// The style for a mention drawn in `formatting_type`.
    ///
    /// `alignment` only matters for bubbles: `Right` is an outgoing bubble.
    pub fn style_for(
        &self,
        formatting_type: FormattingType,
        alignment: BubbleAlignment,
        is_self: bool,
    ) -> &PromptTextStyle {
        let pair = match (formatting_type, alignment) {
            (FormattingType::MessageComposer, _) => &self.composer,
            (FormattingType::MessageBubble, BubbleAlignment::Right) => &self.outgoing_bubble,
            (FormattingType::MessageBubble, BubbleAlignment::Left) => &self.incoming_bubble,
            (FormattingType::ConversationList, _) => &self.conversation_list,
        };
        pair.get(is_self)
    }
}

fn bold() -> TextAppearance {
    TextAppearance { font_family: None, font_style: FontStyle::BOLD }
}

fn default_composer(theme: &Theme) -> ResolvedStylePair {
    ResolvedStylePair {
        self_mention: PromptTextStyle::default()
            .with_color(theme.warning)
            .with_background_color(theme.warning.with_opacity(0.2))
            .with_text_size(theme.body_font_size),
        other_mention: PromptTextStyle::default()
            .with_color(theme.primary)
            .with_background_color(theme.primary.with_opacity(0.2))
            .with_text_size(theme.body_font_size),
    }
}

fn default_incoming(theme: &Theme) -> ResolvedStylePair {
    let ResolvedStylePair { self_mention, other_mention } = default_composer(theme);
    ResolvedStylePair {
        self_mention: self_mention.with_text_appearance(bold()),
        other_mention: other_mention.with_text_appearance(bold()),
    }
}

fn default_outgoing(theme: &Theme) -> ResolvedStylePair {
    ResolvedStylePair {
        self_mention: PromptTextStyle::default()
            .with_color(theme.warning)
            .with_background_color(theme.warning.with_opacity(0.2))
            .with_text_appearance(bold())
            .with_text_size(theme.body_font_size),
        other_mention: PromptTextStyle::default()
            .with_color(theme.text_on_primary)
            .with_background_color(theme.text_on_primary.with_opacity(0.2))
            .with_text_appearance(TextAppearance { font_family: None, font_style: FontStyle::BOLD | FontStyle::UNDERLINE })
            .with_text_size(theme.body_font_size),
    }
}

fn default_conversation_list(theme: &Theme) -> ResolvedStylePair {
    ResolvedStylePair {
        self_mention: PromptTextStyle::default()
            .with_color(theme.warning)
            .with_text_size(theme.caption_font_size),
        other_mention: PromptTextStyle::default()
            .with_color(theme.primary)
            .with_text_size(theme.caption_font_size),
    }
}
