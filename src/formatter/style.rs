//! Text styles carried by spans, and the theme palette they are resolved from.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// An RGBA color, serialized as `#RRGGBB` or `#RRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xFF, 0xFF, 0xFF);
    pub const BLACK: Color = Color::rgb(0x00, 0x00, 0x00);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    /// Parses `#RRGGBB` or `#RRGGBBAA` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self { r: channel(0)?, g: channel(2)?, b: channel(4)?, a: channel(6)? }),
            _ => None,
        }
    }

    /// Returns this color with its alpha channel scaled to `opacity` (0.0..=1.0).
    pub fn with_opacity(self, opacity: f32) -> Self {
        let opacity = opacity.clamp(0.0, 1.0);
        Self { a: (f32::from(self.a) * opacity).round() as u8, ..self }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 0xFF {
            write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value).ok_or_else(|| format!("invalid color {value:?}"))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FontStyle: u8 {
        const BOLD      = 0b0001;
        const ITALIC    = 0b0010;
        const UNDERLINE = 0b0100;
    }
}

/// A font face plus style flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextAppearance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default)]
    pub font_style: FontStyle,
}

/// The resolved look of a mention span.
///
/// Every field is optional: `None` means "inherit from the surrounding text".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptTextStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_appearance: Option<TextAppearance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_size: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Color>,
}

impl PromptTextStyle {
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_background_color(mut self, color: Color) -> Self {
        self.background_color = Some(color);
        self
    }

    pub fn with_text_appearance(mut self, appearance: TextAppearance) -> Self {
        self.text_appearance = Some(appearance);
        self
    }

    pub fn with_text_size(mut self, size: f32) -> Self {
        self.text_size = Some(size);
        self
    }

    /// Fills every unset field of `self` from `fallback`.
    pub fn or(self, fallback: &PromptTextStyle) -> PromptTextStyle {
        PromptTextStyle {
            text_appearance: self.text_appearance.or_else(|| fallback.text_appearance.clone()),
            text_size: self.text_size.or(fallback.text_size),
            color: self.color.or(fallback.color),
            background_color: self.background_color.or(fallback.background_color),
        }
    }
}

/// The host palette that default mention styles are derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub primary: Color,
    pub text_primary: Color,
    pub text_on_primary: Color,
    /// Used to highlight mentions of the logged-in user.
    pub warning: Color,
    pub body_font_size: f32,
    pub caption_font_size: f32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color::rgb(0x68, 0x52, 0xD6),
            text_primary: Color::rgb(0x14, 0x14, 0x14),
            text_on_primary: Color::WHITE,
            warning: Color::rgb(0xFF, 0xAB, 0x00),
            body_font_size: 14.0,
            caption_font_size: 12.0,
        }
    }
}
