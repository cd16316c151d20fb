//! Pluggable chat text formatters, with an @mention formatter.
//!
//! A [`formatter::FormatterRegistry`] holds [`formatter::TextFormatter`]s, each
//! keyed by a trigger character. The [`mentions::MentionsFormatter`] looks up
//! users while the composer is typing after `@`, encodes picked mentions as
//! `<@uid:ID>` tokens on send, and renders those tokens back as styled
//! clickable spans in bubbles, the composer and the conversation list.
//!
//! The chat backend is reached only through [`directory::Directory`], via the
//! [`session::ChatSession`] the host creates at login.

pub mod cli;
pub mod config;
pub mod directory;
pub mod error;
pub mod formatter;
pub mod mentions;
pub mod model;
pub mod session;

pub use config::MentionsConfig;
pub use error::{DirectoryError, FormatterError};
pub use mentions::MentionsFormatter;
pub use session::ChatSession;
