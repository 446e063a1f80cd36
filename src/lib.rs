//! # cqcode
//!
//! A bidirectional codec for the CQ-code chat message markup format:
//! plain text interleaved with bracketed function codes like
//! `[CQ:at,qq=123]` carrying typed string parameters.
//!
//! ## Features
//!
//! - Escape/unescape the format's four reserved characters
//! - Parse raw markup into an ordered sequence of typed [`Segment`]s
//! - Compose segments back into the canonical markup string
//! - Merge semantics keeping adjacent plain-text segments collapsed
//!
//! ## Quick Start
//!
//! ```
//! use cqcode::{Message, Segment};
//!
//! // Parse markup into segments
//! let msg = Message::parse("ping[CQ:at,qq=123]pong");
//! assert_eq!(msg.len(), 3);
//! assert_eq!(msg[1], Segment::at(123));
//! assert_eq!(msg.extract_plain_text(), "ping pong");
//!
//! // Build a message and compose it back to markup
//! let msg = Message::from(Segment::text("look: ")) + Segment::image("cat.png");
//! assert_eq!(msg.to_string(), "look: [CQ:image,file=cat.png]");
//! ```
//!
//! ## Working with Messages
//!
//! A [`Message`] is an ordered sequence of [`Segment`]s. Each segment is
//! either a plain-text run or one markup token, represented as a kind
//! tag plus insertion-ordered string parameters:
//!
//! ```
//! use cqcode::{Message, Segment};
//!
//! let mut msg = Message::new();
//! msg.push(Segment::text("weather in "));
//! msg.push(Segment::text("tokyo: "));   // merged into the previous text
//! msg.push(Segment::face(180));
//! assert_eq!(msg.len(), 2);
//! assert_eq!(msg.to_string(), "weather in tokyo: [CQ:face,id=180]");
//! ```
//!
//! Malformed tokens never fail to parse; anything not matching the token
//! grammar degrades to plain text.

pub mod escape;
pub mod message;
pub mod segment;

mod error;

pub use error::{Error, Result};
pub use escape::{escape, unescape};
pub use message::Message;
pub use segment::{Params, Segment, TEXT_KIND};
