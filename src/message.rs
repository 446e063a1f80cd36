//! The [`Message`] type: an ordered sequence of segments with parsing,
//! composition, and merge semantics.
//!
//! Parsing scans a raw markup string for tokens matching the wire
//! grammar `[CQ:kind,key=value,...]`; everything between tokens becomes
//! plain-text segments. Composition is the inverse: each segment renders
//! to its canonical form and the results are concatenated with no
//! separators.

use std::fmt;
use std::ops::{Add, Index, IndexMut};

use memchr::memchr;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::escape::unescape;
use crate::segment::{Params, Segment};

/// An ordered sequence of [`Segment`]s representing one chat message.
///
/// Insertion order is rendering order. [`push`](Message::push) and
/// [`extend`](Extend::extend) merge an incoming text segment into a
/// trailing text segment, so messages built through them never hold two
/// adjacent text segments. Positional mutation via [`IndexMut`] can
/// transiently break that invariant; [`reduce`](Message::reduce)
/// restores it.
///
/// ```
/// use cqcode::{Message, Segment};
///
/// let mut msg = Message::parse("hello [CQ:at,qq=123] world");
/// assert_eq!(msg.len(), 3);
/// msg.push(Segment::text("!"));
/// assert_eq!(msg.to_string(), "hello [CQ:at,qq=123] world!");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Segment>", into = "Vec<Segment>")]
pub struct Message {
    segments: Vec<Segment>,
}

impl Message {
    /// Create an empty message.
    pub fn new() -> Self {
        Message::default()
    }

    /// Parse a raw markup string into a message.
    ///
    /// Total: malformed token-like input is never an error, it simply
    /// stays plain text. Token parameter values are unescaped; the
    /// literal content of plain-text spans is kept as-is, preserving
    /// the wire behavior of existing CQ-code implementations (only
    /// token parameters carry escape sequences).
    pub fn parse(input: &str) -> Self {
        let bytes = input.as_bytes();
        let mut message = Message::new();
        let mut text_begin = 0;
        let mut search_from = 0;

        while let Some(offset) = memchr(b'[', &bytes[search_from..]) {
            let start = search_from + offset;
            match match_token(input, start) {
                Some((segment, end)) => {
                    if start > text_begin {
                        message.push(Segment::text(&input[text_begin..start]));
                    }
                    message.push(segment);
                    text_begin = end;
                    search_from = end;
                }
                // Not a token; this '[' is ordinary text.
                None => search_from = start + 1,
            }
        }

        if text_begin < input.len() {
            message.push(Segment::text(&input[text_begin..]));
        }
        message
    }

    /// Normalize an untyped interchange value into a message.
    ///
    /// Recognized shapes: a markup string, a single segment record, or a
    /// sequence of segment records. Anything else fails with
    /// [`Error::InvalidMessage`].
    pub fn from_value(value: &Value) -> Result<Self> {
        let mut message = Message::new();
        message.try_extend(value)?;
        Ok(message)
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the message holds no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The segments in rendering order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Segment> {
        self.segments.iter_mut()
    }

    /// Append a segment, merging text into a trailing text segment.
    ///
    /// If both `segment` and the current last element are plain text,
    /// their payloads are concatenated in place and no new element is
    /// added.
    pub fn push(&mut self, segment: Segment) {
        if let Some(payload) = segment.text_payload()
            && let Some(last) = self.segments.last_mut()
            && last.is_text()
        {
            last.append_text(payload);
            return;
        }
        self.segments.push(segment);
    }

    /// Parse `input` and append each resulting segment via
    /// [`push`](Message::push).
    pub fn extend_str(&mut self, input: &str) {
        for segment in Message::parse(input) {
            self.push(segment);
        }
    }

    /// Extend from an untyped interchange value (same shapes as
    /// [`from_value`](Message::from_value)).
    ///
    /// Validate-then-apply: on failure the message is left untouched.
    pub fn try_extend(&mut self, value: &Value) -> Result<()> {
        for segment in normalize(value)? {
            self.push(segment);
        }
        Ok(())
    }

    /// Merge any adjacent plain-text segments in a single forward pass.
    ///
    /// Messages built exclusively through [`push`](Message::push) never
    /// need this; positional replacement via [`IndexMut`] can leave
    /// adjacent text segments behind. O(n) and idempotent.
    pub fn reduce(&mut self) {
        let segments = std::mem::take(&mut self.segments);
        for segment in segments {
            self.push(segment);
        }
    }

    /// Join the payloads of plain-text segments with a single space
    /// between non-empty pieces. Non-text segments contribute nothing.
    ///
    /// Note that adjacent text segments count as separate pieces; call
    /// [`reduce`](Message::reduce) first to join them without a space.
    pub fn extract_plain_text(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            if let Some(payload) = segment.text_payload()
                && !payload.is_empty()
            {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(payload);
            }
        }
        out
    }
}

/// Composition: each segment's canonical rendering, concatenated with no
/// separators.
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<&str> for Message {
    fn from(input: &str) -> Self {
        Message::parse(input)
    }
}

impl From<String> for Message {
    fn from(input: String) -> Self {
        Message::parse(&input)
    }
}

impl From<Segment> for Message {
    fn from(segment: Segment) -> Self {
        let mut message = Message::new();
        message.push(segment);
        message
    }
}

/// Builds through [`push`](Message::push), so adjacent text merges.
impl From<Vec<Segment>> for Message {
    fn from(segments: Vec<Segment>) -> Self {
        segments.into_iter().collect()
    }
}

impl From<Message> for Vec<Segment> {
    fn from(message: Message) -> Self {
        message.segments
    }
}

impl FromIterator<Segment> for Message {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        let mut message = Message::new();
        message.extend(iter);
        message
    }
}

impl Extend<Segment> for Message {
    fn extend<I: IntoIterator<Item = Segment>>(&mut self, iter: I) {
        for segment in iter {
            self.push(segment);
        }
    }
}

impl IntoIterator for Message {
    type Item = Segment;
    type IntoIter = std::vec::IntoIter<Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.into_iter()
    }
}

impl<'a> IntoIterator for &'a Message {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

impl Index<usize> for Message {
    type Output = Segment;

    fn index(&self, index: usize) -> &Segment {
        &self.segments[index]
    }
}

impl IndexMut<usize> for Message {
    fn index_mut(&mut self, index: usize) -> &mut Segment {
        &mut self.segments[index]
    }
}

/// Concatenation. The owned forms consume the left operand; the borrowed
/// form copies it. Neither observes in-place mutation of an operand,
/// unlike [`push`](Message::push)/[`extend`](Extend::extend) which
/// mutate the receiver.
impl Add for Message {
    type Output = Message;

    fn add(mut self, rhs: Message) -> Message {
        self.extend(rhs);
        self
    }
}

impl Add<Segment> for Message {
    type Output = Message;

    fn add(mut self, rhs: Segment) -> Message {
        self.push(rhs);
        self
    }
}

impl Add<&str> for Message {
    type Output = Message;

    fn add(mut self, rhs: &str) -> Message {
        self.extend_str(rhs);
        self
    }
}

impl Add for &Message {
    type Output = Message;

    fn add(self, rhs: &Message) -> Message {
        let mut out = self.clone();
        out.extend(rhs.iter().cloned());
        out
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.')
}

/// Try to match one token of the wire grammar
/// `\[CQ:[A-Za-z0-9_.-]+(,[A-Za-z0-9_.-]+=[^,\]]*)*,?\]` starting at
/// byte offset `start` (which holds a `[`). Returns the segment and the
/// offset one past the closing bracket, or `None` if the grammar does
/// not match here.
fn match_token(input: &str, start: usize) -> Option<(Segment, usize)> {
    let bytes = &input.as_bytes()[start..];
    if !bytes.starts_with(b"[CQ:") {
        return None;
    }

    let mut i = 4;
    let kind_start = i;
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }
    if i == kind_start {
        return None;
    }
    let kind = input[start + kind_start..start + i].to_string();

    let mut params = Params::new();
    loop {
        match *bytes.get(i)? {
            b']' => return Some((Segment::from_parts(kind, params), start + i + 1)),
            b',' => {
                i += 1;
                // A single trailing comma before ']' is allowed.
                if bytes.get(i) == Some(&b']') {
                    continue;
                }
                let key_start = i;
                while i < bytes.len() && is_name_byte(bytes[i]) {
                    i += 1;
                }
                if i == key_start || bytes.get(i) != Some(&b'=') {
                    return None;
                }
                let key = input[start + key_start..start + i].to_string();
                i += 1;
                let value_start = i;
                while i < bytes.len() && bytes[i] != b',' && bytes[i] != b']' {
                    i += 1;
                }
                let value = &input[start + value_start..start + i];
                // Keys are never escaped on the wire; values are.
                params.insert(key, unescape(value).into_owned());
            }
            _ => return None,
        }
    }
}

/// Discriminate the shape of an untyped value and stage it as segments.
/// Returns everything or nothing, so callers can apply without risking
/// partial mutation.
fn normalize(value: &Value) -> Result<Vec<Segment>> {
    match value {
        Value::String(s) => Ok(Message::parse(s).segments),
        Value::Object(_) => {
            let segment =
                Segment::from_value(value).map_err(|e| Error::InvalidMessage(e.to_string()))?;
            Ok(vec![segment])
        }
        Value::Array(items) => items
            .iter()
            .map(|item| {
                Segment::from_value(item).map_err(|e| Error::InvalidMessage(e.to_string()))
            })
            .collect(),
        other => Err(Error::InvalidMessage(format!(
            "expected a string, object, or array, got {other}"
        ))),
    }
}
