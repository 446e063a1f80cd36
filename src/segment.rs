//! The [`Segment`] type: one unit of message content.
//!
//! A segment is either a run of plain text or one markup token such as
//! `[CQ:at,qq=123]`. Both are represented uniformly as a kind tag plus an
//! insertion-ordered mapping of string parameters; plain text uses the
//! kind `"text"` with its content under the `"text"` parameter.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::escape::escape;

/// The kind tag of plain-text segments.
pub const TEXT_KIND: &str = "text";

/// The parameter key holding a text segment's payload.
const TEXT_KEY: &str = "text";

/// Segment parameters: string keys to string values, insertion order
/// preserved for deterministic rendering.
pub type Params = IndexMap<String, String>;

/// One unit of message content: a kind tag plus string parameters.
///
/// The two fields form a closed record. `kind` is never empty and
/// parameter values are always strings; non-string domain values are
/// stringified at construction time (booleans as `"0"`/`"1"`, numbers in
/// decimal). Rendering with [`Display`](fmt::Display) produces the
/// canonical wire form:
///
/// ```
/// use cqcode::Segment;
///
/// assert_eq!(Segment::at(123).to_string(), "[CQ:at,qq=123]");
/// assert_eq!(Segment::text("a[b]").to_string(), "a&#91;b&#93;");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSegment")]
pub struct Segment {
    kind: String,
    params: Params,
}

/// Interchange mirror of [`Segment`]: exactly two fields, extra fields
/// rejected, validation applied via `TryFrom` before a `Segment` exists.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSegment {
    kind: String,
    #[serde(default)]
    params: Params,
}

impl TryFrom<RawSegment> for Segment {
    type Error = Error;

    fn try_from(raw: RawSegment) -> Result<Self> {
        Segment::new(raw.kind, raw.params)
    }
}

impl Segment {
    /// Create a segment from an explicit kind and parameter map.
    ///
    /// Fails with [`Error::InvalidSegment`] if `kind` is empty.
    pub fn new(kind: impl Into<String>, params: Params) -> Result<Self> {
        let kind = kind.into();
        if kind.is_empty() {
            return Err(Error::InvalidSegment(
                "the kind field cannot be empty".into(),
            ));
        }
        Ok(Segment { kind, params })
    }

    /// Create a segment from an untyped interchange value.
    ///
    /// The value must be an object with a non-empty string `kind` field
    /// and an optional `params` object; any other field fails with
    /// [`Error::InvalidFieldAccess`]. Parameter values may be strings,
    /// booleans, or numbers and are stringified per the fixed convention.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            return Err(Error::InvalidSegment(format!(
                "expected an object, got {value}"
            )));
        };

        let mut kind = None;
        let mut params = Params::new();
        for (key, field) in object {
            match key.as_str() {
                "kind" => match field.as_str() {
                    Some(s) if !s.is_empty() => kind = Some(s.to_string()),
                    _ => {
                        return Err(Error::InvalidSegment(
                            "the kind field cannot be empty".into(),
                        ));
                    }
                },
                "params" => {
                    let Some(map) = field.as_object() else {
                        return Err(Error::InvalidSegment(format!(
                            "params must be an object, got {field}"
                        )));
                    };
                    for (k, v) in map {
                        params.insert(k.clone(), stringify_param(k, v)?);
                    }
                }
                other => {
                    return Err(Error::InvalidFieldAccess(format!(
                        "the field \"{other}\" is not allowed"
                    )));
                }
            }
        }

        match kind {
            Some(kind) => Ok(Segment { kind, params }),
            None => Err(Error::InvalidSegment("missing kind field".into())),
        }
    }

    /// Construct without validation. Callers guarantee `kind` is
    /// non-empty; the parser's token grammar already enforces this.
    pub(crate) fn from_parts(kind: String, params: Params) -> Self {
        debug_assert!(!kind.is_empty());
        Segment { kind, params }
    }

    /// The segment's kind tag, e.g. `"text"` or `"image"`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The segment's parameters, in insertion order.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Whether this is a plain-text segment.
    pub fn is_text(&self) -> bool {
        self.kind == TEXT_KIND
    }

    /// The text payload of a plain-text segment, or `None` for any other
    /// kind.
    pub fn text_payload(&self) -> Option<&str> {
        if self.is_text() {
            Some(self.params.get(TEXT_KEY).map_or("", String::as_str))
        } else {
            None
        }
    }

    /// Concatenate more text onto a text segment's payload. Used by the
    /// message merge logic; callers guarantee `self.is_text()`.
    pub(crate) fn append_text(&mut self, more: &str) {
        self.params
            .entry(TEXT_KEY.to_string())
            .or_default()
            .push_str(more);
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(payload) = self.text_payload() {
            // Commas are not a delimiter inside top-level text.
            return f.write_str(&escape(payload, false));
        }

        write!(f, "[CQ:{}", self.kind)?;
        for (key, value) in &self.params {
            write!(f, ",{key}={}", escape(value, true))?;
        }
        f.write_str("]")
    }
}

/// Stringify an interchange parameter value: strings pass through,
/// booleans become `"0"`/`"1"`, numbers render in decimal.
fn stringify_param(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(flag(*b)),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(Error::InvalidSegment(format!(
            "param \"{key}\" must be a string, boolean, or number, got {other}"
        ))),
    }
}

fn flag(b: bool) -> String {
    if b { "1" } else { "0" }.to_string()
}

fn params_from<const N: usize>(pairs: [(&str, String); N]) -> Params {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Typed builders for the standard segment kinds. Thin factories: each
/// fixes the kind and the parameter shape, stringifying non-string
/// inputs per the crate convention.
impl Segment {
    /// A plain-text segment.
    pub fn text(text: impl Into<String>) -> Self {
        Segment {
            kind: TEXT_KIND.to_string(),
            params: params_from([(TEXT_KEY, text.into())]),
        }
    }

    /// A legacy emoji by codepoint id.
    pub fn emoji(id: i64) -> Self {
        Segment {
            kind: "emoji".to_string(),
            params: params_from([("id", id.to_string())]),
        }
    }

    /// A QQ face by id.
    pub fn face(id: i64) -> Self {
        Segment {
            kind: "face".to_string(),
            params: params_from([("id", id.to_string())]),
        }
    }

    /// An inline image.
    pub fn image(file: impl Into<String>) -> Self {
        Segment {
            kind: "image".to_string(),
            params: params_from([("file", file.into())]),
        }
    }

    /// A voice clip. `magic` requests voice-change playback.
    pub fn record(file: impl Into<String>, magic: bool) -> Self {
        Segment {
            kind: "record".to_string(),
            params: params_from([("file", file.into()), ("magic", flag(magic))]),
        }
    }

    /// An at-mention of a user.
    pub fn at(user_id: i64) -> Self {
        Segment {
            kind: "at".to_string(),
            params: params_from([("qq", user_id.to_string())]),
        }
    }

    /// A rock-paper-scissors throw.
    pub fn rps() -> Self {
        Segment {
            kind: "rps".to_string(),
            params: Params::new(),
        }
    }

    /// A dice roll.
    pub fn dice() -> Self {
        Segment {
            kind: "dice".to_string(),
            params: Params::new(),
        }
    }

    /// A window-shake (poke).
    pub fn shake() -> Self {
        Segment {
            kind: "shake".to_string(),
            params: Params::new(),
        }
    }

    /// Send anonymously. `ignore_failure` falls back to a normal send
    /// when anonymity is unavailable.
    pub fn anonymous(ignore_failure: bool) -> Self {
        Segment {
            kind: "anonymous".to_string(),
            params: params_from([("ignore", flag(ignore_failure))]),
        }
    }

    /// A link share card.
    pub fn share(
        url: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Segment {
            kind: "share".to_string(),
            params: params_from([
                ("url", url.into()),
                ("title", title.into()),
                ("content", content.into()),
                ("image", image_url.into()),
            ]),
        }
    }

    /// A user contact card.
    pub fn contact_user(id: i64) -> Self {
        Segment {
            kind: "contact".to_string(),
            params: params_from([("type", "qq".to_string()), ("id", id.to_string())]),
        }
    }

    /// A group contact card.
    pub fn contact_group(id: i64) -> Self {
        Segment {
            kind: "contact".to_string(),
            params: params_from([("type", "group".to_string()), ("id", id.to_string())]),
        }
    }

    /// A map location.
    pub fn location(
        latitude: f64,
        longitude: f64,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Segment {
            kind: "location".to_string(),
            params: params_from([
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("title", title.into()),
                ("content", content.into()),
            ]),
        }
    }

    /// A music share from a known provider (`"qq"`, `"163"`, ...).
    pub fn music(provider: impl Into<String>, id: i64) -> Self {
        Segment {
            kind: "music".to_string(),
            params: params_from([("type", provider.into()), ("id", id.to_string())]),
        }
    }

    /// A custom music share with explicit URLs.
    pub fn music_custom(
        url: impl Into<String>,
        audio_url: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Segment {
            kind: "music".to_string(),
            params: params_from([
                ("type", "custom".to_string()),
                ("url", url.into()),
                ("audio", audio_url.into()),
                ("title", title.into()),
                ("content", content.into()),
                ("image", image_url.into()),
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_rejects_empty_kind() {
        assert!(matches!(
            Segment::new("", Params::new()),
            Err(Error::InvalidSegment(_))
        ));
        assert!(Segment::new("at", Params::new()).is_ok());
    }

    #[test]
    fn test_display_text_escapes_without_comma() {
        assert_eq!(Segment::text("a,b").to_string(), "a,b");
        assert_eq!(Segment::text("a[b]&c").to_string(), "a&#91;b&#93;&amp;c");
    }

    #[test]
    fn test_display_token_with_params() {
        assert_eq!(Segment::at(123).to_string(), "[CQ:at,qq=123]");
        assert_eq!(
            Segment::record("x.amr", true).to_string(),
            "[CQ:record,file=x.amr,magic=1]"
        );
    }

    #[test]
    fn test_display_token_without_params() {
        assert_eq!(Segment::rps().to_string(), "[CQ:rps]");
        assert_eq!(Segment::dice().to_string(), "[CQ:dice]");
    }

    #[test]
    fn test_display_escapes_param_values_with_comma() {
        let seg = Segment::share("http://x", "a,b", "", "");
        assert!(seg.to_string().contains("title=a&#44;b"));
    }

    #[test]
    fn test_params_render_in_insertion_order() {
        let seg = Segment::location(1.5, 2.5, "t", "c");
        assert_eq!(
            seg.to_string(),
            "[CQ:location,lat=1.5,lon=2.5,title=t,content=c]"
        );
    }

    #[test]
    fn test_builder_stringification() {
        assert_eq!(Segment::record("f", false).params()["magic"], "0");
        assert_eq!(Segment::anonymous(true).params()["ignore"], "1");
        assert_eq!(Segment::contact_group(42).params()["id"], "42");
    }

    #[test]
    fn test_from_value_valid() {
        let seg =
            Segment::from_value(&json!({"kind": "at", "params": {"qq": "123"}})).unwrap();
        assert_eq!(seg.kind(), "at");
        assert_eq!(seg.params()["qq"], "123");
    }

    #[test]
    fn test_from_value_stringifies_scalars() {
        let seg = Segment::from_value(
            &json!({"kind": "record", "params": {"file": "f", "magic": true, "n": 7}}),
        )
        .unwrap();
        assert_eq!(seg.params()["magic"], "1");
        assert_eq!(seg.params()["n"], "7");
    }

    #[test]
    fn test_from_value_missing_or_empty_kind() {
        assert!(matches!(
            Segment::from_value(&json!({"params": {}})),
            Err(Error::InvalidSegment(_))
        ));
        assert!(matches!(
            Segment::from_value(&json!({"kind": ""})),
            Err(Error::InvalidSegment(_))
        ));
    }

    #[test]
    fn test_from_value_rejects_unknown_fields() {
        assert!(matches!(
            Segment::from_value(&json!({"kind": "at", "extra": 1})),
            Err(Error::InvalidFieldAccess(_))
        ));
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        assert!(matches!(
            Segment::from_value(&json!("at")),
            Err(Error::InvalidSegment(_))
        ));
    }

    #[test]
    fn test_serde_round_trip() {
        let seg = Segment::at(123);
        let encoded = serde_json::to_value(&seg).unwrap();
        assert_eq!(encoded, json!({"kind": "at", "params": {"qq": "123"}}));
        let decoded: Segment = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, seg);
    }

    #[test]
    fn test_deserialize_validates() {
        let err = serde_json::from_value::<Segment>(json!({"kind": ""}));
        assert!(err.is_err());
        let err = serde_json::from_value::<Segment>(json!({"kind": "at", "bogus": 1}));
        assert!(err.is_err());
    }
}
