//! Structured view over a session's opaque `content` string.
//!
//! The string is an object whose keys are independently-owned sections.
//! Known sections are parsed into typed fields; everything else lives in an
//! `extra` bucket as raw JSON text and is written back exactly as it was read.

use super::comments::Comments;
use super::lifecycle::Lifecycle;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::value::RawValue;
use std::collections::BTreeMap;

pub const COMMENTS_KEY: &str = "comments";
pub const LIFECYCLE_KEY: &str = "lifecycle";

/// A section stored under a fixed key of the content document.
///
/// New features add a type implementing this trait; no other section's code
/// needs to change.
pub trait ContentSection: Serialize + DeserializeOwned {
    const KEY: &'static str;
}

impl ContentSection for Comments {
    const KEY: &'static str = COMMENTS_KEY;
}

impl ContentSection for Lifecycle {
    const KEY: &'static str = LIFECYCLE_KEY;
}

/// What the raw `content` string looked like before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentOrigin {
    /// Empty or whitespace only.
    Empty,
    /// A JSON object.
    Structured,
    /// Anything else: free text from before sections existed, or JSON that
    /// is not an object. Never merged into; a write starts a fresh document.
    Legacy,
}

/// Parsed session content.
#[derive(Debug, Clone, Default)]
pub struct SessionContent {
    pub comments: Option<Comments>,
    pub lifecycle: Option<Lifecycle>,
    /// Keys this client does not model, plus known keys whose value did not
    /// match the expected shape. Invariant: a key is never both typed and in
    /// here.
    extra: BTreeMap<String, Box<RawValue>>,
}

impl PartialEq for SessionContent {
    fn eq(&self, other: &Self) -> bool {
        self.comments == other.comments
            && self.lifecycle == other.lifecycle
            && self.extra.len() == other.extra.len()
            && self
                .extra
                .iter()
                .zip(other.extra.iter())
                .all(|((a_key, a_raw), (b_key, b_raw))| a_key == b_key && a_raw.get() == b_raw.get())
    }
}

impl SessionContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `raw`, discarding it when it is not a JSON object.
    pub fn parse(raw: &str) -> Self {
        Self::parse_with_origin(raw).0
    }

    pub fn parse_with_origin(raw: &str) -> (Self, ContentOrigin) {
        if raw.trim().is_empty() {
            return (Self::default(), ContentOrigin::Empty);
        }

        let entries: BTreeMap<String, Box<RawValue>> = match serde_json::from_str(raw) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("[SessionContent] content is not a JSON object ({}), treating as legacy text", e);
                return (Self::default(), ContentOrigin::Legacy);
            }
        };

        let mut content = Self::default();
        for (key, value) in entries {
            content.insert_raw(key, value);
        }
        (content, ContentOrigin::Structured)
    }

    /// Serializes the document back into the `content` string.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Raw JSON text of a section this client does not model.
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(|raw| raw.get())
    }

    pub fn extra_keys(&self) -> impl Iterator<Item = &str> {
        self.extra.keys().map(String::as_str)
    }

    /// Every top-level key present in the document.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        if self.comments.is_some() {
            keys.push(COMMENTS_KEY);
        }
        if self.lifecycle.is_some() {
            keys.push(LIFECYCLE_KEY);
        }
        keys.extend(self.extra_keys());
        keys
    }

    /// Reads an arbitrary section by type.
    pub fn section<S: ContentSection>(&self) -> Result<Option<S>> {
        match S::KEY {
            COMMENTS_KEY => self.comments.as_ref().map(reencode).transpose(),
            LIFECYCLE_KEY => self.lifecycle.as_ref().map(reencode).transpose(),
            key => self
                .extra
                .get(key)
                .map(|raw| serde_json::from_str(raw.get()).map_err(Into::into))
                .transpose(),
        }
    }

    /// Replaces an arbitrary section by type, leaving every other key alone.
    pub fn set_section<S: ContentSection>(&mut self, value: &S) -> Result<()> {
        let raw = serde_json::value::to_raw_value(value)?;
        self.insert_raw(S::KEY.to_string(), raw);
        Ok(())
    }

    /// Replaces the section stored under `key` with an arbitrary JSON value.
    pub fn set_value(&mut self, key: &str, value: &serde_json::Value) -> Result<()> {
        let raw = serde_json::value::to_raw_value(value)?;
        self.insert_raw(key.to_string(), raw);
        Ok(())
    }

    /// Removes a section entirely.
    pub fn remove(&mut self, key: &str) {
        match key {
            COMMENTS_KEY => self.comments = None,
            LIFECYCLE_KEY => self.lifecycle = None,
            _ => {}
        }
        self.extra.remove(key);
    }

    pub fn set_comments(&mut self, comments: Comments) {
        self.extra.remove(COMMENTS_KEY);
        self.comments = Some(comments);
    }

    pub fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        self.extra.remove(LIFECYCLE_KEY);
        self.lifecycle = Some(lifecycle);
    }

    /// Comments section, or an empty one when absent.
    pub fn comments_or_default(&self) -> Comments {
        self.comments.clone().unwrap_or_default()
    }

    fn insert_raw(&mut self, key: String, value: Box<RawValue>) {
        match key.as_str() {
            COMMENTS_KEY => match serde_json::from_str::<Comments>(value.get()) {
                Ok(comments) => {
                    self.extra.remove(COMMENTS_KEY);
                    self.comments = Some(comments);
                    return;
                }
                Err(e) => {
                    tracing::warn!("[SessionContent] keeping malformed '{}' section verbatim: {}", key, e);
                    self.comments = None;
                }
            },
            LIFECYCLE_KEY => match serde_json::from_str::<Lifecycle>(value.get()) {
                Ok(lifecycle) => {
                    self.extra.remove(LIFECYCLE_KEY);
                    self.lifecycle = Some(lifecycle);
                    return;
                }
                Err(e) => {
                    tracing::warn!("[SessionContent] keeping malformed '{}' section verbatim: {}", key, e);
                    self.lifecycle = None;
                }
            },
            _ => {}
        }
        self.extra.insert(key, value);
    }
}

fn reencode<T: Serialize, S: DeserializeOwned>(value: &T) -> Result<S> {
    Ok(serde_json::from_value(serde_json::to_value(value)?)?)
}

impl Serialize for SessionContent {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        if let Some(comments) = &self.comments {
            map.serialize_entry(COMMENTS_KEY, comments)?;
        }
        if let Some(lifecycle) = &self.lifecycle {
            map.serialize_entry(LIFECYCLE_KEY, lifecycle)?;
        }
        for (key, raw) in &self.extra {
            map.serialize_entry(key, raw)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[test]
    fn test_empty_and_legacy_content() {
        assert_eq!(SessionContent::parse_with_origin("").1, ContentOrigin::Empty);
        assert_eq!(SessionContent::parse_with_origin("   ").1, ContentOrigin::Empty);

        let (content, origin) = SessionContent::parse_with_origin("Meeting notes: order more M3 bolts");
        assert_eq!(origin, ContentOrigin::Legacy);
        assert_eq!(content, SessionContent::default());

        // Valid JSON that is not an object is legacy as well
        assert_eq!(SessionContent::parse_with_origin("[1,2]").1, ContentOrigin::Legacy);
        assert_eq!(SessionContent::parse_with_origin("\"text\"").1, ContentOrigin::Legacy);
    }

    #[test]
    fn test_known_sections_are_typed() {
        let content = SessionContent::parse(
            r#"{"comments":{"b1":["nice","check qty"]},"lifecycle":{"steps":["Design","Build"],"currentStep":1}}"#,
        );
        assert_eq!(
            content.comments.as_ref().unwrap().for_blob("b1"),
            ["nice".to_string(), "check qty".to_string()]
        );
        let lifecycle = content.lifecycle.as_ref().unwrap();
        assert_eq!(lifecycle.steps, vec!["Design", "Build"]);
        assert_eq!(lifecycle.current_step, 1);
        assert_eq!(content.extra_keys().count(), 0);
    }

    #[test]
    fn test_unknown_keys_survive_byte_for_byte() {
        let original = r#"{"comments":{},"documents":{"rev":1.50,"big":12345678901234567890,"note":"café"}}"#;
        let mut content = SessionContent::parse(original);
        content.set_lifecycle(Lifecycle::new(vec!["Prototype".to_string()]));

        let written = content.to_json_string().unwrap();
        assert!(written.contains(r#""documents":{"rev":1.50,"big":12345678901234567890,"note":"café"}"#));
        assert_eq!(
            content.extra("documents"),
            Some(r#"{"rev":1.50,"big":12345678901234567890,"note":"café"}"#)
        );
    }

    #[test]
    fn test_malformed_known_section_is_preserved_until_replaced() {
        let mut content = SessionContent::parse(r#"{"lifecycle":{"steps":"not-a-list"}}"#);
        assert!(content.lifecycle.is_none());
        assert_eq!(content.extra(LIFECYCLE_KEY), Some(r#"{"steps":"not-a-list"}"#));

        let written: serde_json::Value =
            serde_json::from_str(&content.to_json_string().unwrap()).unwrap();
        assert_eq!(written, json!({"lifecycle": {"steps": "not-a-list"}}));

        content.set_lifecycle(Lifecycle::new(vec!["A".into()]));
        assert!(content.extra(LIFECYCLE_KEY).is_none());
        let written: serde_json::Value =
            serde_json::from_str(&content.to_json_string().unwrap()).unwrap();
        assert_eq!(written, json!({"lifecycle": {"steps": ["A"], "currentStep": 0}}));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Documents {
        generated: Vec<String>,
    }

    impl ContentSection for Documents {
        const KEY: &'static str = "documents";
    }

    #[test]
    fn test_generic_section_round_trip() {
        let mut content = SessionContent::parse(r#"{"comments":{"b1":["ok"]}}"#);
        assert!(content.section::<Documents>().unwrap().is_none());

        content
            .set_section(&Documents {
                generated: vec!["cost-estimate.md".into()],
            })
            .unwrap();

        let reparsed = SessionContent::parse(&content.to_json_string().unwrap());
        assert_eq!(
            reparsed.section::<Documents>().unwrap(),
            Some(Documents {
                generated: vec!["cost-estimate.md".into()]
            })
        );
        assert_eq!(reparsed.comments.unwrap().for_blob("b1"), ["ok".to_string()]);
    }

    #[test]
    fn test_generic_access_to_builtin_sections_routes_to_typed_fields() {
        let mut content = SessionContent::new();
        content
            .set_section(&Lifecycle::new(vec!["Design".into()]))
            .unwrap();
        assert!(content.lifecycle.is_some());
        assert!(content.extra(LIFECYCLE_KEY).is_none());
        assert_eq!(content.keys(), vec![LIFECYCLE_KEY]);
    }

    #[test]
    fn test_remove_section() {
        let mut content = SessionContent::parse(r#"{"comments":{"b1":["x"]},"other":true}"#);
        content.remove(COMMENTS_KEY);
        content.remove("other");
        assert_eq!(content.to_json_string().unwrap(), "{}");
    }
}
