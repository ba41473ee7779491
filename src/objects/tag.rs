//! Tag: an annotated reference to another object (§3, §4.1).
//!
//! The teacher has no tag object at all; this is built in its manner
//! (mirroring `Commit`'s line-oriented header/body encoding) to round out
//! the four object kinds the spec requires.

use crate::error::{Result, StoreError};
use crate::identity::Identity;
use crate::objects::object_id::ObjectId;
use crate::objects::ObjectKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    object: ObjectId,
    target_kind: ObjectKind,
    name: String,
    tagger: Identity,
    message: String,
}

impl Tag {
    pub fn new(
        object: ObjectId,
        target_kind: ObjectKind,
        name: impl Into<String>,
        tagger: Identity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            object,
            target_kind,
            name: name.into(),
            tagger,
            message: message.into(),
        }
    }

    pub fn object(&self) -> &ObjectId {
        &self.object
    }

    pub fn target_kind(&self) -> ObjectKind {
        self.target_kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tagger(&self) -> &Identity {
        &self.tagger
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn encode(&self) -> Vec<u8> {
        let lines = vec![
            format!("object {}", self.object),
            format!("type {}", self.target_kind.as_str()),
            format!("tag {}", self.name),
            format!("tagger {}", self.tagger.to_identity_line()),
            String::new(),
            self.message.clone(),
        ];
        lines.join("\n").into_bytes()
    }

    pub fn decode(content: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(content)
            .map_err(|_| StoreError::MalformedObject(None, "non-utf8 tag".into()))?;

        let err = |what: &str| StoreError::MalformedObject(None, format!("tag missing {what}"));

        // See the matching note in `Commit::decode`: split on the header/body
        // blank line and take the message verbatim, instead of rejoining
        // `str::lines()`, so a trailing newline survives the round trip.
        let (header, message) = text
            .split_once("\n\n")
            .ok_or_else(|| err("blank line separating header from message"))?;
        let mut lines = header.lines();

        let object = ObjectId::try_parse(
            lines
                .next()
                .ok_or_else(|| err("object line"))?
                .strip_prefix("object ")
                .ok_or_else(|| err("object line"))?
                .to_string(),
        )?;

        let target_kind: ObjectKind = lines
            .next()
            .ok_or_else(|| err("type line"))?
            .strip_prefix("type ")
            .ok_or_else(|| err("type line"))?
            .parse()?;

        let name = lines
            .next()
            .ok_or_else(|| err("tag line"))?
            .strip_prefix("tag ")
            .ok_or_else(|| err("tag line"))?
            .to_string();

        let tagger = Identity::parse_identity_line(
            lines
                .next()
                .ok_or_else(|| err("tagger line"))?
                .strip_prefix("tagger ")
                .ok_or_else(|| err("tagger line"))?,
        )?;

        Ok(Tag::new(object, target_kind, name, tagger, message.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn target_id() -> ObjectId {
        ObjectId::from_raw20(&[3u8; 20]).unwrap()
    }

    fn tagger() -> Identity {
        Identity {
            name: "tester".to_string(),
            email: "tester@localhost".to_string(),
            timestamp: chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00+00:00").unwrap(),
        }
    }

    #[test]
    fn decode_encode_roundtrips_a_tag() {
        let tag = Tag::new(target_id(), ObjectKind::Commit, "v1", tagger(), "release".to_string());
        let decoded = Tag::decode(&tag.encode()).unwrap();
        assert_eq!(tag, decoded);
    }

    #[test]
    fn decode_preserves_a_trailing_newline_in_the_message() {
        let tag = Tag::new(target_id(), ObjectKind::Commit, "v1", tagger(), "Body\n".to_string());
        let decoded = Tag::decode(&tag.encode()).unwrap();
        assert_eq!(decoded.message(), "Body\n");
    }
}
