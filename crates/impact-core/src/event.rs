//! Change events
//!
//! A [`ChangeEvent`] identifies one triggering modification. It is created
//! by the caller, validated once on entry and never mutated afterwards.

use crate::error::ValidationError;
use chrono::{DateTime, NaiveDate, Utc};
use impact_graph::{EntityId, SourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Highest maturity level on the project scale
pub const MAX_MATURITY: u8 = 10;

/// Kind of engineering change
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    /// Material or pipe specification changed
    SpecChange,
    /// Routing or geometry changed
    GeometryChange,
    /// Linked entities disagree on maturity
    MaturityMismatch,
    /// Tag renamed or renumbered
    TagModification,
}

impl ChangeKind {
    /// Every change kind
    pub const ALL: [Self; 4] = [
        Self::SpecChange,
        Self::GeometryChange,
        Self::MaturityMismatch,
        Self::TagModification,
    ];

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SpecChange => "SPEC_CHANGE",
            Self::GeometryChange => "GEOMETRY_CHANGE",
            Self::MaturityMismatch => "MATURITY_MISMATCH",
            Self::TagModification => "TAG_MODIFICATION",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One changed attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedAttribute {
    /// Attribute name
    pub name: String,
    /// Value before the change
    pub old_value: serde_json::Value,
    /// Value after the change
    pub new_value: serde_json::Value,
}

impl ChangedAttribute {
    /// Create attribute change
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        old_value: impl Into<serde_json::Value>,
        new_value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            name: name.into(),
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }
}

/// Triggering modification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Caller-supplied correlation and idempotency key
    pub event_id: String,
    /// Artifact the change originates from
    pub source_kind: SourceKind,
    /// Changed entity
    pub source_entity_id: EntityId,
    /// Kind of change
    pub change_kind: ChangeKind,
    /// Attributes with old and new values
    #[serde(default)]
    pub changed_attributes: Vec<ChangedAttribute>,
    /// When the change happened
    pub timestamp: DateTime<Utc>,
    /// Maturity of the changed entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_maturity: Option<u8>,
    /// Maturity of the linked entity it disagrees with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_maturity: Option<u8>,
    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// User or system that raised the change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiated_by: Option<String>,
}

impl ChangeEvent {
    /// Create event without attributes
    #[must_use]
    pub fn new(
        event_id: impl Into<String>,
        source_kind: SourceKind,
        source_entity_id: impl Into<EntityId>,
        change_kind: ChangeKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            source_kind,
            source_entity_id: source_entity_id.into(),
            change_kind,
            changed_attributes: Vec::new(),
            timestamp,
            source_maturity: None,
            related_maturity: None,
            description: None,
            initiated_by: None,
        }
    }

    /// With a changed attribute
    #[must_use]
    pub fn with_attribute(mut self, attribute: ChangedAttribute) -> Self {
        self.changed_attributes.push(attribute);
        self
    }

    /// With maturity levels
    #[inline]
    #[must_use]
    pub fn with_maturity(mut self, source: u8, related: u8) -> Self {
        self.source_maturity = Some(source);
        self.related_maturity = Some(related);
        self
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Parse from JSON
    ///
    /// # Errors
    /// Malformed JSON.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reject malformed events before anything reaches the graph store
    ///
    /// # Errors
    /// The first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.event_id.trim().is_empty() {
            return Err(ValidationError::BlankEventId);
        }
        if self.source_entity_id.is_blank() {
            return Err(ValidationError::BlankEntityId);
        }

        let mut names = BTreeSet::new();
        for attr in &self.changed_attributes {
            let name = attr.name.trim();
            if name.is_empty() {
                return Err(ValidationError::BlankAttributeName);
            }
            if !names.insert(name) {
                return Err(ValidationError::DuplicateAttribute(name.to_string()));
            }
            if attr.old_value == attr.new_value {
                return Err(ValidationError::UnchangedAttribute(name.to_string()));
            }
        }

        for level in [self.source_maturity, self.related_maturity].into_iter().flatten() {
            if level > MAX_MATURITY {
                return Err(ValidationError::MaturityOutOfRange {
                    level,
                    max: MAX_MATURITY,
                });
            }
        }
        if self.change_kind == ChangeKind::MaturityMismatch
            && (self.source_maturity.is_none() || self.related_maturity.is_none())
        {
            return Err(ValidationError::MissingMaturity);
        }
        Ok(())
    }

    /// Maturity gap counted for scoring (maturity mismatches only)
    #[must_use]
    pub fn maturity_gap(&self) -> u32 {
        match (self.change_kind, self.source_maturity, self.related_maturity) {
            (ChangeKind::MaturityMismatch, Some(src), Some(rel)) => u32::from(src.abs_diff(rel)),
            _ => 0,
        }
    }

    /// Date used as baseline when an entity has no planned completion
    #[inline]
    #[must_use]
    pub fn baseline_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(kind: ChangeKind) -> ChangeEvent {
        ChangeEvent::new(
            "EVT-1",
            SourceKind::Iso,
            "TS002-662-LPPL-2014.SHT1",
            kind,
            Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap(),
        )
    }

    #[test]
    fn parses_wire_shape() {
        let json = r#"{
            "event_id": "EVT-9",
            "source_kind": "P&ID",
            "source_entity_id": "662-LPPL-2014",
            "change_kind": "SPEC_CHANGE",
            "changed_attributes": [{"name": "schedule", "old_value": "Sch 40", "new_value": "Sch 80"}],
            "timestamp": "2025-01-06T09:00:00Z"
        }"#;
        let event = ChangeEvent::from_json_str(json).unwrap();
        assert_eq!(event.source_kind, SourceKind::PId);
        assert_eq!(event.change_kind, ChangeKind::SpecChange);
        assert!(event.validate().is_ok());
        assert_eq!(event.baseline_date(), NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
    }

    #[test]
    fn blank_ids_are_rejected() {
        let mut e = event(ChangeKind::SpecChange);
        e.event_id = " ".into();
        assert_eq!(e.validate(), Err(ValidationError::BlankEventId));
        let mut e = event(ChangeKind::SpecChange);
        e.source_entity_id = EntityId::new("");
        assert_eq!(e.validate(), Err(ValidationError::BlankEntityId));
    }

    #[test]
    fn attributes_must_change_and_be_unique() {
        let e = event(ChangeKind::SpecChange).with_attribute(ChangedAttribute::new("od", 42, 42));
        assert_eq!(e.validate(), Err(ValidationError::UnchangedAttribute("od".into())));
        let e = event(ChangeKind::SpecChange)
            .with_attribute(ChangedAttribute::new("od", 40, 42))
            .with_attribute(ChangedAttribute::new("od", 42, 44));
        assert_eq!(e.validate(), Err(ValidationError::DuplicateAttribute("od".into())));
    }

    #[test]
    fn maturity_gap_only_for_mismatch() {
        assert_eq!(event(ChangeKind::MaturityMismatch).with_maturity(2, 5).maturity_gap(), 3);
        assert_eq!(event(ChangeKind::SpecChange).with_maturity(2, 5).maturity_gap(), 0);
        assert_eq!(
            event(ChangeKind::MaturityMismatch).validate(),
            Err(ValidationError::MissingMaturity)
        );
        assert!(matches!(
            event(ChangeKind::MaturityMismatch).with_maturity(2, 11).validate(),
            Err(ValidationError::MaturityOutOfRange { level: 11, .. })
        ));
    }
}
