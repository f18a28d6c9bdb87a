//! Isometric drawing identifiers
//!
//! Drawing ids have the form `<iso number>.<sheet>`, e.g.
//! `TS002-662-LPPL-2014.SHT1`. Single-sheet drawings omit the suffix.

use crate::types::EntityId;
use serde::{Deserialize, Serialize};

/// Parsed isometric drawing id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IsoDrawingId {
    /// Full id as stored
    pub id: EntityId,
    /// Drawing number (text before the first `.`)
    pub iso_number: String,
    /// Sheet (text between the first and second `.`)
    pub sheet_number: Option<String>,
}

impl IsoDrawingId {
    /// Split an id into drawing number and sheet
    #[must_use]
    pub fn parse(id: &EntityId) -> Self {
        let mut parts = id.as_str().split('.');
        let iso_number = parts.next().unwrap_or_default().to_string();
        let sheet_number = parts.next().map(str::to_string);
        Self {
            id: id.clone(),
            iso_number,
            sheet_number,
        }
    }

    /// True when the drawing has more than one sheet
    #[inline]
    #[must_use]
    pub fn is_multi_sheet(&self) -> bool {
        self.sheet_number.is_some()
    }
}

impl From<&EntityId> for IsoDrawingId {
    fn from(id: &EntityId) -> Self {
        Self::parse(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sheet_suffix() {
        let iso = IsoDrawingId::parse(&"TS002-662-LPPL-2014.SHT1".into());
        assert_eq!(iso.iso_number, "TS002-662-LPPL-2014");
        assert_eq!(iso.sheet_number.as_deref(), Some("SHT1"));
        assert!(iso.is_multi_sheet());
    }

    #[test]
    fn id_without_sheet() {
        let iso = IsoDrawingId::parse(&"TS002-662-LPPL-2014".into());
        assert_eq!(iso.iso_number, "TS002-662-LPPL-2014");
        assert_eq!(iso.sheet_number, None);
    }

    #[test]
    fn extra_segments_are_ignored() {
        let iso = IsoDrawingId::parse(&"A.SHT2.REV3".into());
        assert_eq!(iso.iso_number, "A");
        assert_eq!(iso.sheet_number.as_deref(), Some("SHT2"));
    }
}
