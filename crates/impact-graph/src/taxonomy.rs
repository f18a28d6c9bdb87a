//! Entity taxonomy
//!
//! Static knowledge of which relationship kinds connect which entity kinds,
//! and which of them propagate impact.

use crate::types::{EntityKind, RelationshipKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Kind of artifact a change originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Piping and instrumentation diagram (line level)
    #[serde(rename = "P&ID", alias = "PID")]
    PId,
    /// Isometric drawing
    #[serde(rename = "ISO")]
    Iso,
    /// 3D model (reported against the modelled line)
    #[serde(rename = "3D_MODEL")]
    Model3d,
}

impl SourceKind {
    /// Entity kind a change of this source roots at
    #[must_use]
    pub fn root_kind(self) -> EntityKind {
        match self {
            Self::PId | Self::Model3d => EntityKind::Line,
            Self::Iso => EntityKind::Iso,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PId => f.write_str("P&ID"),
            Self::Iso => f.write_str("ISO"),
            Self::Model3d => f.write_str("3D_MODEL"),
        }
    }
}

/// Relationship kinds that propagate impact, in hierarchy order
#[must_use]
pub fn impact_relationships() -> [RelationshipKind; 6] {
    [
        RelationshipKind::HasIso,
        RelationshipKind::FabricatedAs,
        RelationshipKind::HasPart,
        RelationshipKind::Groups,
        RelationshipKind::RequiresMaterial,
        RelationshipKind::OrderedOn,
    ]
}

/// Source and target kind of a relationship, if the taxonomy knows it
#[must_use]
pub fn endpoints(kind: &RelationshipKind) -> Option<(EntityKind, EntityKind)> {
    match kind {
        RelationshipKind::HasIso => Some((EntityKind::Line, EntityKind::Iso)),
        RelationshipKind::FabricatedAs => Some((EntityKind::Iso, EntityKind::Spool)),
        RelationshipKind::HasPart => Some((EntityKind::Iso, EntityKind::Part)),
        RelationshipKind::Groups => Some((EntityKind::Spool, EntityKind::Part)),
        RelationshipKind::RequiresMaterial => Some((EntityKind::Part, EntityKind::Material)),
        RelationshipKind::OrderedOn => Some((EntityKind::Material, EntityKind::PurchaseOrder)),
        RelationshipKind::Other(_) => None,
    }
}

/// True when following this relationship propagates impact
#[inline]
#[must_use]
pub fn is_traversable(kind: &RelationshipKind) -> bool {
    endpoints(kind).is_some()
}

/// Target kind of a relationship, used when the store omitted the node
#[must_use]
pub fn target_kind(kind: &RelationshipKind) -> EntityKind {
    endpoints(kind).map_or_else(EntityKind::unknown, |(_, target)| target)
}

/// Relationship kinds leaving an entity kind
#[must_use]
pub fn outgoing(kind: &EntityKind) -> Vec<RelationshipKind> {
    impact_relationships()
        .into_iter()
        .filter(|rel| endpoints(rel).is_some_and(|(source, _)| &source == kind))
        .collect()
}

/// Every traversable relationship reachable from a root kind
///
/// Unknown root kinds may follow every traversable relationship.
#[must_use]
pub fn allowed_from(root: &EntityKind) -> BTreeSet<RelationshipKind> {
    if !root.is_known() {
        return impact_relationships().into_iter().collect();
    }

    let mut allowed = BTreeSet::new();
    let mut frontier = vec![root.clone()];
    let mut seen = BTreeSet::new();
    while let Some(kind) = frontier.pop() {
        if !seen.insert(kind.clone()) {
            continue;
        }
        for rel in outgoing(&kind) {
            if let Some((_, target)) = endpoints(&rel) {
                frontier.push(target);
            }
            allowed.insert(rel);
        }
    }
    allowed
}

/// Allowed relationship kinds for a change source
#[inline]
#[must_use]
pub fn allowed_for_source(source: SourceKind) -> BTreeSet<RelationshipKind> {
    allowed_from(&source.root_kind())
}
