//! Definition kinds, keys, and weak by-key references

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind tag of a type definition.
///
/// Together with the numeric id it forms the unique key of a definition,
/// so two definitions may share an id as long as their kinds differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DefinitionKind {
    /// A struct with offset-addressed fields
    Struct,
    /// A union of overlapping fields
    Union,
    /// An enumeration over an underlying integer type
    Enum,
    /// A name alias for another type
    Typedef,
    /// A function type in register/stack assignment form
    RawFunction,
    /// A function type in ABI-named parameter-list form
    CabiFunction,
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DefinitionKind::Struct => "struct",
            DefinitionKind::Union => "union",
            DefinitionKind::Enum => "enum",
            DefinitionKind::Typedef => "typedef",
            DefinitionKind::RawFunction => "raw-function",
            DefinitionKind::CabiFunction => "cabi-function",
        };
        write!(f, "{name}")
    }
}

/// Unique key of a type definition: numeric id plus kind tag.
///
/// Id 0 is the "unassigned" sentinel; `Model::record_new_type` replaces
/// it with a fresh id. Keys order by id first, which matches the
/// declaration order of the owning model.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DefinitionKey {
    /// Numeric id, unique per kind within a model
    pub id: u64,
    /// Kind tag
    pub kind: DefinitionKind,
}

impl DefinitionKey {
    /// Create a key from an id and a kind.
    pub fn new(id: u64, kind: DefinitionKind) -> Self {
        DefinitionKey { id, kind }
    }

    /// Whether the id has been assigned (non-zero).
    pub fn is_assigned(&self) -> bool {
        self.id != 0
    }
}

impl fmt::Display for DefinitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Weak, by-key pointer to a type definition.
///
/// May be empty (no target). Resolution happens against the owning
/// `Model`; a reference becomes dangling if its target is erased without
/// being rewritten first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DefinitionReference {
    target: Option<DefinitionKey>,
}

impl DefinitionReference {
    /// The empty reference.
    pub fn empty() -> Self {
        DefinitionReference { target: None }
    }

    /// A reference to `key`.
    pub fn to(key: DefinitionKey) -> Self {
        DefinitionReference { target: Some(key) }
    }

    /// Whether this reference has no target.
    pub fn is_empty(&self) -> bool {
        self.target.is_none()
    }

    /// The target key, if any.
    pub fn key(&self) -> Option<DefinitionKey> {
        self.target
    }

    /// Point this reference at `key`.
    pub fn set_key(&mut self, key: DefinitionKey) {
        self.target = Some(key);
    }
}

impl fmt::Display for DefinitionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            Some(key) => write!(f, "&{key}"),
            None => write!(f, "&<empty>"),
        }
    }
}
