//! Model verification errors

use crate::kind::DefinitionKey;
use thiserror::Error;

/// Structural consistency violations detected by `Model::check`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    /// A definition is stored under a key that does not match its own
    #[error("Definition stored under {stored} reports key {actual}")]
    KeyMismatch {
        /// Key in the container
        stored: DefinitionKey,
        /// Key the definition reports
        actual: DefinitionKey,
    },

    /// A definition still carries the unassigned-id sentinel
    #[error("Definition {key} has an unassigned id")]
    UnassignedId {
        /// Offending key
        key: DefinitionKey,
    },

    /// A reference points at a key with no definition
    #[error("Reference in {holder} targets missing definition {target}")]
    UnresolvedReference {
        /// Definition holding the reference
        holder: DefinitionKey,
        /// Missing target
        target: DefinitionKey,
    },

    /// An enum definition has no entries
    #[error("Enum {key} has no entries")]
    EmptyEnum {
        /// Offending key
        key: DefinitionKey,
    },

    /// Struct fields are not in ascending offset order
    #[error("Struct {key} has a field at offset {offset} out of order")]
    MisorderedField {
        /// Offending struct
        key: DefinitionKey,
        /// Offset of the out-of-order field
        offset: u64,
    },

    /// A struct field lies beyond the struct's declared size
    #[error("Struct {key} (size {size}) has a field at offset {offset} past its end")]
    FieldPastEnd {
        /// Offending struct
        key: DefinitionKey,
        /// Offset of the overflowing field
        offset: u64,
        /// Declared struct size
        size: u64,
    },
}
