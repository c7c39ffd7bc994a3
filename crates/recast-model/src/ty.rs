//! Anonymous type expressions
//!
//! A `Type` is the value-level type used by struct fields, function
//! parameters, return values, and pointees. Named definitions are not
//! embedded; they are mentioned through weak `DefinitionReference`s.

use crate::kind::{DefinitionKey, DefinitionReference};
use crate::model::Model;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a primitive scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    /// Unsigned integer
    Unsigned,
    /// Signed integer
    Signed,
    /// IEEE 754 floating point
    Float,
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveKind::Unsigned => write!(f, "uint"),
            PrimitiveKind::Signed => write!(f, "int"),
            PrimitiveKind::Float => write!(f, "float"),
        }
    }
}

/// A type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// The void type (no value)
    Void,
    /// A primitive scalar of the given kind and byte size
    Primitive {
        /// Scalar kind
        kind: PrimitiveKind,
        /// Size in bytes
        size: u64,
    },
    /// A pointer to another type
    Pointer {
        /// Pointee type
        pointee: Box<Type>,
        /// Pointer size in bytes
        size: u64,
    },
    /// A fixed-length array
    Array {
        /// Element type
        element: Box<Type>,
        /// Number of elements
        count: u64,
    },
    /// A reference to a named definition in the owning model
    Defined(DefinitionReference),
}

impl Type {
    /// Shorthand for an unsigned integer of `size` bytes.
    pub fn unsigned(size: u64) -> Self {
        Type::Primitive { kind: PrimitiveKind::Unsigned, size }
    }

    /// Shorthand for a signed integer of `size` bytes.
    pub fn signed(size: u64) -> Self {
        Type::Primitive { kind: PrimitiveKind::Signed, size }
    }

    /// Shorthand for a float of `size` bytes.
    pub fn float(size: u64) -> Self {
        Type::Primitive { kind: PrimitiveKind::Float, size }
    }

    /// Shorthand for a pointer to `pointee` with the given size.
    pub fn pointer(pointee: Type, size: u64) -> Self {
        Type::Pointer { pointee: Box::new(pointee), size }
    }

    /// Shorthand for a reference to a defined type.
    pub fn defined(key: DefinitionKey) -> Self {
        Type::Defined(DefinitionReference::to(key))
    }

    /// Whether this expression is (or wraps by array) a defined type,
    /// i.e. a potential aggregate for ABI classification purposes.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Type::Defined(_) | Type::Array { .. })
    }

    /// Every definition key this expression mentions, in a stable
    /// left-to-right order.
    pub fn referenced_keys(&self) -> Vec<DefinitionKey> {
        let mut keys = Vec::new();
        self.visit_references(&mut |reference| {
            if let Some(key) = reference.key() {
                keys.push(key);
            }
        });
        keys
    }

    /// Visit every `DefinitionReference` in this expression.
    pub fn visit_references(&self, f: &mut dyn FnMut(&DefinitionReference)) {
        match self {
            Type::Void | Type::Primitive { .. } => {}
            Type::Pointer { pointee, .. } => pointee.visit_references(f),
            Type::Array { element, .. } => element.visit_references(f),
            Type::Defined(reference) => f(reference),
        }
    }

    /// Visit every `DefinitionReference` in this expression, mutably.
    pub fn visit_references_mut(&mut self, f: &mut dyn FnMut(&mut DefinitionReference)) {
        match self {
            Type::Void | Type::Primitive { .. } => {}
            Type::Pointer { pointee, .. } => pointee.visit_references_mut(f),
            Type::Array { element, .. } => element.visit_references_mut(f),
            Type::Defined(reference) => f(reference),
        }
    }

    /// Byte size of a value of this type, resolved against `model`.
    ///
    /// Returns `None` for void, function types, and references that do
    /// not resolve. Typedef chains are followed with a cycle guard.
    pub fn size(&self, model: &Model) -> Option<u64> {
        self.size_guarded(model, &mut FxHashSet::default())
    }

    pub(crate) fn size_guarded(
        &self,
        model: &Model,
        seen: &mut FxHashSet<DefinitionKey>,
    ) -> Option<u64> {
        match self {
            Type::Void => None,
            Type::Primitive { size, .. } => Some(*size),
            Type::Pointer { size, .. } => Some(*size),
            Type::Array { element, count } => {
                Some(element.size_guarded(model, seen)?.checked_mul(*count)?)
            }
            Type::Defined(reference) => {
                let key = reference.key()?;
                if !seen.insert(key) {
                    return None; // cyclic typedef chain
                }
                model.get(key)?.size_guarded(model, seen)
            }
        }
    }
}
