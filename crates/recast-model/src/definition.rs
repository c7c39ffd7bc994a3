//! Type definitions
//!
//! A `TypeDefinition` is one node of the type graph: a tagged variant
//! over the definition kinds, uniquely keyed by `(id, kind)`. Every
//! definition carries a mutable user-assigned `custom_name` and an
//! immutable-once-set `original_name` recovered from the binary.

use crate::kind::{DefinitionKey, DefinitionKind, DefinitionReference};
use crate::model::Model;
use crate::register::Register;
use crate::ty::Type;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capability of carrying a user-assigned custom name alongside the
/// name recovered from the original binary.
///
/// Implemented by whole definitions and by enum entries. The type
/// copier uses it to migrate the custom name into the original-name
/// slot when a definition leaves its source model.
pub trait NamedElement {
    /// The user-assigned name (empty when unset).
    fn custom_name(&self) -> &str;
    /// The name recovered from the binary (empty when unset).
    fn original_name(&self) -> &str;
    /// Overwrite the custom name.
    fn set_custom_name(&mut self, name: String);
    /// Overwrite the original name.
    fn set_original_name(&mut self, name: String);

    /// Move the custom name into the original-name slot (only if that
    /// slot is still empty) and clear the custom name.
    fn migrate_custom_name(&mut self) {
        let custom = self.custom_name().to_owned();
        self.set_custom_name(String::new());
        if self.original_name().is_empty() {
            self.set_original_name(custom);
        }
    }
}

macro_rules! impl_named_element {
    ($ty:ty) => {
        impl NamedElement for $ty {
            fn custom_name(&self) -> &str {
                &self.custom_name
            }
            fn original_name(&self) -> &str {
                &self.original_name
            }
            fn set_custom_name(&mut self, name: String) {
                self.custom_name = name;
            }
            fn set_original_name(&mut self, name: String) {
                self.original_name = name;
            }
        }
    };
}

/// One field of a struct definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructField {
    /// Byte offset from the start of the struct
    pub offset: u64,
    /// Field name (empty when unnamed)
    pub name: String,
    /// Field type
    pub ty: Type,
}

/// A struct: offset-addressed fields within an explicit total size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDefinition {
    /// Unique id within the owning model (0 = unassigned)
    pub id: u64,
    /// User-assigned name
    pub custom_name: String,
    /// Name recovered from the binary
    pub original_name: String,
    /// Fields in ascending offset order
    pub fields: Vec<StructField>,
    /// Total size in bytes
    pub size: u64,
}

impl_named_element!(StructDefinition);

/// One member of a union definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionField {
    /// Field name (empty when unnamed)
    pub name: String,
    /// Field type
    pub ty: Type,
}

/// A union: overlapping fields sharing offset zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionDefinition {
    /// Unique id within the owning model (0 = unassigned)
    pub id: u64,
    /// User-assigned name
    pub custom_name: String,
    /// Name recovered from the binary
    pub original_name: String,
    /// Member fields
    pub fields: Vec<UnionField>,
}

impl_named_element!(UnionDefinition);

/// One entry of an enum definition. Carries its own name pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumEntry {
    /// Entry value
    pub value: u64,
    /// User-assigned name
    pub custom_name: String,
    /// Name recovered from the binary
    pub original_name: String,
}

impl_named_element!(EnumEntry);

/// An enumeration over an underlying integer type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDefinition {
    /// Unique id within the owning model (0 = unassigned)
    pub id: u64,
    /// User-assigned name
    pub custom_name: String,
    /// Name recovered from the binary
    pub original_name: String,
    /// Underlying integer type
    pub underlying: Type,
    /// Entries in declaration order
    pub entries: Vec<EnumEntry>,
}

impl_named_element!(EnumDefinition);

/// A name alias for another type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedefDefinition {
    /// Unique id within the owning model (0 = unassigned)
    pub id: u64,
    /// User-assigned name
    pub custom_name: String,
    /// Name recovered from the binary
    pub original_name: String,
    /// Aliased type
    pub underlying: Type,
}

impl_named_element!(TypedefDefinition);

/// An argument of a raw function type, bound to a machine register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawArgument {
    /// Register holding the argument
    pub register: Register,
    /// Argument type
    pub ty: Type,
}

/// A return value of a raw function type, bound to a machine register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReturnValue {
    /// Register holding (part of) the return value
    pub register: Register,
    /// Value type
    pub ty: Type,
}

/// A stack-passed argument of a raw function type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackArgument {
    /// Byte offset from the start of the stack-argument area
    pub offset: u64,
    /// Argument type
    pub ty: Type,
}

/// A function type in architecture-level register/stack form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFunctionDefinition {
    /// Unique id within the owning model (0 = unassigned)
    pub id: u64,
    /// User-assigned name
    pub custom_name: String,
    /// Name recovered from the binary
    pub original_name: String,
    /// Register-bound arguments in assignment order
    pub arguments: Vec<RawArgument>,
    /// Register-bound return values in assignment order
    pub return_values: Vec<RawReturnValue>,
    /// Stack-passed arguments in ascending offset order
    pub stack_arguments: Vec<StackArgument>,
}

impl_named_element!(RawFunctionDefinition);

/// A typed parameter of a C-ABI function type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name (empty when unnamed)
    pub name: String,
    /// Parameter type
    pub ty: Type,
}

/// A function type in ABI-normalized parameter-list form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CabiFunctionDefinition {
    /// Unique id within the owning model (0 = unassigned)
    pub id: u64,
    /// User-assigned name
    pub custom_name: String,
    /// Name recovered from the binary
    pub original_name: String,
    /// Tag naming the calling convention (resolvable via the ABI crate)
    pub abi: String,
    /// Parameters in declaration order
    pub parameters: Vec<Parameter>,
    /// Return type
    pub return_type: Type,
    /// Whether the function takes variadic trailing arguments
    pub is_variadic: bool,
}

impl_named_element!(CabiFunctionDefinition);

/// A type definition: tagged variant over the definition kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeDefinition {
    /// Struct definition
    Struct(StructDefinition),
    /// Union definition
    Union(UnionDefinition),
    /// Enum definition
    Enum(EnumDefinition),
    /// Typedef definition
    Typedef(TypedefDefinition),
    /// Register/stack-form function type
    RawFunction(RawFunctionDefinition),
    /// ABI-normalized function type
    CabiFunction(CabiFunctionDefinition),
}

impl TypeDefinition {
    /// The definition's numeric id (0 = unassigned).
    pub fn id(&self) -> u64 {
        match self {
            TypeDefinition::Struct(d) => d.id,
            TypeDefinition::Union(d) => d.id,
            TypeDefinition::Enum(d) => d.id,
            TypeDefinition::Typedef(d) => d.id,
            TypeDefinition::RawFunction(d) => d.id,
            TypeDefinition::CabiFunction(d) => d.id,
        }
    }

    /// Overwrite the definition's id.
    pub fn set_id(&mut self, id: u64) {
        match self {
            TypeDefinition::Struct(d) => d.id = id,
            TypeDefinition::Union(d) => d.id = id,
            TypeDefinition::Enum(d) => d.id = id,
            TypeDefinition::Typedef(d) => d.id = id,
            TypeDefinition::RawFunction(d) => d.id = id,
            TypeDefinition::CabiFunction(d) => d.id = id,
        }
    }

    /// The definition's kind tag.
    pub fn kind(&self) -> DefinitionKind {
        match self {
            TypeDefinition::Struct(_) => DefinitionKind::Struct,
            TypeDefinition::Union(_) => DefinitionKind::Union,
            TypeDefinition::Enum(_) => DefinitionKind::Enum,
            TypeDefinition::Typedef(_) => DefinitionKind::Typedef,
            TypeDefinition::RawFunction(_) => DefinitionKind::RawFunction,
            TypeDefinition::CabiFunction(_) => DefinitionKind::CabiFunction,
        }
    }

    /// The definition's unique key.
    pub fn key(&self) -> DefinitionKey {
        DefinitionKey::new(self.id(), self.kind())
    }

    /// Every definition key this definition structurally mentions, in
    /// stable field order. Duplicates are preserved.
    pub fn edges(&self) -> Vec<DefinitionKey> {
        let mut keys = Vec::new();
        self.visit_references(&mut |reference| {
            if let Some(key) = reference.key() {
                keys.push(key);
            }
        });
        keys
    }

    /// Visit every `DefinitionReference` inside this definition.
    pub fn visit_references(&self, f: &mut dyn FnMut(&DefinitionReference)) {
        match self {
            TypeDefinition::Struct(d) => {
                for field in &d.fields {
                    field.ty.visit_references(f);
                }
            }
            TypeDefinition::Union(d) => {
                for field in &d.fields {
                    field.ty.visit_references(f);
                }
            }
            TypeDefinition::Enum(d) => d.underlying.visit_references(f),
            TypeDefinition::Typedef(d) => d.underlying.visit_references(f),
            TypeDefinition::RawFunction(d) => {
                for argument in &d.arguments {
                    argument.ty.visit_references(f);
                }
                for value in &d.return_values {
                    value.ty.visit_references(f);
                }
                for argument in &d.stack_arguments {
                    argument.ty.visit_references(f);
                }
            }
            TypeDefinition::CabiFunction(d) => {
                for parameter in &d.parameters {
                    parameter.ty.visit_references(f);
                }
                d.return_type.visit_references(f);
            }
        }
    }

    /// Visit every `DefinitionReference` inside this definition, mutably.
    pub fn visit_references_mut(&mut self, f: &mut dyn FnMut(&mut DefinitionReference)) {
        match self {
            TypeDefinition::Struct(d) => {
                for field in &mut d.fields {
                    field.ty.visit_references_mut(f);
                }
            }
            TypeDefinition::Union(d) => {
                for field in &mut d.fields {
                    field.ty.visit_references_mut(f);
                }
            }
            TypeDefinition::Enum(d) => d.underlying.visit_references_mut(f),
            TypeDefinition::Typedef(d) => d.underlying.visit_references_mut(f),
            TypeDefinition::RawFunction(d) => {
                for argument in &mut d.arguments {
                    argument.ty.visit_references_mut(f);
                }
                for value in &mut d.return_values {
                    value.ty.visit_references_mut(f);
                }
                for argument in &mut d.stack_arguments {
                    argument.ty.visit_references_mut(f);
                }
            }
            TypeDefinition::CabiFunction(d) => {
                for parameter in &mut d.parameters {
                    parameter.ty.visit_references_mut(f);
                }
                d.return_type.visit_references_mut(f);
            }
        }
    }

    /// Migrate the custom name of this definition and of every nested
    /// named element (enum entries) into the original-name slot.
    pub fn migrate_names(&mut self) {
        match self {
            TypeDefinition::Struct(d) => d.migrate_custom_name(),
            TypeDefinition::Union(d) => d.migrate_custom_name(),
            TypeDefinition::Enum(d) => {
                d.migrate_custom_name();
                for entry in &mut d.entries {
                    entry.migrate_custom_name();
                }
            }
            TypeDefinition::Typedef(d) => d.migrate_custom_name(),
            TypeDefinition::RawFunction(d) => d.migrate_custom_name(),
            TypeDefinition::CabiFunction(d) => d.migrate_custom_name(),
        }
    }

    /// Byte size of a value of this type, resolved against `model`.
    ///
    /// `None` for function types and unresolvable members.
    pub fn size(&self, model: &Model) -> Option<u64> {
        self.size_guarded(model, &mut FxHashSet::default())
    }

    pub(crate) fn size_guarded(
        &self,
        model: &Model,
        seen: &mut FxHashSet<DefinitionKey>,
    ) -> Option<u64> {
        match self {
            TypeDefinition::Struct(d) => Some(d.size),
            TypeDefinition::Union(d) => {
                let mut largest = 0;
                for field in &d.fields {
                    largest = largest.max(field.ty.size_guarded(model, seen)?);
                }
                Some(largest)
            }
            TypeDefinition::Enum(d) => d.underlying.size_guarded(model, seen),
            TypeDefinition::Typedef(d) => d.underlying.size_guarded(model, seen),
            TypeDefinition::RawFunction(_) | TypeDefinition::CabiFunction(_) => None,
        }
    }
}

impl NamedElement for TypeDefinition {
    fn custom_name(&self) -> &str {
        match self {
            TypeDefinition::Struct(d) => d.custom_name(),
            TypeDefinition::Union(d) => d.custom_name(),
            TypeDefinition::Enum(d) => d.custom_name(),
            TypeDefinition::Typedef(d) => d.custom_name(),
            TypeDefinition::RawFunction(d) => d.custom_name(),
            TypeDefinition::CabiFunction(d) => d.custom_name(),
        }
    }

    fn original_name(&self) -> &str {
        match self {
            TypeDefinition::Struct(d) => d.original_name(),
            TypeDefinition::Union(d) => d.original_name(),
            TypeDefinition::Enum(d) => d.original_name(),
            TypeDefinition::Typedef(d) => d.original_name(),
            TypeDefinition::RawFunction(d) => d.original_name(),
            TypeDefinition::CabiFunction(d) => d.original_name(),
        }
    }

    fn set_custom_name(&mut self, name: String) {
        match self {
            TypeDefinition::Struct(d) => d.set_custom_name(name),
            TypeDefinition::Union(d) => d.set_custom_name(name),
            TypeDefinition::Enum(d) => d.set_custom_name(name),
            TypeDefinition::Typedef(d) => d.set_custom_name(name),
            TypeDefinition::RawFunction(d) => d.set_custom_name(name),
            TypeDefinition::CabiFunction(d) => d.set_custom_name(name),
        }
    }

    fn set_original_name(&mut self, name: String) {
        match self {
            TypeDefinition::Struct(d) => d.set_original_name(name),
            TypeDefinition::Union(d) => d.set_original_name(name),
            TypeDefinition::Enum(d) => d.set_original_name(name),
            TypeDefinition::Typedef(d) => d.set_original_name(name),
            TypeDefinition::RawFunction(d) => d.set_original_name(name),
            TypeDefinition::CabiFunction(d) => d.set_original_name(name),
        }
    }
}

impl fmt::Display for TypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if !self.custom_name().is_empty() {
            self.custom_name()
        } else if !self.original_name().is_empty() {
            self.original_name()
        } else {
            "<anonymous>"
        };
        write!(f, "{} {name}", self.key())
    }
}
