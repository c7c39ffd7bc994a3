//! Recast Model
//!
//! Typed, graph-structured model of a program's data and function types
//! as recovered during binary analysis:
//! - **Definitions**: struct, union, enum, typedef, and function type
//!   definitions, uniquely keyed by `(id, kind)` (`definition` module)
//! - **References**: weak, by-key pointers between definitions
//!   (`kind` module)
//! - **Model**: the owning container with reference resolution,
//!   structural visitation, and verification (`model` module)

#![warn(missing_docs)]

pub mod definition;
pub mod error;
pub mod kind;
pub mod model;
pub mod register;
pub mod ty;

pub use definition::{
    CabiFunctionDefinition, EnumDefinition, EnumEntry, NamedElement, Parameter, RawArgument,
    RawFunctionDefinition, RawReturnValue, StackArgument, StructDefinition, StructField,
    TypeDefinition, TypedefDefinition, UnionDefinition, UnionField,
};
pub use error::ModelError;
pub use kind::{DefinitionKey, DefinitionKind, DefinitionReference};
pub use model::Model;
pub use register::{Register, RegisterClass};
pub use ty::{PrimitiveKind, Type};
