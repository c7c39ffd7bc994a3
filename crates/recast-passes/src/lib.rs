//! Recast Passes
//!
//! The two hard transformations over a type model:
//! - **TypeCopier**: transplants a closed subset of definitions from a
//!   source model into a destination model, assigning fresh identities
//!   and repairing cross-references in a final fixup phase
//!   (`copier` module, backed by the `graph` module)
//! - **Bulk conversion**: model-wide conversion of function types
//!   between raw register/stack form and ABI-named parameter-list
//!   form, including whole-model reference rewriting and old-entry
//!   removal (`convert` module)

#![warn(missing_docs)]

pub mod convert;
pub mod copier;
pub mod graph;

pub use convert::{convert_all_functions_to_cabi, convert_all_functions_to_raw};
pub use copier::TypeCopier;
pub use graph::TypeGraph;
