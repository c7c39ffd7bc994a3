//! Recast ABI
//!
//! Calling-convention descriptions and the conversion of function types
//! between the architecture-level register/stack form and the
//! ABI-normalized parameter-list form:
//! - **Descriptions**: named register orderings, stack layout rules,
//!   and aggregate-passing strategies (`description` module)
//! - **Conversion**: the total `convert_to_raw` lowering and the
//!   partial `try_convert_to_cabi` classification (`convert` module)

#![warn(missing_docs)]

pub mod convert;
pub mod description;

pub use convert::{convert_to_raw, try_convert_to_cabi};
pub use description::AbiDescription;
