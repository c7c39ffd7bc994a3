//! Machine registers referenced by raw function types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Class of a machine register, for ABI assignment purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterClass {
    /// General-purpose integer/pointer registers
    Integer,
    /// Floating-point / vector registers
    Vector,
}

/// A machine register a raw function type can bind an argument or
/// return value to.
///
/// Covers the registers the built-in ABI descriptions use: the x86-64
/// general-purpose and SSE argument registers plus the AArch64 AAPCS
/// argument registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Register {
    // x86-64 general purpose
    Rax,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    R8,
    R9,
    // x86-64 SSE
    Xmm0,
    Xmm1,
    Xmm2,
    Xmm3,
    // AArch64 general purpose
    X0,
    X1,
    X2,
    X3,
    X4,
    X5,
    X6,
    X7,
    // AArch64 SIMD
    V0,
    V1,
    V2,
    V3,
}

impl Register {
    /// The register's assignment class.
    pub fn class(&self) -> RegisterClass {
        use Register::*;
        match self {
            Rax | Rcx | Rdx | Rsi | Rdi | R8 | R9 => RegisterClass::Integer,
            Xmm0 | Xmm1 | Xmm2 | Xmm3 => RegisterClass::Vector,
            X0 | X1 | X2 | X3 | X4 | X5 | X6 | X7 => RegisterClass::Integer,
            V0 | V1 | V2 | V3 => RegisterClass::Vector,
        }
    }

    /// Size in bytes of the register's addressable portion.
    pub fn size(&self) -> u64 {
        match self.class() {
            RegisterClass::Integer => 8,
            RegisterClass::Vector => 16,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format!("{self:?}").to_lowercase())
    }
}
