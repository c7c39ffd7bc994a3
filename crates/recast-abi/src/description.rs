//! Calling-convention descriptions
//!
//! An `AbiDescription` captures everything the converter needs to know
//! about one calling convention: the ordered argument and return
//! register lists per class, the stack-slot granularity, and how
//! aggregates too large for registers travel.

use recast_model::Register;
use serde::{Deserialize, Serialize};

/// A named calling-convention description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiDescription {
    /// Convention tag, stored in `CabiFunctionDefinition::abi`
    pub name: String,
    /// Integer-class argument registers, in assignment order
    pub argument_registers: Vec<Register>,
    /// Vector-class argument registers, in assignment order
    pub vector_argument_registers: Vec<Register>,
    /// Integer-class return registers, in assignment order
    pub return_registers: Vec<Register>,
    /// Vector-class return registers, in assignment order
    pub vector_return_registers: Vec<Register>,
    /// Granularity and alignment of stack argument slots, in bytes
    pub stack_alignment: u64,
    /// Largest aggregate that may travel in registers; anything bigger
    /// is passed through a hidden pointer
    pub max_aggregate_size_in_registers: u64,
    /// Whether aggregates always travel by hidden pointer instead of
    /// being split across registers (Microsoft x64 style)
    pub aggregates_by_pointer: bool,
    /// Pointer size in bytes
    pub pointer_size: u64,
}

impl AbiDescription {
    /// The System V AMD64 convention: six integer argument registers,
    /// small aggregates split across registers.
    pub fn systemv_x86_64() -> Self {
        use Register::*;
        AbiDescription {
            name: "systemv_x86_64".into(),
            argument_registers: vec![Rdi, Rsi, Rdx, Rcx, R8, R9],
            vector_argument_registers: vec![Xmm0, Xmm1, Xmm2, Xmm3],
            return_registers: vec![Rax, Rdx],
            vector_return_registers: vec![Xmm0, Xmm1],
            stack_alignment: 8,
            max_aggregate_size_in_registers: 16,
            aggregates_by_pointer: false,
            pointer_size: 8,
        }
    }

    /// The Microsoft x64 convention: four argument registers, register
    /// aggregates only at power-of-two sizes up to 8, everything else
    /// by hidden pointer.
    pub fn microsoft_x64() -> Self {
        use Register::*;
        AbiDescription {
            name: "microsoft_x64".into(),
            argument_registers: vec![Rcx, Rdx, R8, R9],
            vector_argument_registers: vec![Xmm0, Xmm1, Xmm2, Xmm3],
            return_registers: vec![Rax],
            vector_return_registers: vec![Xmm0],
            stack_alignment: 8,
            max_aggregate_size_in_registers: 8,
            aggregates_by_pointer: true,
            pointer_size: 8,
        }
    }

    /// The AArch64 AAPCS convention: eight integer argument registers,
    /// small aggregates split across registers.
    pub fn aapcs64() -> Self {
        use Register::*;
        AbiDescription {
            name: "aapcs64".into(),
            argument_registers: vec![X0, X1, X2, X3, X4, X5, X6, X7],
            vector_argument_registers: vec![V0, V1, V2, V3],
            return_registers: vec![X0, X1],
            vector_return_registers: vec![V0, V1],
            stack_alignment: 8,
            max_aggregate_size_in_registers: 16,
            aggregates_by_pointer: false,
            pointer_size: 8,
        }
    }

    /// Resolve an ABI tag to its description.
    pub fn named(tag: &str) -> Option<AbiDescription> {
        match tag {
            "systemv_x86_64" => Some(Self::systemv_x86_64()),
            "microsoft_x64" => Some(Self::microsoft_x64()),
            "aapcs64" => Some(Self::aapcs64()),
            _ => None,
        }
    }
}
