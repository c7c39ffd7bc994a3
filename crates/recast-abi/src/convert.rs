//! Function-type conversion
//!
//! Lowers ABI-normalized function types to register/stack assignments
//! (`convert_to_raw`, total) and classifies register/stack assignments
//! back into parameter lists against one candidate convention
//! (`try_convert_to_cabi`, partial: assignments inconsistent with the
//! candidate produce `None`).

use crate::description::AbiDescription;
use recast_model::{
    CabiFunctionDefinition, DefinitionKey, Model, Parameter, PrimitiveKind, RawArgument,
    RawFunctionDefinition, RawReturnValue, RegisterClass, StackArgument, StructDefinition,
    StructField, Type, TypeDefinition,
};
use rustc_hash::FxHashSet;
use tracing::debug;

/// ABI-relevant shape of one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classification {
    /// Fits a single register of the given class
    Scalar { class: RegisterClass, size: u64 },
    /// Struct, union, or array of the given total size
    Aggregate { size: u64 },
}

/// Classify a type expression for assignment purposes.
///
/// Follows typedef chains and treats enums as their underlying integer.
/// Returns `None` only for void. Unresolvable references degrade to a
/// pointer-sized integer scalar so the lowering stays total.
fn classify(ty: &Type, model: &Model, abi: &AbiDescription) -> Option<Classification> {
    classify_guarded(ty, model, abi, &mut FxHashSet::default())
}

fn classify_guarded(
    ty: &Type,
    model: &Model,
    abi: &AbiDescription,
    seen: &mut FxHashSet<DefinitionKey>,
) -> Option<Classification> {
    let pointer_scalar = Classification::Scalar {
        class: RegisterClass::Integer,
        size: abi.pointer_size,
    };
    match ty {
        Type::Void => None,
        Type::Primitive { kind: PrimitiveKind::Float, size } => {
            Some(Classification::Scalar { class: RegisterClass::Vector, size: *size })
        }
        Type::Primitive { size, .. } => {
            Some(Classification::Scalar { class: RegisterClass::Integer, size: *size })
        }
        Type::Pointer { size, .. } => {
            Some(Classification::Scalar { class: RegisterClass::Integer, size: *size })
        }
        Type::Array { .. } => Some(Classification::Aggregate {
            size: ty.size(model).unwrap_or(abi.pointer_size),
        }),
        Type::Defined(reference) => {
            let Some(key) = reference.key() else {
                return Some(pointer_scalar);
            };
            if !seen.insert(key) {
                return Some(pointer_scalar); // cyclic typedef chain
            }
            match model.get(key) {
                Some(TypeDefinition::Typedef(d)) => {
                    classify_guarded(&d.underlying, model, abi, seen)
                }
                Some(TypeDefinition::Enum(d)) => {
                    classify_guarded(&d.underlying, model, abi, seen)
                }
                Some(definition @ (TypeDefinition::Struct(_) | TypeDefinition::Union(_))) => {
                    Some(Classification::Aggregate {
                        size: definition.size(model).unwrap_or(abi.pointer_size),
                    })
                }
                // Function types and dangling references occupy a
                // pointer-sized slot.
                _ => Some(pointer_scalar),
            }
        }
    }
}

fn round_up(value: u64, to: u64) -> u64 {
    value.div_ceil(to) * to
}

/// Running assignment state for one lowering.
struct Assigner<'a> {
    abi: &'a AbiDescription,
    next_integer: usize,
    next_vector: usize,
    stack_offset: u64,
    arguments: Vec<RawArgument>,
    stack_arguments: Vec<StackArgument>,
}

impl<'a> Assigner<'a> {
    fn new(abi: &'a AbiDescription) -> Self {
        Assigner {
            abi,
            next_integer: 0,
            next_vector: 0,
            stack_offset: 0,
            arguments: Vec::new(),
            stack_arguments: Vec::new(),
        }
    }

    /// Assign one register-sized value: next free register of its
    /// class, or the next aligned stack slot once the class is
    /// exhausted.
    fn assign_scalar(&mut self, ty: Type, class: RegisterClass, size: u64) {
        let (list, next) = match class {
            RegisterClass::Integer => (&self.abi.argument_registers, &mut self.next_integer),
            RegisterClass::Vector => {
                (&self.abi.vector_argument_registers, &mut self.next_vector)
            }
        };
        if let Some(&register) = list.get(*next) {
            *next += 1;
            self.arguments.push(RawArgument { register, ty });
        } else {
            self.spill(ty, size);
        }
    }

    /// Split an aggregate into consecutive integer registers, one per
    /// 8-byte chunk, or spill it whole if not enough registers remain.
    fn assign_split(&mut self, ty: Type, size: u64) {
        let chunks = size.div_ceil(8).max(1) as usize;
        let remaining = self.abi.argument_registers.len() - self.next_integer;
        if chunks > remaining {
            self.spill(ty, size);
            return;
        }
        if chunks == 1 {
            self.assign_scalar(ty, RegisterClass::Integer, size);
            return;
        }
        for _ in 0..chunks {
            let register = self.abi.argument_registers[self.next_integer];
            self.next_integer += 1;
            self.arguments.push(RawArgument { register, ty: Type::unsigned(8) });
        }
    }

    fn spill(&mut self, ty: Type, size: u64) {
        let offset = self.stack_offset;
        self.stack_offset += round_up(size.max(1), self.abi.stack_alignment);
        self.stack_arguments.push(StackArgument { offset, ty });
    }

    fn assign_parameter(&mut self, ty: &Type, model: &Model) {
        match classify(ty, model, self.abi) {
            None => {
                // Void parameter: nothing to pass.
            }
            Some(Classification::Scalar { class, size }) => {
                self.assign_scalar(ty.clone(), class, size);
            }
            Some(Classification::Aggregate { size }) => {
                if self.abi.aggregates_by_pointer {
                    if size <= self.abi.max_aggregate_size_in_registers
                        && size.is_power_of_two()
                    {
                        self.assign_scalar(ty.clone(), RegisterClass::Integer, size);
                    } else {
                        let pointer = Type::pointer(ty.clone(), self.abi.pointer_size);
                        self.assign_scalar(pointer, RegisterClass::Integer, self.abi.pointer_size);
                    }
                } else if size <= self.abi.max_aggregate_size_in_registers {
                    self.assign_split(ty.clone(), size);
                } else {
                    // Oversized aggregate under a splitting convention
                    // travels on the stack in one piece.
                    self.spill(ty.clone(), size);
                }
            }
        }
    }
}

/// Lower an ABI-normalized function type to register/stack form.
///
/// Total and deterministic: every parameter is assigned to the next
/// available register of its class in the description's order, with
/// overflow spilled to aligned stack slots. An oversized aggregate
/// return becomes a hidden pointer parameter prepended before all
/// others, echoed in the first return register. The original id and
/// both names are preserved.
pub fn convert_to_raw(
    cabi: &CabiFunctionDefinition,
    model: &Model,
    abi: &AbiDescription,
) -> RawFunctionDefinition {
    let mut assigner = Assigner::new(abi);
    let mut return_values = Vec::new();

    match classify(&cabi.return_type, model, abi) {
        None => {}
        Some(Classification::Scalar { class, .. }) => {
            let register = match class {
                RegisterClass::Integer => abi.return_registers[0],
                RegisterClass::Vector => abi.vector_return_registers[0],
            };
            return_values.push(RawReturnValue { register, ty: cabi.return_type.clone() });
        }
        Some(Classification::Aggregate { size }) => {
            let chunks = size.div_ceil(8).max(1) as usize;
            let in_registers = if abi.aggregates_by_pointer {
                size <= abi.max_aggregate_size_in_registers && size.is_power_of_two()
            } else {
                size <= abi.max_aggregate_size_in_registers
                    && chunks <= abi.return_registers.len()
            };
            if in_registers {
                if chunks == 1 {
                    return_values.push(RawReturnValue {
                        register: abi.return_registers[0],
                        ty: cabi.return_type.clone(),
                    });
                } else {
                    for &register in abi.return_registers.iter().take(chunks) {
                        return_values.push(RawReturnValue { register, ty: Type::unsigned(8) });
                    }
                }
            } else {
                // Hidden-pointer return: the caller passes the
                // destination in the first integer argument register
                // and gets the same pointer back.
                let pointer = Type::pointer(cabi.return_type.clone(), abi.pointer_size);
                assigner.assign_scalar(pointer.clone(), RegisterClass::Integer, abi.pointer_size);
                return_values.push(RawReturnValue {
                    register: abi.return_registers[0],
                    ty: pointer,
                });
            }
        }
    }

    for parameter in &cabi.parameters {
        assigner.assign_parameter(&parameter.ty, model);
    }

    RawFunctionDefinition {
        id: cabi.id,
        custom_name: cabi.custom_name.clone(),
        original_name: cabi.original_name.clone(),
        arguments: assigner.arguments,
        return_values,
        stack_arguments: assigner.stack_arguments,
    }
}

/// Classify a register/stack assignment against one candidate
/// convention, reconstructing a parameter list.
///
/// Returns `None` when the assignment is inconsistent with the
/// candidate: a register absent from its ordered lists, registers used
/// out of order, stack slots at offsets the convention would not
/// produce, or a return-register combination it cannot emit. A
/// multi-register return synthesizes a struct definition recorded into
/// `model`, which is why the model is mutable.
pub fn try_convert_to_cabi(
    raw: &RawFunctionDefinition,
    model: &mut Model,
    abi: &AbiDescription,
) -> Option<CabiFunctionDefinition> {
    let mut next_integer = 0;
    let mut next_vector = 0;
    let mut parameters = Vec::new();

    for argument in &raw.arguments {
        let (list, next) = match argument.register.class() {
            RegisterClass::Integer => (&abi.argument_registers, &mut next_integer),
            RegisterClass::Vector => (&abi.vector_argument_registers, &mut next_vector),
        };
        if list.get(*next) != Some(&argument.register) {
            debug!(
                register = %argument.register,
                abi = %abi.name,
                "argument register inconsistent with candidate ABI"
            );
            return None;
        }
        *next += 1;
        parameters.push(Parameter { name: String::new(), ty: argument.ty.clone() });
    }

    let mut expected_offset = 0;
    for slot in &raw.stack_arguments {
        if slot.offset != expected_offset {
            debug!(
                offset = slot.offset,
                expected = expected_offset,
                abi = %abi.name,
                "stack slot offset inconsistent with candidate ABI"
            );
            return None;
        }
        let size = slot.ty.size(model).unwrap_or(abi.pointer_size).max(1);
        expected_offset += round_up(size, abi.stack_alignment);
        parameters.push(Parameter { name: String::new(), ty: slot.ty.clone() });
    }

    let return_type = match raw.return_values.as_slice() {
        [] => Type::Void,
        [single] => {
            let expected = match single.register.class() {
                RegisterClass::Integer => abi.return_registers.first(),
                RegisterClass::Vector => abi.vector_return_registers.first(),
            };
            if expected != Some(&single.register) {
                debug!(
                    register = %single.register,
                    abi = %abi.name,
                    "return register inconsistent with candidate ABI"
                );
                return None;
            }
            single.ty.clone()
        }
        multiple => {
            if multiple.len() > abi.return_registers.len()
                || multiple
                    .iter()
                    .zip(&abi.return_registers)
                    .any(|(value, expected)| value.register != *expected)
            {
                debug!(
                    count = multiple.len(),
                    abi = %abi.name,
                    "return register combination the candidate ABI cannot produce"
                );
                return None;
            }
            // Register pair (or more): materialize the pieces as a
            // synthesized struct so the parameter-list form stays typed.
            let fields = multiple
                .iter()
                .enumerate()
                .map(|(index, value)| StructField {
                    offset: index as u64 * 8,
                    name: String::new(),
                    ty: value.ty.clone(),
                })
                .collect::<Vec<_>>();
            let key = model.record_new_type(TypeDefinition::Struct(StructDefinition {
                id: 0,
                custom_name: String::new(),
                original_name: String::new(),
                fields,
                size: multiple.len() as u64 * 8,
            }));
            Type::defined(key)
        }
    };

    Some(CabiFunctionDefinition {
        id: raw.id,
        custom_name: raw.custom_name.clone(),
        original_name: raw.original_name.clone(),
        abi: abi.name.clone(),
        parameters,
        return_type,
        is_variadic: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use recast_model::Register;

    fn cabi(parameters: Vec<Type>, return_type: Type, abi: &AbiDescription) -> CabiFunctionDefinition {
        CabiFunctionDefinition {
            id: 100,
            custom_name: String::new(),
            original_name: String::new(),
            abi: abi.name.clone(),
            parameters: parameters
                .into_iter()
                .map(|ty| Parameter { name: String::new(), ty })
                .collect(),
            return_type,
            is_variadic: false,
        }
    }

    #[test]
    fn test_two_ints_in_sysv_order() {
        let model = Model::new();
        let abi = AbiDescription::systemv_x86_64();
        let raw = convert_to_raw(&cabi(vec![Type::signed(4), Type::signed(4)], Type::signed(4), &abi), &model, &abi);

        assert_eq!(raw.arguments.len(), 2);
        assert_eq!(raw.arguments[0].register, Register::Rdi);
        assert_eq!(raw.arguments[1].register, Register::Rsi);
        assert_eq!(raw.return_values.len(), 1);
        assert_eq!(raw.return_values[0].register, Register::Rax);
        assert!(raw.stack_arguments.is_empty());
        assert_eq!(raw.id, 100, "lowering preserves the id");
    }

    #[test]
    fn test_float_arguments_use_vector_registers() {
        let model = Model::new();
        let abi = AbiDescription::systemv_x86_64();
        let raw = convert_to_raw(
            &cabi(vec![Type::float(8), Type::signed(8)], Type::float(8), &abi),
            &model,
            &abi,
        );

        assert_eq!(raw.arguments[0].register, Register::Xmm0);
        assert_eq!(raw.arguments[1].register, Register::Rdi);
        assert_eq!(raw.return_values[0].register, Register::Xmm0);
    }

    #[test]
    fn test_overflow_spills_to_aligned_stack_slots() {
        let model = Model::new();
        let abi = AbiDescription::systemv_x86_64();
        // Eight integer parameters: six in registers, two on the stack.
        let raw = convert_to_raw(
            &cabi(vec![Type::signed(8); 8], Type::Void, &abi),
            &model,
            &abi,
        );

        assert_eq!(raw.arguments.len(), 6);
        assert_eq!(raw.stack_arguments.len(), 2);
        assert_eq!(raw.stack_arguments[0].offset, 0);
        assert_eq!(raw.stack_arguments[1].offset, 8);
        assert!(raw.return_values.is_empty());
    }

    #[test]
    fn test_round_trip_preserves_parameters() {
        let mut model = Model::new();
        let abi = AbiDescription::systemv_x86_64();
        let original = cabi(vec![Type::signed(4), Type::signed(4)], Type::signed(4), &abi);

        let raw = convert_to_raw(&original, &model, &abi);
        let back = try_convert_to_cabi(&raw, &mut model, &abi).expect("round trip must classify");

        assert_eq!(back.parameters.len(), original.parameters.len());
        assert_eq!(back.parameters[0].ty, original.parameters[0].ty);
        assert_eq!(back.parameters[1].ty, original.parameters[1].ty);
        assert_eq!(back.return_type, original.return_type);
        assert_eq!(back.abi, abi.name);
    }

    #[test]
    fn test_register_absent_from_abi_is_rejected() {
        let mut model = Model::new();
        let abi = AbiDescription::systemv_x86_64();
        // Rax is not an argument register under System V.
        let raw = RawFunctionDefinition {
            id: 1,
            custom_name: String::new(),
            original_name: String::new(),
            arguments: vec![RawArgument { register: Register::Rax, ty: Type::signed(8) }],
            return_values: Vec::new(),
            stack_arguments: Vec::new(),
        };

        assert_eq!(try_convert_to_cabi(&raw, &mut model, &abi), None);
    }

    #[test]
    fn test_out_of_order_registers_are_rejected() {
        let mut model = Model::new();
        let abi = AbiDescription::systemv_x86_64();
        // Rsi before Rdi violates the prescribed order.
        let raw = RawFunctionDefinition {
            id: 1,
            custom_name: String::new(),
            original_name: String::new(),
            arguments: vec![
                RawArgument { register: Register::Rsi, ty: Type::signed(8) },
                RawArgument { register: Register::Rdi, ty: Type::signed(8) },
            ],
            return_values: Vec::new(),
            stack_arguments: Vec::new(),
        };

        assert_eq!(try_convert_to_cabi(&raw, &mut model, &abi), None);
    }

    #[test]
    fn test_stack_gap_is_rejected() {
        let mut model = Model::new();
        let abi = AbiDescription::systemv_x86_64();
        let raw = RawFunctionDefinition {
            id: 1,
            custom_name: String::new(),
            original_name: String::new(),
            arguments: Vec::new(),
            return_values: Vec::new(),
            stack_arguments: vec![StackArgument { offset: 16, ty: Type::signed(8) }],
        };

        assert_eq!(try_convert_to_cabi(&raw, &mut model, &abi), None);
    }

    #[test]
    fn test_sysv_splits_small_aggregate() {
        let mut model = Model::new();
        let abi = AbiDescription::systemv_x86_64();
        let pair = model.record_new_type(TypeDefinition::Struct(StructDefinition {
            id: 0,
            custom_name: String::new(),
            original_name: String::new(),
            fields: vec![
                StructField { offset: 0, name: String::new(), ty: Type::unsigned(8) },
                StructField { offset: 8, name: String::new(), ty: Type::unsigned(8) },
            ],
            size: 16,
        }));

        let raw = convert_to_raw(
            &cabi(vec![Type::defined(pair)], Type::Void, &abi),
            &model,
            &abi,
        );

        assert_eq!(raw.arguments.len(), 2);
        assert_eq!(raw.arguments[0].register, Register::Rdi);
        assert_eq!(raw.arguments[1].register, Register::Rsi);
    }

    #[test]
    fn test_microsoft_passes_large_aggregate_by_pointer() {
        let mut model = Model::new();
        let abi = AbiDescription::microsoft_x64();
        let big = model.record_new_type(TypeDefinition::Struct(StructDefinition {
            id: 0,
            custom_name: String::new(),
            original_name: String::new(),
            fields: vec![StructField {
                offset: 0,
                name: String::new(),
                ty: Type::Array { element: Box::new(Type::unsigned(8)), count: 4 },
            }],
            size: 32,
        }));

        let raw = convert_to_raw(
            &cabi(vec![Type::defined(big)], Type::Void, &abi),
            &model,
            &abi,
        );

        assert_eq!(raw.arguments.len(), 1);
        assert_eq!(raw.arguments[0].register, Register::Rcx);
        assert!(
            matches!(raw.arguments[0].ty, Type::Pointer { .. }),
            "oversized aggregate travels by hidden pointer"
        );
    }

    #[test]
    fn test_oversized_aggregate_return_uses_hidden_pointer() {
        let mut model = Model::new();
        let abi = AbiDescription::systemv_x86_64();
        let big = model.record_new_type(TypeDefinition::Struct(StructDefinition {
            id: 0,
            custom_name: String::new(),
            original_name: String::new(),
            fields: vec![StructField {
                offset: 0,
                name: String::new(),
                ty: Type::Array { element: Box::new(Type::unsigned(8)), count: 8 },
            }],
            size: 64,
        }));

        let raw = convert_to_raw(
            &cabi(vec![Type::signed(4)], Type::defined(big), &abi),
            &model,
            &abi,
        );

        // The hidden pointer lands in the first integer register,
        // pushing the declared parameter to the second.
        assert_eq!(raw.arguments.len(), 2);
        assert_eq!(raw.arguments[0].register, Register::Rdi);
        assert!(matches!(raw.arguments[0].ty, Type::Pointer { .. }));
        assert_eq!(raw.arguments[1].register, Register::Rsi);
        assert_eq!(raw.return_values.len(), 1);
        assert!(matches!(raw.return_values[0].ty, Type::Pointer { .. }));
    }

    #[test]
    fn test_multi_register_return_synthesizes_struct() {
        let mut model = Model::new();
        let abi = AbiDescription::systemv_x86_64();
        let raw = RawFunctionDefinition {
            id: 9,
            custom_name: String::new(),
            original_name: String::new(),
            arguments: Vec::new(),
            return_values: vec![
                RawReturnValue { register: Register::Rax, ty: Type::unsigned(8) },
                RawReturnValue { register: Register::Rdx, ty: Type::unsigned(8) },
            ],
            stack_arguments: Vec::new(),
        };

        let before = model.len();
        let back = try_convert_to_cabi(&raw, &mut model, &abi).expect("pair return must classify");

        assert_eq!(model.len(), before + 1, "exactly one synthesized struct");
        let Type::Defined(reference) = &back.return_type else {
            panic!("return type must reference the synthesized struct");
        };
        let synthesized = model.resolve(reference).expect("synthesized struct resolves");
        assert_eq!(synthesized.size(&model), Some(16));
    }

    #[test]
    fn test_impossible_return_combination_is_rejected() {
        let mut model = Model::new();
        let abi = AbiDescription::microsoft_x64();
        // Microsoft x64 has a single integer return register.
        let raw = RawFunctionDefinition {
            id: 9,
            custom_name: String::new(),
            original_name: String::new(),
            arguments: Vec::new(),
            return_values: vec![
                RawReturnValue { register: Register::Rax, ty: Type::unsigned(8) },
                RawReturnValue { register: Register::Rdx, ty: Type::unsigned(8) },
            ],
            stack_arguments: Vec::new(),
        };

        assert_eq!(try_convert_to_cabi(&raw, &mut model, &abi), None);
    }
}
