//! The owning model container
//!
//! A `Model` owns an ordered, uniquely-keyed container of type
//! definitions and provides identity assignment, reference resolution,
//! whole-model reference visitation, and structural verification.

use crate::definition::TypeDefinition;
use crate::error::ModelError;
use crate::kind::{DefinitionKey, DefinitionReference};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use tracing::warn;

/// The owning container of all type definitions of one analyzed binary.
///
/// Definitions are held in key order, which matches their declaration
/// order because ids are assigned monotonically.
#[derive(Debug, Clone)]
pub struct Model {
    definitions: BTreeMap<DefinitionKey, TypeDefinition>,
    next_id: u64,
    /// Set of every key some reference in the model targets.
    /// Conservatively rebuilt wholesale via `rebuild_reference_index`.
    reference_index: FxHashSet<DefinitionKey>,
}

impl Default for Model {
    fn default() -> Self {
        Model::new()
    }
}

impl Model {
    /// Create an empty model.
    pub fn new() -> Self {
        Model {
            definitions: BTreeMap::new(),
            next_id: 1,
            reference_index: FxHashSet::default(),
        }
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the model holds no definitions.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: DefinitionKey) -> bool {
        self.definitions.contains_key(&key)
    }

    /// Look up a definition by key.
    pub fn get(&self, key: DefinitionKey) -> Option<&TypeDefinition> {
        self.definitions.get(&key)
    }

    /// Look up a definition by key, mutably.
    pub fn get_mut(&mut self, key: DefinitionKey) -> Option<&mut TypeDefinition> {
        self.definitions.get_mut(&key)
    }

    /// All definitions in declaration (key) order.
    pub fn definitions(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.definitions.values()
    }

    /// All keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = DefinitionKey> + '_ {
        self.definitions.keys().copied()
    }

    /// Insert a definition, assigning a fresh id if its id is the
    /// unassigned sentinel, and return its key.
    ///
    /// A preset non-zero id is kept as-is; the conversion passes rely
    /// on this to preserve ids across kind changes. Inserting a key
    /// that is already present is a programming error.
    pub fn record_new_type(&mut self, mut definition: TypeDefinition) -> DefinitionKey {
        if definition.id() == 0 {
            definition.set_id(self.next_id);
        }
        self.next_id = self.next_id.max(definition.id() + 1);

        let key = definition.key();
        let previous = self.definitions.insert(key, definition);
        assert!(previous.is_none(), "duplicate definition key {key}");
        key
    }

    /// Erase a definition, returning it if it was present.
    ///
    /// References targeting the erased key become dangling; callers are
    /// expected to rewrite them first.
    pub fn remove(&mut self, key: DefinitionKey) -> Option<TypeDefinition> {
        self.definitions.remove(&key)
    }

    /// Build a reference to `key`, which must be present.
    pub fn get_definition_reference(&self, key: DefinitionKey) -> DefinitionReference {
        assert!(self.contains_key(key), "no definition for {key}");
        DefinitionReference::to(key)
    }

    /// Resolve a reference to its definition, if the reference is
    /// non-empty and its target exists.
    pub fn resolve(&self, reference: &DefinitionReference) -> Option<&TypeDefinition> {
        self.get(reference.key()?)
    }

    /// Visit every `DefinitionReference` reachable anywhere in the
    /// model, mutably. This is the generic structural visitor the
    /// transformation passes use for whole-model rewrites.
    pub fn visit_references_mut(&mut self, f: &mut dyn FnMut(&mut DefinitionReference)) {
        for definition in self.definitions.values_mut() {
            definition.visit_references_mut(f);
        }
    }

    /// Rewrite every reference targeting `old` to target `new` instead,
    /// and update the reference index accordingly.
    pub fn replace_references(&mut self, old: DefinitionKey, new: DefinitionKey) {
        self.visit_references_mut(&mut |reference| {
            if reference.key() == Some(old) {
                reference.set_key(new);
            }
        });
        if self.reference_index.remove(&old) {
            self.reference_index.insert(new);
        }
    }

    /// Recompute the reference index from scratch.
    ///
    /// Deliberately a whole rebuild rather than an incremental update;
    /// the copier calls this once per copy scan.
    pub fn rebuild_reference_index(&mut self) {
        let mut index = FxHashSet::default();
        for definition in self.definitions.values() {
            definition.visit_references(&mut |reference| {
                if let Some(key) = reference.key() {
                    index.insert(key);
                }
            });
        }
        self.reference_index = index;
    }

    /// Whether any reference targets `key`, per the current index.
    pub fn is_referenced(&self, key: DefinitionKey) -> bool {
        self.reference_index.contains(&key)
    }

    /// Structural consistency check, reporting the first violation.
    pub fn check(&self) -> Result<(), ModelError> {
        for (&stored, definition) in &self.definitions {
            if definition.key() != stored {
                return Err(ModelError::KeyMismatch { stored, actual: definition.key() });
            }
            if !stored.is_assigned() {
                return Err(ModelError::UnassignedId { key: stored });
            }

            let mut dangling = None;
            definition.visit_references(&mut |reference| {
                if let Some(target) = reference.key() {
                    if dangling.is_none() && !self.definitions.contains_key(&target) {
                        dangling = Some(target);
                    }
                }
            });
            if let Some(target) = dangling {
                return Err(ModelError::UnresolvedReference { holder: stored, target });
            }

            match definition {
                TypeDefinition::Enum(e) if e.entries.is_empty() => {
                    return Err(ModelError::EmptyEnum { key: stored });
                }
                TypeDefinition::Struct(s) => {
                    let mut previous = None;
                    for field in &s.fields {
                        if previous.is_some_and(|p| field.offset < p) {
                            return Err(ModelError::MisorderedField {
                                key: stored,
                                offset: field.offset,
                            });
                        }
                        previous = Some(field.offset);
                        if s.size > 0 && field.offset >= s.size {
                            return Err(ModelError::FieldPastEnd {
                                key: stored,
                                offset: field.offset,
                                size: s.size,
                            });
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Structural verification: logs the first violation and reports
    /// success as a boolean. Callers treat a failure as advisory.
    pub fn verify(&self) -> bool {
        match self.check() {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, "model verification failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{
        EnumDefinition, EnumEntry, StructDefinition, StructField, TypedefDefinition,
    };
    use crate::kind::DefinitionKind;
    use crate::ty::Type;

    fn typedef(underlying: Type) -> TypeDefinition {
        TypeDefinition::Typedef(TypedefDefinition {
            id: 0,
            custom_name: String::new(),
            original_name: String::new(),
            underlying,
        })
    }

    #[test]
    fn test_record_assigns_fresh_ids() {
        let mut model = Model::new();
        let a = model.record_new_type(typedef(Type::unsigned(4)));
        let b = model.record_new_type(typedef(Type::unsigned(8)));

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(model.len(), 2);
    }

    #[test]
    fn test_record_keeps_preset_id() {
        let mut model = Model::new();
        let mut def = typedef(Type::unsigned(4));
        def.set_id(40);
        let key = model.record_new_type(def);

        assert_eq!(key.id, 40);
        // The next fresh id continues past the preset one.
        let next = model.record_new_type(typedef(Type::unsigned(8)));
        assert_eq!(next.id, 41);
    }

    #[test]
    #[should_panic(expected = "duplicate definition key")]
    fn test_record_duplicate_key_panics() {
        let mut model = Model::new();
        let mut def = typedef(Type::unsigned(4));
        def.set_id(7);
        model.record_new_type(def.clone());
        model.record_new_type(def);
    }

    #[test]
    fn test_replace_references_rewrites_whole_model() {
        let mut model = Model::new();
        let target = model.record_new_type(typedef(Type::unsigned(4)));
        let holder = model.record_new_type(typedef(Type::defined(target)));

        let replacement = model.record_new_type(typedef(Type::unsigned(8)));
        model.replace_references(target, replacement);

        let rewritten = model.get(holder).unwrap();
        assert_eq!(rewritten.edges(), vec![replacement]);
    }

    #[test]
    fn test_check_detects_dangling_reference() {
        let mut model = Model::new();
        let target = model.record_new_type(typedef(Type::unsigned(4)));
        let holder = model.record_new_type(typedef(Type::defined(target)));
        model.remove(target);

        assert_eq!(
            model.check(),
            Err(ModelError::UnresolvedReference { holder, target })
        );
        assert!(!model.verify());
    }

    #[test]
    fn test_check_detects_empty_enum() {
        let mut model = Model::new();
        let key = model.record_new_type(TypeDefinition::Enum(EnumDefinition {
            id: 0,
            custom_name: String::new(),
            original_name: String::new(),
            underlying: Type::unsigned(4),
            entries: Vec::new(),
        }));

        assert_eq!(model.check(), Err(ModelError::EmptyEnum { key }));
    }

    #[test]
    fn test_check_detects_misordered_fields() {
        let mut model = Model::new();
        let key = model.record_new_type(TypeDefinition::Struct(StructDefinition {
            id: 0,
            custom_name: String::new(),
            original_name: String::new(),
            fields: vec![
                StructField { offset: 8, name: String::new(), ty: Type::unsigned(4) },
                StructField { offset: 0, name: String::new(), ty: Type::unsigned(4) },
            ],
            size: 16,
        }));

        assert_eq!(
            model.check(),
            Err(ModelError::MisorderedField { key, offset: 0 })
        );
    }

    #[test]
    fn test_reference_index_rebuild() {
        let mut model = Model::new();
        let target = model.record_new_type(typedef(Type::unsigned(4)));
        model.record_new_type(typedef(Type::defined(target)));

        assert!(!model.is_referenced(target));
        model.rebuild_reference_index();
        assert!(model.is_referenced(target));
    }

    #[test]
    fn test_enum_check_accepts_populated_enum() {
        let mut model = Model::new();
        model.record_new_type(TypeDefinition::Enum(EnumDefinition {
            id: 0,
            custom_name: String::new(),
            original_name: String::new(),
            underlying: Type::unsigned(4),
            entries: vec![EnumEntry {
                value: 1,
                custom_name: String::new(),
                original_name: "one".into(),
            }],
        }));
        assert!(model.check().is_ok());
    }
}
