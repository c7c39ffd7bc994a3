//! Cross-model type transplantation
//!
//! A `TypeCopier` copies a closed subset of definitions from a source
//! model into a destination model. Copying and reference repair are two
//! strictly sequential phases: `copy_type_into` may run any number of
//! times, then `finalize` runs exactly once and rewrites every
//! reference inside the new definitions from source identities to
//! destination identities.

use crate::graph::TypeGraph;
use recast_model::{DefinitionKey, Model};
use rustc_hash::FxHashMap;
use tracing::trace;

/// Copies closed subsets of type definitions between two models.
///
/// The dependency graph over the source model is built lazily on the
/// first copy and snapshot for the copier's lifetime; callers must not
/// mutate the source while a copier is live.
pub struct TypeCopier<'s, 'd> {
    source: &'s Model,
    destination: &'d mut Model,
    /// Old source id → new destination id, grown monotonically.
    already_copied: FxHashMap<u64, u64>,
    /// Keys of the definitions created in the destination, in creation
    /// order; the set `finalize` repairs.
    new_types: Vec<DefinitionKey>,
    graph: Option<TypeGraph>,
    finalized: bool,
}

impl<'s, 'd> TypeCopier<'s, 'd> {
    /// Bind a copier to a (source, destination) model pair.
    pub fn new(source: &'s Model, destination: &'d mut Model) -> Self {
        TypeCopier {
            source,
            destination,
            already_copied: FxHashMap::default(),
            new_types: Vec::new(),
            graph: None,
            finalized: false,
        }
    }

    /// Copy `root` and everything it transitively depends on into the
    /// destination model, returning `root`'s destination key.
    ///
    /// `root` must be present in the source model and the copier must
    /// not be finalized; both are programming errors, not recoverable
    /// conditions. Definitions copied by earlier calls are skipped.
    /// References inside the new definitions still point into the
    /// source until `finalize` runs.
    pub fn copy_type_into(&mut self, root: DefinitionKey) -> DefinitionKey {
        assert!(!self.finalized, "copy_type_into after finalize()");
        assert!(
            self.source.contains_key(root),
            "root {root} is absent from the source model"
        );

        let graph = self
            .graph
            .get_or_insert_with(|| TypeGraph::build(self.source));
        let reachable = graph.reachable_from(root);

        // Scan the whole source container in declaration order; the
        // closure is usually a small fraction of it, but the scan keeps
        // id assignment deterministic across repeated copies.
        for definition in self.source.definitions() {
            let old_key = definition.key();
            if !reachable.contains(&old_key) || self.already_copied.contains_key(&old_key.id) {
                continue;
            }

            let mut clone = definition.clone();
            // The destination assigns a fresh identity.
            clone.set_id(0);
            // The source model stops being authoritative for this
            // definition; keep the only human-readable label.
            clone.migrate_names();

            let new_key = self.destination.record_new_type(clone);
            let previous = self.already_copied.insert(old_key.id, new_key.id);
            assert!(previous.is_none(), "definition {old_key} copied twice");
            self.new_types.push(new_key);
            trace!(%old_key, %new_key, "copied definition");
        }

        self.destination.rebuild_reference_index();

        let new_id = self.already_copied[&root.id];
        DefinitionKey::new(new_id, root.kind)
    }

    /// Number of definitions copied so far.
    pub fn copied_count(&self) -> usize {
        self.already_copied.len()
    }

    /// Rewrite every reference inside the newly created destination
    /// definitions from source keys to destination keys.
    ///
    /// Callable exactly once, strictly after all desired
    /// `copy_type_into` calls. Every non-empty reference inside a new
    /// definition must resolve through the old→new map — the copied
    /// set is closed under the dependency relation by construction, so
    /// a miss is a fatal invariant violation.
    pub fn finalize(&mut self) {
        assert!(!self.finalized, "finalize() called twice");
        self.finalized = true;

        let TypeCopier { destination, already_copied, new_types, .. } = self;
        for &new_key in new_types.iter() {
            let definition = destination
                .get_mut(new_key)
                .expect("newly created definition vanished from the destination");
            definition.visit_references_mut(&mut |reference| {
                let Some(old) = reference.key() else {
                    return;
                };
                let new_id = *already_copied
                    .get(&old.id)
                    .unwrap_or_else(|| panic!("reference to {old} escapes the copied closure"));
                reference.set_key(DefinitionKey::new(new_id, old.kind));
            });
            trace!(%new_key, "references rewritten");
        }
    }
}

impl Drop for TypeCopier<'_, '_> {
    fn drop(&mut self) {
        // Mirror of the construction-time contract: a copier must be
        // finalized before it goes away, or the destination is left
        // with references into the source.
        if !self.finalized && !std::thread::panicking() {
            panic!("TypeCopier dropped without finalize()");
        }
    }
}
