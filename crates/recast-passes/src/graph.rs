//! Dependency graph over a model's definitions
//!
//! Nodes are definition keys; a forward edge T → U exists whenever T's
//! representation structurally mentions U. Cycles are expected
//! (recursive structures), so reachability uses an iterative traversal
//! guarded by a visited set.

use recast_model::{DefinitionKey, Model};
use rustc_hash::{FxHashMap, FxHashSet};

/// Immutable snapshot of a model's type dependency graph.
#[derive(Debug, Clone)]
pub struct TypeGraph {
    successors: FxHashMap<DefinitionKey, Vec<DefinitionKey>>,
}

impl TypeGraph {
    /// Build the graph: one node per definition, edges from each
    /// definition's structural mentions. Dangling edges (targets absent
    /// from the model) are dropped.
    pub fn build(model: &Model) -> Self {
        let mut successors =
            FxHashMap::with_capacity_and_hasher(model.len(), Default::default());
        for definition in model.definitions() {
            let edges = definition
                .edges()
                .into_iter()
                .filter(|target| model.contains_key(*target))
                .collect();
            successors.insert(definition.key(), edges);
        }
        TypeGraph { successors }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.successors.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }

    /// Whether `key` is a node of this graph.
    pub fn contains(&self, key: DefinitionKey) -> bool {
        self.successors.contains_key(&key)
    }

    /// The closure of `root` under forward edges, root included.
    ///
    /// Iterative depth-first traversal with a visited set, so cyclic
    /// graphs terminate. Deterministic for a given graph.
    pub fn reachable_from(&self, root: DefinitionKey) -> FxHashSet<DefinitionKey> {
        assert!(self.contains(root), "root {root} is not a node of the graph");

        let mut visited = FxHashSet::default();
        let mut stack = vec![root];
        visited.insert(root);
        while let Some(current) = stack.pop() {
            for &successor in &self.successors[&current] {
                if visited.insert(successor) {
                    stack.push(successor);
                }
            }
        }
        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recast_model::{Type, TypeDefinition, TypedefDefinition};

    fn typedef(underlying: Type) -> TypeDefinition {
        TypeDefinition::Typedef(TypedefDefinition {
            id: 0,
            custom_name: String::new(),
            original_name: String::new(),
            underlying,
        })
    }

    #[test]
    fn test_reachability_follows_edges() {
        let mut model = Model::new();
        let leaf = model.record_new_type(typedef(Type::unsigned(4)));
        let mid = model.record_new_type(typedef(Type::defined(leaf)));
        let root = model.record_new_type(typedef(Type::defined(mid)));
        let unrelated = model.record_new_type(typedef(Type::unsigned(8)));

        let graph = TypeGraph::build(&model);
        let reachable = graph.reachable_from(root);

        assert!(reachable.contains(&root));
        assert!(reachable.contains(&mid));
        assert!(reachable.contains(&leaf));
        assert!(!reachable.contains(&unrelated));
    }

    #[test]
    fn test_cycle_terminates() {
        let mut model = Model::new();
        // Two typedefs pointing at each other through pointers.
        let a = model.record_new_type(typedef(Type::unsigned(8)));
        let b = model.record_new_type(typedef(Type::pointer(Type::defined(a), 8)));
        if let Some(TypeDefinition::Typedef(d)) = model.get_mut(a) {
            d.underlying = Type::pointer(Type::defined(b), 8);
        }

        let graph = TypeGraph::build(&model);
        let reachable = graph.reachable_from(a);
        assert_eq!(reachable.len(), 2);
    }

    #[test]
    fn test_reachability_is_deterministic() {
        let mut model = Model::new();
        let leaf = model.record_new_type(typedef(Type::unsigned(4)));
        let root = model.record_new_type(typedef(Type::defined(leaf)));

        let graph = TypeGraph::build(&model);
        assert_eq!(graph.reachable_from(root), graph.reachable_from(root));
    }

    #[test]
    #[should_panic(expected = "is not a node")]
    fn test_unknown_root_panics() {
        let model = Model::new();
        let graph = TypeGraph::build(&model);
        graph.reachable_from(recast_model::DefinitionKey::new(
            1,
            recast_model::DefinitionKind::Struct,
        ));
    }
}
