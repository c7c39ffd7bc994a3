//! Bulk function-type conversion passes
//!
//! Model-wide conversion of function types between the two forms. Each
//! converted definition goes through the same progression: selected,
//! converted, references rewritten, old entry erased. Verification
//! before and after a pass is advisory: a failure is logged and the
//! pass proceeds (non-transactional, best-effort).

use recast_abi::{convert_to_raw, try_convert_to_cabi, AbiDescription};
use recast_model::{DefinitionKey, DefinitionKind, Model, TypeDefinition};
use tracing::{debug, trace, warn};

/// Keys of every definition of `kind`, snapshot before a pass starts.
///
/// Definitions added mid-pass (synthesized return structs) are not
/// retroactively included.
fn select_keys(model: &Model, kind: DefinitionKind) -> Vec<DefinitionKey> {
    model.keys().filter(|key| key.kind == kind).collect()
}

/// Insert `new`, rewrite every reference from `old` to it, and erase
/// the old entry.
fn replace_definition(model: &mut Model, old: DefinitionKey, new: TypeDefinition) {
    let new_key = model.record_new_type(new);
    trace!(%old, %new_key, "converted");
    model.replace_references(old, new_key);
    trace!(%old, %new_key, "references rewritten");
    model.remove(old);
    trace!(%old, "old entry erased");
}

/// Convert every ABI-form function type in `model` to raw
/// register/stack form.
///
/// The ABI comes from each definition's own tag; an unresolvable tag is
/// an expected per-type skip, not an error. Every reference to a
/// converted definition's old key is rewritten to the new key and the
/// old entry is erased.
pub fn convert_all_functions_to_raw(model: &mut Model) {
    if !model.verify() {
        warn!("input model verification failed before raw conversion; proceeding");
    }

    for old_key in select_keys(model, DefinitionKind::CabiFunction) {
        let Some(TypeDefinition::CabiFunction(old)) = model.get(old_key) else {
            continue;
        };
        trace!(%old_key, "selected");
        let Some(abi) = AbiDescription::named(&old.abi) else {
            debug!(%old_key, abi = %old.abi, "unknown ABI tag, leaving unconverted");
            continue;
        };

        let old = old.clone();
        let raw = convert_to_raw(&old, model, &abi);
        replace_definition(model, old_key, TypeDefinition::RawFunction(raw));
    }

    if !model.verify() {
        warn!("result model verification failed after raw conversion");
    }
}

/// Convert every raw function type in `model` that classifies under
/// `abi` to ABI-normalized form.
///
/// Definitions whose register/stack assignment is inconsistent with the
/// candidate ABI are left unconverted — a per-type skip, not a
/// pass-level error.
pub fn convert_all_functions_to_cabi(model: &mut Model, abi: &AbiDescription) {
    if !model.verify() {
        warn!("input model verification failed before ABI conversion; proceeding");
    }

    for old_key in select_keys(model, DefinitionKind::RawFunction) {
        let Some(TypeDefinition::RawFunction(old)) = model.get(old_key) else {
            continue;
        };
        trace!(%old_key, "selected");

        let old = old.clone();
        match try_convert_to_cabi(&old, model, abi) {
            Some(cabi) => {
                replace_definition(model, old_key, TypeDefinition::CabiFunction(cabi));
            }
            None => {
                debug!(%old_key, abi = %abi.name, "assignment does not classify, leaving unconverted");
            }
        }
    }

    if !model.verify() {
        warn!("result model verification failed after ABI conversion");
    }
}
