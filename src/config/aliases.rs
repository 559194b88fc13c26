//! Field-name aliases for HuggingFace-style model configs
//!
//! Different model families spell the same logical field differently
//! (`num_experts` vs `n_routed_experts`, ...). Every alias is listed here and
//! consulted once while a [`ModelConfig`](super::ModelConfig) is built; the
//! formulas only ever see the resolved value.

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Logical field name -> raw field names, in lookup priority order
pub static FIELD_ALIASES: Lazy<HashMap<&'static str, &'static [&'static str]>> =
    Lazy::new(|| {
        let mut aliases: HashMap<&'static str, &'static [&'static str]> = HashMap::new();

        aliases.insert(
            "num_routed_experts",
            &["num_routed_experts", "num_experts", "n_routed_experts"],
        );
        aliases.insert(
            "moe_intermediate_size",
            &["moe_intermediate_size", "intermediate_size"],
        );
        aliases.insert(
            "num_shared_experts",
            &["num_shared_experts", "n_shared_experts"],
        );

        aliases
    });

/// Raw names consulted for `field`; a field without aliases is looked up verbatim
pub fn raw_names(field: &str) -> Vec<&str> {
    match FIELD_ALIASES.get(field) {
        Some(names) => names.to_vec(),
        None => vec![field],
    }
}

/// Look up a logical field, honouring aliases. JSON `null` counts as absent.
pub fn lookup<'a>(raw: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    raw_names(field)
        .into_iter()
        .filter_map(|name| raw.get(name))
        .find(|value| !value.is_null())
}

/// Whether any alias of `field` carries a non-null value
pub fn contains(raw: &Map<String, Value>, field: &str) -> bool {
    lookup(raw, field).is_some()
}
