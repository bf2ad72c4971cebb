//! Schema-driven planning.
//!
//! Turns prior state plus proposed configuration into a [`PlanResult`]
//! using only the hints recorded on each [`Attribute`]: defaults,
//! `use_state_for_unknown`, and `force_new`. Null in a planned state means
//! "known after apply".

use serde_json::{Map, Value};

use crate::schema::{Attribute, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Plan a resource change.
///
/// `prior_state` is `None` (or null) for a create; a null `proposed_state`
/// plans a destroy.
pub fn plan_resource(
    schema: &Schema,
    prior_state: Option<&Value>,
    proposed_state: &Value,
) -> PlanResult {
    let prior = prior_state.and_then(Value::as_object);

    if proposed_state.is_null() {
        return plan_destroy(schema, prior);
    }

    let mut planned = Map::new();
    for (name, attr) in &schema.block.attributes {
        let value = configured(attr, proposed_state.get(name))
            .or_else(|| attr.default.clone())
            .or_else(|| carried_state(attr, prior, name))
            .unwrap_or(Value::Null);
        planned.insert(name.clone(), value);
    }

    let changes: Vec<AttributeChange> = schema
        .block
        .attributes
        .iter()
        .filter(|(_, attr)| attr.flags.is_configurable())
        .filter_map(|(name, _)| {
            let before = prior.and_then(|p| non_null(p.get(name)));
            let after = non_null(planned.get(name));
            (before != after).then(|| AttributeChange::new(name.clone(), before, after))
        })
        .collect();

    let Some(prior) = prior else {
        return PlanResult::with_changes(Value::Object(planned), changes, false);
    };

    if changes.is_empty() {
        return PlanResult::no_change(Value::Object(prior.clone()));
    }

    let requires_replace = changes
        .iter()
        .any(|c| schema.attribute(&c.path).is_some_and(|a| a.force_new));

    if requires_replace {
        // A replacement starts from nothing: prior computed values do not survive.
        for (name, attr) in &schema.block.attributes {
            if attr.flags.computed
                && attr.default.is_none()
                && configured(attr, proposed_state.get(name)).is_none()
            {
                planned.insert(name.clone(), Value::Null);
            }
        }
    }

    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

fn plan_destroy(schema: &Schema, prior: Option<&Map<String, Value>>) -> PlanResult {
    let changes = match prior {
        Some(prior) => schema
            .block
            .attributes
            .iter()
            .filter(|(_, attr)| attr.flags.is_configurable())
            .filter_map(|(name, _)| {
                non_null(prior.get(name)).map(|v| AttributeChange::new(name.clone(), Some(v), None))
            })
            .collect(),
        None => Vec::new(),
    };
    PlanResult::with_changes(Value::Null, changes, false)
}

fn configured(attr: &Attribute, value: Option<&Value>) -> Option<Value> {
    if attr.flags.is_configurable() {
        non_null(value)
    } else {
        None
    }
}

fn carried_state(attr: &Attribute, prior: Option<&Map<String, Value>>, name: &str) -> Option<Value> {
    if attr.flags.computed && attr.use_state_for_unknown {
        prior.and_then(|p| non_null(p.get(name)))
    } else {
        None
    }
}

fn non_null(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}
