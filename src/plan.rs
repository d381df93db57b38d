//! Schema-driven planning shared by every resource.
//!
//! A plan starts from the proposed (configured) object, fills in attribute
//! defaults, carries computed values over from the prior state, and diffs the
//! result against the prior state one top-level attribute at a time. Set
//! attributes are sorted and deduplicated so ordering never shows as a change.
//! Empty strings and empty lists compare equal to an unset value.

use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::schema::{AttributeType, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Plan a create (`prior` is `None`), an update, or a delete (`proposed` is null).
pub fn plan(schema: &Schema, prior: Option<Value>, proposed: Value) -> Result<PlanResult, ProviderError> {
    let prior = match prior {
        Some(Value::Null) | None => None,
        Some(Value::Object(map)) => Some(map),
        Some(other) => {
            return Err(ProviderError::Validation(format!(
                "prior state must be an object, got {}",
                other
            )))
        }
    };

    let proposed = match proposed {
        Value::Null => return Ok(plan_delete(prior)),
        Value::Object(map) => map,
        other => {
            return Err(ProviderError::Validation(format!(
                "proposed state must be an object, got {}",
                other
            )))
        }
    };

    let planned = planned_state(schema, prior.as_ref(), proposed);
    let empty = Map::new();
    let changes = diff(prior.as_ref().unwrap_or(&empty), &planned);

    let requires_replace = prior.is_some()
        && changes.iter().any(|change| {
            schema
                .attribute(&change.path)
                .map(|attr| attr.force_new)
                .unwrap_or(false)
        });

    Ok(PlanResult::with_changes(Value::Object(planned), changes, requires_replace))
}

fn plan_delete(prior: Option<Map<String, Value>>) -> PlanResult {
    let changes = prior
        .into_iter()
        .flatten()
        .filter(|(_, value)| !value.is_null())
        .map(|(path, value)| AttributeChange::removed(path, value))
        .collect();
    PlanResult::with_changes(Value::Null, changes, false)
}

fn planned_state(
    schema: &Schema,
    prior: Option<&Map<String, Value>>,
    mut planned: Map<String, Value>,
) -> Map<String, Value> {
    for (name, attr) in &schema.block.attributes {
        let unset = planned.get(name).map(Value::is_null).unwrap_or(true);
        if !unset {
            // The server stores "" and [] as unset.
            if !attr.flags.computed && planned.get(name).map(is_empty).unwrap_or(false) {
                planned.insert(name.clone(), Value::Null);
                continue;
            }
            if matches!(attr.attr_type, AttributeType::Set(_)) {
                if let Some(Value::Array(items)) = planned.get_mut(name) {
                    normalize_set(items);
                }
            }
            continue;
        }

        let prior_value = prior
            .and_then(|p| p.get(name))
            .filter(|v| !v.is_null())
            .cloned();

        if let Some(default) = &attr.default {
            planned.insert(name.clone(), default.clone());
        } else if attr.flags.computed {
            if let Some(value) = prior_value {
                planned.insert(name.clone(), value);
            }
        }
    }
    planned
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        other => other.is_null(),
    }
}

fn normalize_set(items: &mut Vec<Value>) {
    items.sort_by_key(|item| item.to_string());
    items.dedup();
}

fn diff(prior: &Map<String, Value>, planned: &Map<String, Value>) -> Vec<AttributeChange> {
    let mut changes = Vec::new();

    for (path, after) in planned {
        match prior.get(path).filter(|v| !is_empty(v)) {
            None if is_empty(after) => {}
            None => changes.push(AttributeChange::added(path.clone(), after.clone())),
            Some(before) if is_empty(after) => {
                changes.push(AttributeChange::removed(path.clone(), before.clone()))
            }
            Some(before) if before != after => changes.push(AttributeChange::modified(
                path.clone(),
                before.clone(),
                after.clone(),
            )),
            Some(_) => {}
        }
    }

    for (path, before) in prior {
        if !is_empty(before) && !planned.contains_key(path) {
            changes.push(AttributeChange::removed(path.clone(), before.clone()));
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use crate::testing::{
        assert_plan_changes_attribute, assert_plan_creates, assert_plan_no_changes, assert_plan_replaces,
        assert_plan_updates_in_place,
    };
    use serde_json::json;

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute("key", Attribute::required_string().with_force_new())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("handle_releases", Attribute::optional_bool().with_default(json!(true)))
            .with_attribute("id", Attribute::computed_string())
    }

    #[test]
    fn test_plan_create_fills_defaults() {
        let result = plan(&schema(), None, json!({"key": "libs"})).unwrap();
        assert_plan_creates(&result);
        assert_eq!(result.planned_state["handle_releases"], json!(true));
        assert!(result.planned_state.get("id").is_none());
        assert_plan_changes_attribute(&result, "key");
        assert_plan_changes_attribute(&result, "handle_releases");
    }

    #[test]
    fn test_plan_no_changes_keeps_computed() {
        let prior = json!({"key": "libs", "handle_releases": true, "id": "libs"});
        let result = plan(&schema(), Some(prior.clone()), json!({"key": "libs"})).unwrap();
        assert_plan_no_changes(&result);
        assert_eq!(result.planned_state, prior);
    }

    #[test]
    fn test_plan_update_in_place() {
        let prior = json!({"key": "libs", "handle_releases": true, "id": "libs"});
        let result = plan(
            &schema(),
            Some(prior),
            json!({"key": "libs", "description": "gradle builds", "handle_releases": false}),
        )
        .unwrap();
        assert_plan_updates_in_place(&result);
        assert_plan_changes_attribute(&result, "description");
        assert_plan_changes_attribute(&result, "handle_releases");
        assert_eq!(result.changes.len(), 2);
    }

    #[test]
    fn test_plan_force_new_replaces() {
        let prior = json!({"key": "libs", "handle_releases": true, "id": "libs"});
        let result = plan(&schema(), Some(prior), json!({"key": "libs-release"})).unwrap();
        assert_plan_replaces(&result);
        assert_plan_changes_attribute(&result, "key");
    }

    #[test]
    fn test_plan_removed_optional_attribute() {
        let prior = json!({"key": "libs", "description": "old", "handle_releases": true});
        let result = plan(&schema(), Some(prior), json!({"key": "libs", "description": null})).unwrap();
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].path, "description");
        assert!(result.changes[0].after.is_none());
    }

    #[test]
    fn test_plan_set_order_is_not_a_change() {
        let schema = schema().with_attribute("environments", Attribute::optional_string_set());
        let prior = json!({"key": "libs", "handle_releases": true, "environments": ["DEV", "PROD"]});
        let result = plan(
            &schema,
            Some(prior),
            json!({"key": "libs", "environments": ["PROD", "DEV", "PROD"]}),
        )
        .unwrap();
        assert_plan_no_changes(&result);
        assert_eq!(result.planned_state["environments"], json!(["DEV", "PROD"]));
    }

    #[test]
    fn test_plan_empty_values_are_unset() {
        let prior = json!({"key": "libs", "handle_releases": true, "id": "libs"});
        let result = plan(&schema(), Some(prior), json!({"key": "libs", "description": ""})).unwrap();
        assert_plan_no_changes(&result);
        assert!(result.planned_state["description"].is_null());
    }

    #[test]
    fn test_plan_optional_computed_attribute() {
        let schema = schema().with_attribute("members", Attribute::optional_computed_string_set());
        let prior = json!({"key": "libs", "handle_releases": true, "id": "libs", "members": ["alice"]});

        let result = plan(&schema, Some(prior.clone()), json!({"key": "libs"})).unwrap();
        assert_plan_no_changes(&result);
        assert_eq!(result.planned_state["members"], json!(["alice"]));

        let result = plan(&schema, Some(prior), json!({"key": "libs", "members": []})).unwrap();
        assert_plan_updates_in_place(&result);
        assert_plan_changes_attribute(&result, "members");
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.planned_state["members"], json!([]));
        assert!(result.changes[0].after.is_none());
    }

    #[test]
    fn test_plan_delete() {
        let prior = json!({"key": "libs", "id": "libs"});
        let result = plan(&schema(), Some(prior), Value::Null).unwrap();
        assert!(result.planned_state.is_null());
        assert_eq!(result.changes.len(), 2);
        assert!(!result.requires_replace);
    }

    #[test]
    fn test_plan_rejects_non_objects() {
        assert!(plan(&schema(), None, json!("libs")).is_err());
        assert!(plan(&schema(), Some(json!([1])), json!({})).is_err());
    }
}
