//! Validation of JSON configuration against a [`Schema`].
//!
//! # Example
//!
//! ```
//! use hemmer_provider_artifactory::schema::{Attribute, Schema, StringValidator};
//! use hemmer_provider_artifactory::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0().with_attribute(
//!     "url",
//!     Attribute::optional_string().with_validator(StringValidator::url_http_or_https()),
//! );
//!
//! assert!(validate(&schema, &json!({"url": "https://x.example"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"url": "ftp://x.example"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("url".to_string()));
//! ```

use crate::schema::{Attribute, AttributeType, Diagnostic, DiagnosticSeverity, Schema};
use serde_json::Value;
use std::collections::BTreeMap;

/// Validate a JSON value against a schema.
///
/// - required attributes must be present and non-null
/// - computed-only attributes are skipped
/// - values must match the declared type and pass every validator
/// - attributes the schema does not declare are rejected
/// - deprecated attributes that are set produce a warning
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match value {
        Value::Object(map) => map,
        Value::Null => {
            // An absent block is the same as an empty one.
            for (name, attr) in &schema.block.attributes {
                validate_attribute(attr, None, name, &mut diagnostics);
            }
            return diagnostics;
        },
        other => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(other))),
            );
            return diagnostics;
        },
    };

    for (name, attr) in &schema.block.attributes {
        validate_attribute(attr, obj.get(name), name, &mut diagnostics);
    }

    for name in obj.keys() {
        if !schema.block.attributes.contains_key(name) {
            diagnostics.push(
                Diagnostic::error(format!("Unsupported attribute '{}'", name))
                    .with_detail("An attribute with this name is not expected here")
                    .with_attribute(name.as_str()),
            );
        }
    }

    diagnostics
}

/// Validate, returning `Err` with only the error diagnostics if there are any.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let errors: Vec<_> = validate(schema, value)
        .into_iter()
        .filter(Diagnostic::is_error)
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check if a JSON value is valid against a schema. Warnings do not count.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate_result(schema, value).is_ok()
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            let before = diagnostics.len();
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            if diagnostics.len() == before {
                if let Value::String(s) = v {
                    for validator in &attr.validators {
                        if let Err(reason) = validator.check(s) {
                            diagnostics.push(
                                Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                                    .with_detail(reason)
                                    .with_attribute(path),
                            );
                        }
                    }
                }
            }
            if let Some(message) = &attr.deprecation_message {
                diagnostics.push(
                    Diagnostic::warning(format!("Attribute '{}' is deprecated", path))
                        .with_detail(message.clone())
                        .with_attribute(path),
                );
            }
        },
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) | AttributeType::Set(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                let expected = if matches!(attr_type, AttributeType::Set(_)) {
                    "set"
                } else {
                    "list"
                };
                diagnostics.push(type_error(path, expected, value));
            }
        },
        AttributeType::Map(value_type) => {
            if let Some(obj) = value.as_object() {
                for (key, val) in obj {
                    let key_path = format!("{}.{}", path, key);
                    validate_attribute_type(value_type, val, &key_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "map", value));
            }
        },
        AttributeType::Object(attrs) => {
            if let Some(obj) = value.as_object() {
                validate_object_type(attrs, obj, path, diagnostics);
            } else {
                diagnostics.push(type_error(path, "object", value));
            }
        },
    }
}

fn validate_object_type(
    attrs: &BTreeMap<String, AttributeType>,
    obj: &serde_json::Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, attr_type) in attrs {
        if let Some(value) = obj.get(name) {
            if !value.is_null() {
                let attr_path = format!("{}.{}", path, name);
                validate_attribute_type(attr_type, value, &attr_path, diagnostics);
            }
        }
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            if n.as_i64().is_some() {
                true
            } else if let Some(f) = n.as_f64() {
                f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
            } else {
                false
            }
        },
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Error,
        summary: format!("Invalid type for attribute '{}'", path),
        detail: Some(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        )),
        attribute: Some(path.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Schema, StringValidator};
    use serde_json::json;

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("key", Attribute::required_string());

        assert!(validate(&schema, &json!({"key": "libs-release"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("key".to_string()));

        let diagnostics = validate(&schema, &json!({"key": null}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"key": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_optional_attribute() {
        let schema = Schema::v0().with_attribute("max_unique_snapshots", Attribute::optional_int64());

        assert!(validate(&schema, &json!({"max_unique_snapshots": 5})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"max_unique_snapshots": null})).is_empty());
        assert_eq!(
            validate(&schema, &json!({"max_unique_snapshots": "five"})).len(),
            1
        );
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let schema = Schema::v0().with_attribute("id", Attribute::computed_string());

        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"id": 123})).is_empty());
    }

    #[test]
    fn test_validate_unknown_attribute() {
        let schema = Schema::v0().with_attribute("url", Attribute::optional_string());

        let diagnostics = validate(&schema, &json!({"uri": "https://x.example"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Unsupported attribute 'uri'"));
    }

    #[test]
    fn test_validate_string_validators() {
        let schema = Schema::v0()
            .with_attribute(
                "access_token",
                Attribute::optional_string().with_validator(StringValidator::length_at_least(1)),
            )
            .with_attribute(
                "checksum_policy_type",
                Attribute::optional_string().with_validator(StringValidator::one_of([
                    "client-checksums",
                    "server-generated-checksums",
                ])),
            );

        assert!(validate(
            &schema,
            &json!({"access_token": "t", "checksum_policy_type": "client-checksums"})
        )
        .is_empty());

        let diagnostics = validate(&schema, &json!({"access_token": ""}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("access_token".to_string()));

        let diagnostics = validate(&schema, &json!({"checksum_policy_type": "none"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0]
            .detail
            .as_deref()
            .unwrap_or_default()
            .contains("server-generated-checksums"));
    }

    #[test]
    fn test_deprecated_attribute_warns() {
        let schema = Schema::v0().with_attribute(
            "api_key",
            Attribute::optional_string().with_deprecation("Use access_token instead."),
        );

        assert!(validate(&schema, &json!({})).is_empty());

        let diagnostics = validate(&schema, &json!({"api_key": "k1"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Warning);
        assert!(is_valid(&schema, &json!({"api_key": "k1"})));
    }

    #[test]
    fn test_validate_collections() {
        let schema = Schema::v0()
            .with_attribute("groups", Attribute::optional_string_set())
            .with_attribute(
                "repos",
                Attribute::new(
                    AttributeType::list(AttributeType::object([
                        ("key", AttributeType::String),
                        ("type", AttributeType::String),
                    ])),
                    crate::schema::AttributeFlags::optional(),
                ),
            );

        assert!(validate(
            &schema,
            &json!({"groups": ["readers"], "repos": [{"key": "a", "type": "LOCAL"}]})
        )
        .is_empty());

        let diagnostics = validate(&schema, &json!({"groups": ["readers", 7]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("groups.1".to_string()));

        let diagnostics = validate(&schema, &json!({"repos": [{"key": 1}]}));
        assert_eq!(diagnostics[0].attribute, Some("repos.0.key".to_string()));
    }

    #[test]
    fn test_validate_result() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(validate_result(&schema, &json!({"name": "readers"})).is_ok());
        let errors = validate_result(&schema, &json!({})).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(!is_valid(&schema, &json!({})));
    }

    #[test]
    fn test_int64_accepts_integral_floats() {
        assert!(is_int64(&json!(42)));
        assert!(is_int64(&json!(42.0)));
        assert!(!is_int64(&json!(42.5)));
        assert!(!is_int64(&json!("42")));
    }
}
