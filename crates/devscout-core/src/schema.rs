//! Schema descriptors for model output.
//!
//! A descriptor lists the fields a model must produce. `validate` is the only way to
//! obtain a [`SchemaInstance`]: it checks types, fills defaults for absent optional
//! fields, canonicalizes choice values and drops keys the schema does not name.

use crate::record::PricingModel;
use crate::CoercionError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// String. Absent or null becomes "".
    Text,
    /// String or null. Placeholder strings ("unknown", "n/a") become null.
    OptionalText,
    /// Array of strings. A bare string is split on commas.
    TextList,
    /// Boolean. Absent or null becomes false.
    Bool,
    /// Boolean or null (unknown).
    OptionalBool,
    /// One of a fixed set, matched case-insensitively. Unrecognized strings become `default`.
    Choice {
        options: &'static [&'static str],
        default: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Required fields must be present; required text must also be non-empty.
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct SchemaDescriptor {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

/// A value that passed [`SchemaDescriptor::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaInstance {
    schema: &'static str,
    value: Value,
}

impl SchemaInstance {
    pub fn schema_name(&self) -> &'static str {
        self.schema
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, CoercionError> {
        let raw = self.value.to_string();
        serde_json::from_value(self.value).map_err(|e| CoercionError::SchemaMismatch {
            schema: self.schema,
            detail: e.to_string(),
            raw,
        })
    }
}

fn is_placeholder(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "" | "unknown" | "n/a" | "na" | "none" | "null" | "-"
    )
}

fn bool_from_str(s: &str) -> Option<Option<bool>> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" => Some(Some(true)),
        "false" | "no" | "n" => Some(Some(false)),
        "" | "unknown" | "n/a" | "null" => Some(None),
        _ => None,
    }
}

impl FieldSpec {
    fn normalize(&self, v: Option<Value>) -> Result<Value, String> {
        let v = match v {
            None | Some(Value::Null) => {
                if self.required {
                    return Err(format!("missing required field `{}`", self.name));
                }
                None
            }
            Some(v) => Some(v),
        };

        match self.kind {
            FieldKind::Text => match v {
                None => Ok(Value::String(String::new())),
                Some(Value::String(s)) => {
                    let s = s.trim().to_string();
                    if self.required && s.is_empty() {
                        return Err(format!("field `{}` is empty", self.name));
                    }
                    Ok(Value::String(s))
                }
                Some(other) => Err(format!("field `{}` expected string, got {other}", self.name)),
            },
            FieldKind::OptionalText => match v {
                None => Ok(Value::Null),
                Some(Value::String(s)) if is_placeholder(&s) => Ok(Value::Null),
                Some(Value::String(s)) => Ok(Value::String(s.trim().to_string())),
                Some(other) => Err(format!("field `{}` expected string, got {other}", self.name)),
            },
            FieldKind::TextList => {
                let items: Vec<String> = match v {
                    None => Vec::new(),
                    Some(Value::String(s)) => s.split(',').map(|p| p.to_string()).collect(),
                    Some(Value::Array(xs)) => {
                        let mut out = Vec::with_capacity(xs.len());
                        for x in xs {
                            match x {
                                Value::String(s) => out.push(s),
                                Value::Number(n) => out.push(n.to_string()),
                                Value::Null => {}
                                other => {
                                    return Err(format!(
                                        "field `{}` expected array of strings, got element {other}",
                                        self.name
                                    ))
                                }
                            }
                        }
                        out
                    }
                    Some(other) => {
                        return Err(format!("field `{}` expected array, got {other}", self.name))
                    }
                };
                Ok(Value::Array(
                    items
                        .into_iter()
                        .map(|s| s.trim().to_string())
                        .filter(|s| !is_placeholder(s))
                        .map(Value::String)
                        .collect(),
                ))
            }
            FieldKind::Bool => match v {
                None => Ok(Value::Bool(false)),
                Some(Value::Bool(b)) => Ok(Value::Bool(b)),
                Some(Value::String(s)) => match bool_from_str(&s) {
                    Some(b) => Ok(Value::Bool(b.unwrap_or(false))),
                    None => Err(format!("field `{}` expected boolean, got {s:?}", self.name)),
                },
                Some(other) => Err(format!("field `{}` expected boolean, got {other}", self.name)),
            },
            FieldKind::OptionalBool => match v {
                None => Ok(Value::Null),
                Some(Value::Bool(b)) => Ok(Value::Bool(b)),
                Some(Value::String(s)) => match bool_from_str(&s) {
                    Some(b) => Ok(b.map(Value::Bool).unwrap_or(Value::Null)),
                    None => Err(format!("field `{}` expected boolean, got {s:?}", self.name)),
                },
                Some(other) => Err(format!("field `{}` expected boolean, got {other}", self.name)),
            },
            FieldKind::Choice { options, default } => match v {
                None => Ok(Value::String(default.to_string())),
                Some(Value::String(s)) => {
                    let hit = options
                        .iter()
                        .find(|o| o.eq_ignore_ascii_case(s.trim()))
                        .copied()
                        .unwrap_or(default);
                    Ok(Value::String(hit.to_string()))
                }
                Some(other) => Err(format!("field `{}` expected string, got {other}", self.name)),
            },
        }
    }

    fn type_hint(&self) -> String {
        match self.kind {
            FieldKind::Text => "string".to_string(),
            FieldKind::OptionalText => "string or null".to_string(),
            FieldKind::TextList => "array of strings".to_string(),
            FieldKind::Bool => "boolean".to_string(),
            FieldKind::OptionalBool => "boolean or null if unknown".to_string(),
            FieldKind::Choice { options, .. } => format!("one of {}", options.join(" | ")),
        }
    }
}

impl SchemaDescriptor {
    pub fn validate(&self, value: Value) -> Result<SchemaInstance, CoercionError> {
        let raw = value.to_string();
        let mismatch = |detail: String| CoercionError::SchemaMismatch {
            schema: self.name,
            detail,
            raw: raw.clone(),
        };
        let Value::Object(mut obj) = value else {
            return Err(mismatch("expected a JSON object".to_string()));
        };
        let mut out = Map::new();
        for f in self.fields {
            let v = f.normalize(obj.remove(f.name)).map_err(&mismatch)?;
            out.insert(f.name.to_string(), v);
        }
        Ok(SchemaInstance {
            schema: self.name,
            value: Value::Object(out),
        })
    }

    /// Human/model-readable description used in prompts.
    pub fn render(&self) -> String {
        let mut s = String::from("{\n");
        for (i, f) in self.fields.iter().enumerate() {
            let sep = if i + 1 < self.fields.len() { "," } else { "" };
            let req = if f.required { "required" } else { "optional" };
            s.push_str(&format!(
                "  \"{}\": <{}> ({req}) {}{sep}\n",
                f.name,
                f.type_hint(),
                f.description
            ));
        }
        s.push('}');
        s
    }
}

pub const TOOL_NAMES: SchemaDescriptor = SchemaDescriptor {
    name: "tool_names",
    fields: &[FieldSpec {
        name: "tool_names",
        kind: FieldKind::TextList,
        required: true,
        description: "names of specific developer tools, products or services",
    }],
};

pub const TOOL_FACTS: SchemaDescriptor = SchemaDescriptor {
    name: "tool_facts",
    fields: &[
        FieldSpec {
            name: "website",
            kind: FieldKind::OptionalText,
            required: false,
            description: "official website URL",
        },
        FieldSpec {
            name: "pricing_model",
            kind: FieldKind::Choice {
                options: PricingModel::NAMES,
                default: "Unknown",
            },
            required: false,
            description: "pricing model",
        },
        FieldSpec {
            name: "is_open_source",
            kind: FieldKind::OptionalBool,
            required: false,
            description: "whether the source code is openly licensed",
        },
        FieldSpec {
            name: "tech_stack",
            kind: FieldKind::TextList,
            required: false,
            description: "technologies, frameworks and platforms it is built on or targets",
        },
        FieldSpec {
            name: "language_support",
            kind: FieldKind::TextList,
            required: false,
            description: "programming languages with SDKs or first-class support",
        },
        FieldSpec {
            name: "has_api",
            kind: FieldKind::Bool,
            required: false,
            description: "whether a public API, SDK or CLI is offered",
        },
        FieldSpec {
            name: "integrations",
            kind: FieldKind::TextList,
            required: false,
            description: "tools and platforms it integrates with",
        },
        FieldSpec {
            name: "description",
            kind: FieldKind::Text,
            required: false,
            description: "one-sentence summary of what the tool does",
        },
    ],
};

pub const RECOMMENDATION: SchemaDescriptor = SchemaDescriptor {
    name: "recommendation",
    fields: &[FieldSpec {
        name: "recommendation",
        kind: FieldKind::Text,
        required: true,
        description: "concise recommendation, 3-4 sentences",
    }],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ToolFacts, ToolNames};
    use serde_json::json;

    #[test]
    fn missing_required_field_is_mismatch() {
        let err = TOOL_NAMES.validate(json!({"names": ["a"]})).unwrap_err();
        assert_eq!(err.reason(), "schema_mismatch");
    }

    #[test]
    fn non_object_is_mismatch() {
        let err = TOOL_NAMES.validate(json!(["a", "b"])).unwrap_err();
        assert!(matches!(err, CoercionError::SchemaMismatch { .. }));
    }

    #[test]
    fn empty_required_text_is_mismatch() {
        assert!(RECOMMENDATION
            .validate(json!({"recommendation": "   "}))
            .is_err());
    }

    #[test]
    fn absent_optional_fields_get_unknown_defaults() {
        let inst = TOOL_FACTS.validate(json!({})).unwrap();
        let facts: ToolFacts = inst.into_typed().unwrap();
        assert_eq!(facts, ToolFacts::default());
    }

    #[test]
    fn choice_and_bool_strings_are_canonicalized() {
        let inst = TOOL_FACTS
            .validate(json!({
                "pricing_model": "freemium",
                "is_open_source": "Yes",
                "has_api": "no",
                "tech_stack": "Postgres, Go ,",
                "website": "N/A",
                "extra": 1
            }))
            .unwrap();
        let v = inst.as_value();
        assert_eq!(v["pricing_model"], json!("Freemium"));
        assert_eq!(v["is_open_source"], json!(true));
        assert_eq!(v["has_api"], json!(false));
        assert_eq!(v["tech_stack"], json!(["Postgres", "Go"]));
        assert_eq!(v["website"], Value::Null);
        assert!(v.get("extra").is_none());
    }

    #[test]
    fn unrecognized_choice_falls_back_to_default() {
        let inst = TOOL_FACTS
            .validate(json!({"pricing_model": "pay what you want"}))
            .unwrap();
        assert_eq!(inst.as_value()["pricing_model"], json!("Unknown"));
    }

    #[test]
    fn wrong_types_are_mismatch() {
        assert!(TOOL_FACTS.validate(json!({"has_api": 3})).is_err());
        assert!(TOOL_FACTS.validate(json!({"tech_stack": [{"a": 1}]})).is_err());
        assert!(TOOL_FACTS.validate(json!({"description": ["x"]})).is_err());
    }

    #[test]
    fn tool_names_deserialize_after_validation() {
        let names: ToolNames = TOOL_NAMES
            .validate(json!({"tool_names": ["Supabase", " ", "PlanetScale"]}))
            .unwrap()
            .into_typed()
            .unwrap();
        assert_eq!(names.tool_names, vec!["Supabase", "PlanetScale"]);
    }

    #[test]
    fn render_mentions_every_field() {
        let r = TOOL_FACTS.render();
        for f in TOOL_FACTS.fields {
            assert!(r.contains(f.name), "missing {}", f.name);
        }
        assert!(r.contains("Free | Freemium | Paid | Enterprise | Unknown"));
    }
}
