//! Form schema documents and submission validation.
//!
//! The generation model's output is stored untouched, so parsing here is
//! lenient: missing keys fall back to defaults and unknown field types map
//! to [`FieldType::Other`], which accepts any value.
//!
//! Each [`FieldType`] variant owns its validation predicate, so supporting
//! a new input type means adding a variant and a match arm in
//! [`FieldType::check`].

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A generated form schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    #[serde(default, deserialize_with = "text_or_empty")]
    pub title: String,
    #[serde(
        default,
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "field_list")]
    pub fields: Vec<FieldDescriptor>,
}

impl FormSchema {
    /// Interpret a stored schema document.
    ///
    /// Never fails: a document that is not an object has no fields, and
    /// entries of `fields` that are not objects are skipped.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(_) => Self::deserialize(value).unwrap_or_default(),
            _ => Self::default(),
        }
    }
}

/// One input of a form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    #[serde(default, deserialize_with = "text_or_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub label: String,
    #[serde(rename = "type", default, deserialize_with = "field_type_or_other")]
    pub field_type: FieldType,
    #[serde(
        default,
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub placeholder: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub required: bool,
    /// Choices as the model wrote them; compared by their text form.
    #[serde(
        default,
        deserialize_with = "option_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub options: Option<Vec<Value>>,
    #[serde(
        default,
        deserialize_with = "optional_rules",
        skip_serializing_if = "Option::is_none"
    )]
    pub validation: Option<ValidationRules>,
}

impl FieldDescriptor {
    /// Label used in error messages; falls back to the field id.
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// Optional numeric and length bounds. Numeric strings such as `"0"` are
/// accepted; anything else unparseable is treated as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    #[serde(
        default,
        deserialize_with = "optional_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub min: Option<f64>,
    #[serde(
        default,
        deserialize_with = "optional_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub max: Option<f64>,
    #[serde(
        default,
        deserialize_with = "optional_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_length: Option<f64>,
    #[serde(
        default,
        deserialize_with = "optional_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_length: Option<f64>,
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(scalar_text(Value::deserialize(d)?).unwrap_or_default())
}

fn optional_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(scalar_text(Value::deserialize(d)?))
}

fn optional_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    })
}

fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn option_list<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<Value>>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => Some(items),
        _ => None,
    })
}

fn optional_rules<'de, D: Deserializer<'de>>(d: D) -> Result<Option<ValidationRules>, D::Error> {
    Ok(match Value::deserialize(d)? {
        rules @ Value::Object(_) => ValidationRules::deserialize(rules).ok(),
        _ => None,
    })
}

fn field_type_or_other<'de, D: Deserializer<'de>>(d: D) -> Result<FieldType, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => FieldType::default(),
        Value::String(s) => FieldType::deserialize(Value::String(s.trim().to_ascii_lowercase()))
            .unwrap_or(FieldType::Other),
        _ => FieldType::Other,
    })
}

fn field_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<FieldDescriptor>, D::Error> {
    let Value::Array(items) = Value::deserialize(d)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| FieldDescriptor::deserialize(item).ok())
        .collect())
}

/// Input types recognised by the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    Email,
    Number,
    Tel,
    Url,
    Date,
    Select,
    Radio,
    Checkbox,
    File,
    /// Any type the model invented; accepted without a type check.
    #[serde(other)]
    Other,
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\S+@\S+\.\S+$").expect("valid email regex"))
}

fn tel_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9+\-\s()]+$").expect("valid tel regex"))
}

/// Returns `true` when `email` looks like an email address.
pub fn looks_like_email(email: &str) -> bool {
    email_re().is_match(email)
}

impl FieldType {
    /// Type-specific check for a present value. Returns an error message
    /// when the value does not fit.
    pub fn check(&self, field: &FieldDescriptor, value: &Value) -> Vec<String> {
        let name = field.display_name();
        let mut errors = Vec::new();

        match self {
            FieldType::Email => {
                if !email_re().is_match(&as_text(value)) {
                    errors.push(format!("Field \"{}\" must be a valid email", name));
                }
            }
            FieldType::Number => match as_number(value) {
                None => errors.push(format!("Field \"{}\" must be a number", name)),
                Some(n) => {
                    let rules = field.validation.clone().unwrap_or_default();
                    if let Some(min) = rules.min {
                        if n < min {
                            errors.push(format!("Field \"{}\" must be at least {}", name, min));
                        }
                    }
                    if let Some(max) = rules.max {
                        if n > max {
                            errors.push(format!("Field \"{}\" must be at most {}", name, max));
                        }
                    }
                }
            },
            FieldType::Tel => {
                if !tel_re().is_match(&as_text(value)) {
                    errors.push(format!("Field \"{}\" must be a valid phone number", name));
                }
            }
            FieldType::Url => {
                if url::Url::parse(&as_text(value)).is_err() {
                    errors.push(format!("Field \"{}\" must be a valid URL", name));
                }
            }
            FieldType::Select | FieldType::Radio => {
                if let Some(options) = non_empty_options(field) {
                    let chosen = as_text(value);
                    if !options.iter().any(|o| as_text(o) == chosen) {
                        errors.push(format!(
                            "Field \"{}\" must be one of the listed options",
                            name
                        ));
                    }
                }
            }
            FieldType::Checkbox => {
                if let (Some(options), Some(chosen)) = (non_empty_options(field), value.as_array())
                {
                    let all_known = chosen.iter().all(|c| {
                        let c = as_text(c);
                        options.iter().any(|o| as_text(o) == c)
                    });
                    if !all_known {
                        errors.push(format!(
                            "Field \"{}\" must only contain listed options",
                            name
                        ));
                    }
                }
            }
            FieldType::Text
            | FieldType::Textarea
            | FieldType::Date
            | FieldType::File
            | FieldType::Other => {}
        }

        errors
    }
}

fn non_empty_options(field: &FieldDescriptor) -> Option<&[Value]> {
    field
        .options
        .as_deref()
        .filter(|options| !options.is_empty())
}

/// String form of a JSON value, the way a browser would coerce it.
fn as_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Number(n) => Cow::Owned(n.to_string()),
        Value::Bool(b) => Cow::Owned(b.to_string()),
        other => Cow::Owned(other.to_string()),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
        }
        _ => None,
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Validate submitted `responses` against `schema`.
///
/// Returns every problem found, in field order; an empty vector means the
/// submission is acceptable. Keys that do not correspond to a field are
/// ignored.
pub fn validate_responses(
    schema: &FormSchema,
    responses: &serde_json::Map<String, Value>,
) -> Vec<String> {
    let mut errors = Vec::new();

    for field in &schema.fields {
        let value = responses.get(&field.id);

        if !is_present(value) {
            if field.required {
                errors.push(format!("Field \"{}\" is required", field.display_name()));
            }
            continue;
        }
        let Some(value) = value else { continue };

        errors.extend(field.field_type.check(field, value));

        if let (Value::String(s), Some(rules)) = (value, &field.validation) {
            let len = s.chars().count() as f64;
            if let Some(min_len) = rules.min_length.filter(|m| *m > 0.0) {
                if len < min_len {
                    errors.push(format!(
                        "Field \"{}\" must be at least {} characters",
                        field.display_name(),
                        min_len
                    ));
                }
            }
            if let Some(max_len) = rules.max_length.filter(|m| *m > 0.0) {
                if len > max_len {
                    errors.push(format!(
                        "Field \"{}\" must be at most {} characters",
                        field.display_name(),
                        max_len
                    ));
                }
            }
        }
    }

    errors
}
