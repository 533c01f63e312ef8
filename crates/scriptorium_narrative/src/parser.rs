//! Three-tier structured response parsing.
//!
//! Model output is turned into a record that conforms to a [`ShapeTemplate`]:
//!
//! 1. **Direct**: the JSON document inside the response is decoded and conformed.
//! 2. **Reformatted**: the backend is asked, at a low temperature, to rewrite
//!    its own output as JSON of the template's shape.
//! 3. **KeyValue**: `key: value` lines are scanned using the template's field
//!    names, and everything unmatched keeps its default.
//!
//! A response is never discarded; the worst case is the template defaults.

use crate::client::{GenerationClient, PromptSpec, is_cancellation};
use crate::extraction::decode_json;
use crate::prompts::{self, roles};
use derive_getters::Getters;
use regex::Regex;
use scriptorium_error::{JsonError, ScriptoriumResult, ShapeError, ShapeErrorKind};
use scriptorium_interface::ScriptoriumDriver;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use std::sync::LazyLock;
use tracing::{debug, warn};

static LIST_ITEM: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+(.+?)\s*$").ok());

/// The required shape of a structured record.
///
/// Object keys are required fields, and scalar values are their defaults.
/// A list holds one example element that describes the shape of every
/// element; its default is the empty list.
///
/// # Examples
///
/// ```
/// use scriptorium_narrative::ShapeTemplate;
/// use serde_json::json;
///
/// let template = ShapeTemplate::new(json!({
///     "title": "",
///     "chapters": [{"title": "", "summary": ""}],
/// }));
/// assert_eq!(template.defaults(), json!({"title": "", "chapters": []}));
///
/// let value = template.conform(json!({"chapters": [{"title": "One"}]})).unwrap();
/// assert_eq!(value, json!({"title": "", "chapters": [{"title": "One", "summary": ""}]}));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeTemplate {
    template: Value,
}

impl ShapeTemplate {
    /// Wrap a template value.
    pub fn new(template: Value) -> Self {
        Self { template }
    }

    /// The template itself.
    pub fn template(&self) -> &Value {
        &self.template
    }

    /// The template rendered for prompts.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.template).unwrap_or_else(|_| self.template.to_string())
    }

    /// The record produced when nothing at all is known.
    pub fn defaults(&self) -> Value {
        defaults_of(&self.template)
    }

    /// Check `value` against the template, filling what is missing.
    ///
    /// Missing keys and nulls take defaults, extra keys are kept, numeric
    /// strings are accepted for numbers, and scalars are accepted for strings.
    pub fn conform(&self, value: Value) -> Result<Value, ShapeError> {
        conform_at(&self.template, value, "$")
    }
}

fn defaults_of(template: &Value) -> Value {
    match template {
        Value::Array(_) => Value::Array(Vec::new()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), defaults_of(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn mismatch(path: &str, template: &Value, found: &Value) -> ShapeError {
    ShapeError::new(ShapeErrorKind::TypeMismatch {
        path: path.to_string(),
        expected: type_name(template).to_string(),
        found: type_name(found).to_string(),
    })
}

fn conform_at(template: &Value, value: Value, path: &str) -> Result<Value, ShapeError> {
    if value.is_null() {
        return Ok(defaults_of(template));
    }
    match (template, value) {
        (Value::Null, value) => Ok(value),
        (Value::Object(fields), Value::Object(mut given)) => {
            let mut out = Map::new();
            for (key, field_template) in fields {
                let field_path = format!("{}.{}", path, key);
                let conformed = match given.remove(key) {
                    Some(v) => conform_at(field_template, v, &field_path)?,
                    None => defaults_of(field_template),
                };
                out.insert(key.clone(), conformed);
            }
            out.extend(given);
            Ok(Value::Object(out))
        }
        (Value::Array(example), Value::Array(items)) => match example.first() {
            None => Ok(Value::Array(items)),
            Some(element) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| conform_at(element, item, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        },
        // A comma-separated string stands in for a list of scalars
        (Value::Array(example), Value::String(s))
            if example.first().is_none_or(|e| !e.is_object() && !e.is_array()) =>
        {
            Ok(Value::Array(
                split_list(&s)
                    .into_iter()
                    .map(|item| coerce_scalar(example.first().unwrap_or(&Value::Null), &item))
                    .collect(),
            ))
        }
        (Value::Number(_), Value::Number(n)) => Ok(Value::Number(n)),
        (Value::Number(_), Value::String(s)) => match parse_number(&s) {
            Some(n) => Ok(Value::Number(n)),
            None => Err(mismatch(path, template, &Value::String(s))),
        },
        (Value::String(_), Value::String(s)) => Ok(Value::String(s)),
        (Value::String(_), Value::Number(n)) => Ok(Value::String(n.to_string())),
        (Value::String(_), Value::Bool(b)) => Ok(Value::String(b.to_string())),
        (Value::Bool(_), Value::Bool(b)) => Ok(Value::Bool(b)),
        (Value::Bool(_), Value::String(s)) => {
            let flag = s.trim().to_lowercase();
            match flag.as_str() {
                "true" | "yes" => Ok(Value::Bool(true)),
                "false" | "no" => Ok(Value::Bool(false)),
                _ => Err(mismatch(path, template, &Value::String(s))),
            }
        }
        (template, value) => Err(mismatch(path, template, &value)),
    }
}

fn parse_number(text: &str) -> Option<Number> {
    let text = text.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Some(Number::from(n));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

fn coerce_scalar(template: &Value, text: &str) -> Value {
    match template {
        Value::Number(_) => parse_number(text)
            .map(Value::Number)
            .unwrap_or_else(|| template.clone()),
        Value::Bool(_) => Value::Bool(matches!(text.to_lowercase().as_str(), "true" | "yes")),
        _ => Value::String(text.to_string()),
    }
}

fn split_list(text: &str) -> Vec<String> {
    text.split([',', ';'])
        .map(|s| s.trim().trim_matches('"').trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Which tier produced a record.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
)]
pub enum ParseTier {
    /// Decoded straight from the response
    Direct,
    /// Decoded after the backend reformatted its output
    Reformatted,
    /// Scanned from key: value lines
    KeyValue,
}

/// A conformed record and the tier that produced it.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct ParsedRecord {
    value: Value,
    tier: ParseTier,
}

impl ParsedRecord {
    /// Give up the value.
    pub fn into_value(self) -> Value {
        self.value
    }
}

/// Turns free-form model output into template-shaped records.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredResponseParser {
    reformat_temperature: f32,
}

impl StructuredResponseParser {
    /// Create a parser.
    pub fn new(reformat_temperature: f32) -> Self {
        Self {
            reformat_temperature,
        }
    }

    /// Parse `text` into a record shaped like `template`.
    ///
    /// Only cancellation is returned as an error. Backend failures during the
    /// reformat tier fall through to the key:value scan.
    #[tracing::instrument(skip_all, fields(chars = text.len()))]
    pub async fn parse<D: ScriptoriumDriver>(
        &self,
        client: &GenerationClient<D>,
        text: &str,
        template: &ShapeTemplate,
    ) -> ScriptoriumResult<ParsedRecord> {
        match Self::parse_direct(text, template) {
            Ok(value) => {
                return Ok(ParsedRecord {
                    value,
                    tier: ParseTier::Direct,
                });
            }
            Err(e) => debug!(error = %e, "Direct parse failed, asking for a reformat"),
        }

        let spec = PromptSpec::new(
            roles::REFORMATTER,
            prompts::reformat(text, &template.to_prompt_json()),
        )
        .with_temperature(self.reformat_temperature)
        .with_min_words(0);
        match client.generate(&spec).await {
            Ok(reformatted) => match Self::parse_direct(&reformatted, template) {
                Ok(value) => {
                    return Ok(ParsedRecord {
                        value,
                        tier: ParseTier::Reformatted,
                    });
                }
                Err(e) => warn!(error = %e, "Reformatted output still malformed"),
            },
            Err(e) if is_cancellation(&e) => return Err(e),
            Err(e) => warn!(error = %e, "Reformat request failed"),
        }

        warn!("Falling back to key:value scan");
        Ok(ParsedRecord {
            value: Self::scan_key_values(text, template),
            tier: ParseTier::KeyValue,
        })
    }

    /// Parse and deserialise into a typed record.
    pub async fn parse_as<T: DeserializeOwned, D: ScriptoriumDriver>(
        &self,
        client: &GenerationClient<D>,
        text: &str,
        template: &ShapeTemplate,
    ) -> ScriptoriumResult<(T, ParseTier)> {
        let record = self.parse(client, text, template).await?;
        let tier = record.tier;
        let typed = serde_json::from_value(record.value)
            .map_err(|e| JsonError::new(format!("Record did not match its type: {}", e)))?;
        Ok((typed, tier))
    }

    /// Tier 1: decode the embedded JSON document and conform it.
    pub fn parse_direct(text: &str, template: &ShapeTemplate) -> Result<Value, ShapeError> {
        template.conform(decode_json(text)?)
    }

    /// Tier 3: scan `key: value` lines for the template's fields.
    pub fn scan_key_values(text: &str, template: &ShapeTemplate) -> Value {
        let lines: Vec<&str> = text.lines().collect();
        let scanned = scan_value(template.template(), &lines, None);
        template
            .conform(scanned)
            .unwrap_or_else(|_| template.defaults())
    }
}

/// Lower-case a key and drop markup so `**Plot_Threads**:` matches `plot threads`.
fn normalize_key(key: &str) -> String {
    let key = key
        .trim()
        .trim_start_matches(|c: char| c == '-' || c == '*' || c == '#' || c == '•' || c.is_whitespace())
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')')
        .replace("**", "")
        .replace(['_', '-'], " ");
    key.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Split a line into a normalised key and the text after the first colon.
fn key_value(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once(':')?;
    let key = normalize_key(key);
    if key.is_empty() || key.split_whitespace().count() > 4 {
        return None;
    }
    let value = value.trim().trim_matches('*').trim().trim_matches('"').trim();
    Some((key, value.to_string()))
}

/// Index of the first line whose key is `field`.
fn find_field(lines: &[&str], field: &str) -> Option<(usize, String)> {
    let wanted = normalize_key(field);
    lines.iter().enumerate().find_map(|(i, line)| {
        key_value(line)
            .filter(|(key, _)| *key == wanted)
            .map(|(_, value)| (i, value))
    })
}

fn scan_value(template: &Value, lines: &[&str], field: Option<&str>) -> Value {
    match template {
        Value::Object(fields) => {
            let mut out = Map::new();
            for (key, field_template) in fields {
                out.insert(key.clone(), scan_value(field_template, lines, Some(key)));
            }
            Value::Object(out)
        }
        Value::Array(example) => match (example.first(), field) {
            (Some(element @ Value::Object(element_fields)), _) => {
                scan_records(element, element_fields, lines)
            }
            (element, Some(field)) => scan_scalar_list(element, lines, field),
            (_, None) => Value::Array(Vec::new()),
        },
        scalar => match field.and_then(|f| find_field(lines, f)) {
            Some((_, value)) if !value.is_empty() => coerce_scalar(scalar, &value),
            _ => scalar.clone(),
        },
    }
}

/// Values of a list field: inline after the colon, or the bullet lines below it.
fn scan_scalar_list(element: Option<&Value>, lines: &[&str], field: &str) -> Value {
    let element = element.unwrap_or(&Value::Null);
    let Some((index, inline)) = find_field(lines, field) else {
        return Value::Array(Vec::new());
    };
    let items: Vec<String> = if inline.is_empty() {
        lines[index + 1..]
            .iter()
            .skip_while(|line| line.trim().is_empty())
            .map_while(|line| {
                LIST_ITEM
                    .as_ref()
                    .and_then(|re| re.captures(line))
                    .map(|caps| caps[1].to_string())
            })
            .collect()
    } else {
        split_list(&inline)
    };
    Value::Array(items.iter().map(|item| coerce_scalar(element, item)).collect())
}

/// Records of a list-of-objects field. Each line keyed by the element's first
/// field opens a new record that runs to the next such line.
fn scan_records(element: &Value, element_fields: &Map<String, Value>, lines: &[&str]) -> Value {
    let Some(first) = element_fields.keys().next() else {
        return Value::Array(Vec::new());
    };
    let wanted = normalize_key(first);
    let starts: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| key_value(line).is_some_and(|(key, _)| key == wanted))
        .map(|(i, _)| i)
        .collect();

    let records = starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(lines.len());
            scan_value(element, &lines[start..end], None)
        })
        .collect();
    Value::Array(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outline_template() -> ShapeTemplate {
        ShapeTemplate::new(json!({
            "title": "",
            "tension": 5,
            "motifs": [""],
            "chapters": [{"title": "", "summary": "", "characters": [""]}],
        }))
    }

    #[test]
    fn test_round_trip_of_defaults() {
        let template = outline_template();
        let serialized = serde_json::to_string(&template.defaults()).unwrap();
        let value = StructuredResponseParser::parse_direct(&serialized, &template).unwrap();
        assert_eq!(value, template.defaults());
    }

    #[test]
    fn test_conform_accepts_numeric_strings() {
        let template = outline_template();
        let value = template.conform(json!({"tension": "7"})).unwrap();
        assert_eq!(value["tension"], 7);
    }

    #[test]
    fn test_conform_rejects_mismatched_list_element() {
        let template = outline_template();
        let err = template.conform(json!({"chapters": ["just a string"]})).unwrap_err();
        assert!(matches!(err.kind, ShapeErrorKind::TypeMismatch { ref path, .. } if path == "$.chapters[0]"));
    }

    #[test]
    fn test_conform_keeps_extra_keys() {
        let template = outline_template();
        let value = template.conform(json!({"title": "T", "epigraph": "e"})).unwrap();
        assert_eq!(value["epigraph"], "e");
        assert_eq!(value["motifs"], json!([]));
    }

    #[test]
    fn test_comma_string_for_scalar_list() {
        let template = outline_template();
        let value = template.conform(json!({"motifs": "salt, bells; fog"})).unwrap();
        assert_eq!(value["motifs"], json!(["salt", "bells", "fog"]));
    }

    #[test]
    fn test_key_value_scan() {
        let text = "**Title**: The Drowned Bell\nTension: 8\nMotifs:\n- salt\n- bells\n\n\
Title: Arrival\nSummary: Mara lands.\nCharacters: Mara, Oren\n\
Title: Descent\nSummary: The bell rings.";
        let value = StructuredResponseParser::scan_key_values(text, &outline_template());
        assert_eq!(value["title"], "The Drowned Bell");
        assert_eq!(value["tension"], 8);
        assert_eq!(value["motifs"], json!(["salt", "bells"]));
        let chapters = value["chapters"].as_array().unwrap();
        // The book title line opens a record too
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[1]["summary"], "Mara lands.");
        assert_eq!(chapters[1]["characters"], json!(["Mara", "Oren"]));
        assert_eq!(chapters[2]["title"], "Descent");
    }

    #[test]
    fn test_scan_of_prose_yields_defaults() {
        let template = outline_template();
        let value = StructuredResponseParser::scan_key_values("Nothing useful here.", &template);
        assert_eq!(value, template.defaults());
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  **Plot_Threads** "), "plot threads");
        assert_eq!(normalize_key("- World-Name"), "world name");
        assert_eq!(normalize_key("2. Title"), "title");
    }
}
