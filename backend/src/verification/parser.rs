//! Best-effort reading of classifier output.
//!
//! The classification service is asked for JSON, but nothing guarantees it
//! answers with JSON only: the object is often wrapped in prose or markdown
//! fences. Everything here is pure so it can be tested without a network.

use serde_json::{Map, Value};
use shared::ClassificationResult;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("response JSON is not an object")]
    NotAnObject,
    #[error("field `{0}` is missing or empty")]
    MissingField(&'static str),
    #[error("quantity `{0}` is not a mass")]
    InvalidQuantity(String),
}

/// Returns the first JSON-object-shaped span in `text`.
///
/// Prefers a brace-balanced object (braces inside strings are ignored). When
/// no balanced object exists, falls back to the span from the first `{` to
/// the last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let first = text.find('{')?;

    let mut search_from = first;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_object_end(&text[start..]) {
            return Some(&text[start..start + end]);
        }
        search_from = start + 1;
    }

    let last = text.rfind('}')?;
    (last > first).then(|| &text[first..=last])
}

/// Byte length of the balanced object at the start of `text`, which must begin with `{`.
fn balanced_object_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Classifier answer with its fields sanitised but the quantity still as written.
#[derive(Debug, Clone, PartialEq)]
pub struct RawClassification {
    pub waste_type: String,
    pub quantity: String,
    pub confidence: f64,
}

impl RawClassification {
    /// Normalises the quantity; fails when it is not a readable mass.
    pub fn into_result(self) -> Result<ClassificationResult, ParseError> {
        let quantity = normalize_quantity(&self.quantity)
            .ok_or_else(|| ParseError::InvalidQuantity(self.quantity.clone()))?;
        Ok(ClassificationResult {
            waste_type: self.waste_type,
            quantity,
            confidence: self.confidence,
        })
    }
}

/// Reads the answer without interpreting the quantity. Only an empty
/// `wasteType` or `quantity` is an error here.
pub fn read_classification(text: &str) -> Result<RawClassification, ParseError> {
    let candidate = extract_json_object(text).unwrap_or(text);
    let value: Value = serde_json::from_str(candidate.trim())?;
    let object = value.as_object().ok_or(ParseError::NotAnObject)?;
    sanitize(object)
}

pub fn parse_classification(text: &str) -> Result<ClassificationResult, ParseError> {
    read_classification(text)?.into_result()
}

fn sanitize(object: &Map<String, Value>) -> Result<RawClassification, ParseError> {
    let waste_type = coerce_string(object.get("wasteType"));
    if waste_type.is_empty() {
        return Err(ParseError::MissingField("wasteType"));
    }

    let quantity = coerce_string(object.get("quantity"));
    if quantity.is_empty() {
        return Err(ParseError::MissingField("quantity"));
    }

    Ok(RawClassification {
        waste_type,
        quantity,
        confidence: coerce_confidence(object.get("confidence")),
    })
}

fn coerce_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn coerce_confidence(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        _ => ClassificationResult::DEFAULT_CONFIDENCE,
    }
}

/// Canonicalises a mass to `"<number> kg"`.
///
/// Takes the first number in the label and the unit word right after it. A
/// bare number is read as kilograms. Returns `None` when there is no number or
/// the unit is not a mass.
pub fn normalize_quantity(raw: &str) -> Option<String> {
    let lower = raw.to_lowercase();
    let start = lower.find(|c: char| c.is_ascii_digit())?;
    let rest = &lower[start..];
    let number_len = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(rest.len());
    let number = parse_number(&rest[..number_len])?;

    let unit: String = rest[number_len..]
        .trim_start()
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect();

    let kilograms = match unit.as_str() {
        "" | "kg" | "kgs" | "kilo" | "kilos" | "kilogram" | "kilograms" => number,
        "g" | "gram" | "grams" => number / 1000.0,
        "t" | "ton" | "tons" | "tonne" | "tonnes" => number * 1000.0,
        "lb" | "lbs" | "pound" | "pounds" => number * 0.453_592_37,
        _ => return None,
    };

    Some(format!("{} kg", format_mass(kilograms)))
}

/// Parses digits with `.` or `,` separators.
///
/// A comma followed by exactly three digits groups thousands (`1,000`),
/// unless the integer part is a lone `0`. Any other comma is a decimal
/// point (`1,5`).
fn parse_number(token: &str) -> Option<f64> {
    let token = token.trim_end_matches(['.', ',']);
    let mut groups = token.split(',');
    let mut normalized = groups.next()?.to_string();

    for group in groups {
        let digits = group.chars().take_while(|c| c.is_ascii_digit()).count();
        let groups_thousands = digits == 3 && normalized != "0" && !normalized.contains('.');
        if !groups_thousands {
            normalized.push('.');
        }
        normalized.push_str(group);
    }

    normalized.parse().ok()
}

/// At most three decimals, but masses under a gram keep three significant digits.
fn format_mass(value: f64) -> String {
    let decimals = if value > 0.0 && value < 0.001 {
        (2 - value.log10().floor() as i32).clamp(3, 12) as usize
    } else {
        3
    };
    let fixed = format!("{:.*}", decimals, value);
    fixed
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Whether the classifier's label says the image holds no waste at all.
///
/// Multi-word labels match anywhere in the waste type; single-word labels
/// (like `none`) must match the whole waste type.
pub fn indicates_no_waste(waste_type: &str, labels: &[String]) -> bool {
    let lower = waste_type.trim().to_lowercase();
    labels.iter().any(|label| {
        let label = label.trim().to_lowercase();
        if label.contains(char::is_whitespace) {
            lower.contains(&label)
        } else {
            lower == label
        }
    })
}
