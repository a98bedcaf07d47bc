use crate::{
    Error, Result,
    form::{ControlValue, FormSnapshot},
    schema::{FieldDescriptor, FieldKind},
};
use rand::Rng;
use serde_json::{Map, Number, Value};
use tracing::debug;

/// Upper bound (exclusive) for generated seeds.
pub const SEED_RANGE: i64 = 1_000_000_000;

pub type InputPayload = Map<String, Value>;

/// Builds the `input` object for one submission. Fails before anything is
/// sent when a required field is missing.
pub fn build_payload<R: Rng + ?Sized>(
    fields: &[FieldDescriptor],
    form: &FormSnapshot,
    rng: &mut R,
) -> Result<InputPayload> {
    let mut payload = Map::new();

    for field in fields {
        let control = form.values.get(&field.name);
        if let Some(value) = field_value(field, control, form.mask.as_deref(), rng) {
            payload.insert(field.name.clone(), value);
        }
    }

    for field in fields.iter().filter(|f| f.required) {
        if !is_present(payload.get(&field.name)) {
            return Err(Error::missing_field(&field.name));
        }
    }

    debug!("Built payload with {} inputs", payload.len());
    Ok(payload)
}

fn field_value<R: Rng + ?Sized>(
    field: &FieldDescriptor,
    control: Option<&ControlValue>,
    mask: Option<&str>,
    rng: &mut R,
) -> Option<Value> {
    match field.kind {
        FieldKind::Text => Some(Value::String(text_or_default(control, field).trim().to_string())),
        FieldKind::Enum => {
            let text = text_or_default(control, field);
            let text = if text.is_empty() {
                // a select always has something chosen
                field
                    .constraints
                    .enum_values
                    .first()
                    .map(plain_text)
                    .unwrap_or_default()
            } else {
                text
            };
            Some(Value::String(text.trim().to_string()))
        }
        FieldKind::Number | FieldKind::Integer => {
            let text = text_or_default(control, field);
            if field.is_seed_like() {
                let seed = parse_seed(&text).unwrap_or_else(|| random_seed(rng));
                return Some(Value::from(seed));
            }
            let number = coerce_number(&text);
            Some(match field.kind {
                FieldKind::Integer => Value::from(number.trunc() as i64),
                _ => Number::from_f64(number).map(Value::Number).unwrap_or(Value::from(0)),
            })
        }
        FieldKind::Boolean => {
            let checked = match control {
                Some(ControlValue::Checked(checked)) => *checked,
                _ => field
                    .default
                    .as_ref()
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            };
            Some(Value::Bool(checked))
        }
        FieldKind::Array => {
            let items = match control {
                Some(ControlValue::Text(text)) => split_list(text),
                _ => match &field.default {
                    Some(Value::Array(items)) => items.iter().map(plain_text).collect(),
                    Some(other) => split_list(&plain_text(other)),
                    None => Vec::new(),
                },
            };
            Some(Value::Array(items.into_iter().map(Value::String).collect()))
        }
        FieldKind::ImageUri => match control {
            Some(ControlValue::File(file)) => Some(Value::String(file.data.to_uri())),
            _ => None,
        },
        FieldKind::MaskUri => mask.map(|uri| Value::String(uri.to_string())),
    }
}

fn text_or_default(control: Option<&ControlValue>, field: &FieldDescriptor) -> String {
    match control {
        Some(ControlValue::Text(text)) => text.clone(),
        Some(ControlValue::Checked(checked)) => checked.to_string(),
        _ => field.default.as_ref().map(plain_text).unwrap_or_default(),
    }
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Comma-separated list, trimmed, blanks dropped.
pub fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Empty or unparseable input becomes 0, never NaN.
pub fn coerce_number(text: &str) -> f64 {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

pub fn parse_seed(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(seed) = text.parse::<i64>() {
        return Some(seed);
    }
    text.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(|n| n.trunc() as i64)
}

pub fn random_seed<R: Rng + ?Sized>(rng: &mut R) -> i64 {
    rng.gen_range(0..SEED_RANGE)
}

/// `false` and `0` count as present; empty strings and lists do not.
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}
