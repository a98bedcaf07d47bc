use super::types::{Constraints, Dimensions, FieldDescriptor, FieldKind, InterpretOptions};
use crate::{Error, Result};
use serde_json::{Map, Value};
use tracing::debug;

const DEFAULT_ACCEPT: &str = "image/*";

/// The `Input` object of a model version together with the sibling component
/// schemas its properties may reference.
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    pub properties: Map<String, Value>,
    pub required: Vec<String>,
    pub components: Map<String, Value>,
}

/// Pulls `openapi_schema.components.schemas.Input` out of a model version document.
pub fn extract_input_schema(version: &Value) -> Result<InputSchema> {
    let components = version
        .pointer("/openapi_schema/components/schemas")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::schema("version has no openapi_schema components"))?;

    let input = components
        .get("Input")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::schema("Input schema missing"))?;

    let properties = match input.get("properties") {
        Some(Value::Object(props)) => props.clone(),
        Some(_) => return Err(Error::schema("Input.properties is not an object")),
        None => Map::new(),
    };

    let required = match input.get("required") {
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(_) => return Err(Error::schema("Input.required is not a list")),
        None => Vec::new(),
    };

    Ok(InputSchema {
        properties,
        required,
        components: components.clone(),
    })
}

/// Turns every recognizable property into a descriptor. Properties with an
/// unknown or missing type are skipped.
pub fn interpret(schema: &InputSchema, options: &InterpretOptions) -> Result<Vec<FieldDescriptor>> {
    let mut fields = Vec::with_capacity(schema.properties.len());

    for (name, property) in &schema.properties {
        let property = property
            .as_object()
            .ok_or_else(|| Error::schema(format!("property '{}' is not an object", name)))?;
        let resolved = resolve_refs(property, &schema.components);

        match classify(name, &resolved, options) {
            Some(mut field) => {
                field.required = schema.required.iter().any(|r| r == name);
                fields.push(field);
            }
            None => {
                debug!(
                    "Skipping input '{}' with unsupported type {:?}",
                    name,
                    resolved.get("type")
                );
            }
        }
    }

    // Stable: declared order breaks ties and fills in for missing x-order.
    fields.sort_by_key(|field| field.order.unwrap_or(i64::MAX));

    debug!("Interpreted {} input fields", fields.len());
    Ok(fields)
}

/// Convenience for the common path: version document in, descriptors out.
pub fn interpret_version(version: &Value, options: &InterpretOptions) -> Result<Vec<FieldDescriptor>> {
    let schema = extract_input_schema(version)?;
    interpret(&schema, options)
}

/// Merges `allOf` / `$ref` targets into the property. Keys on the property win.
fn resolve_refs(property: &Map<String, Value>, components: &Map<String, Value>) -> Map<String, Value> {
    let mut resolved = Map::new();

    let mut refs: Vec<&str> = Vec::new();
    if let Some(Value::Array(all_of)) = property.get("allOf") {
        refs.extend(
            all_of
                .iter()
                .filter_map(|entry| entry.get("$ref"))
                .filter_map(Value::as_str),
        );
    }
    if let Some(reference) = property.get("$ref").and_then(Value::as_str) {
        refs.push(reference);
    }

    for reference in refs {
        let target = reference.rsplit('/').next().unwrap_or(reference);
        match components.get(target).and_then(Value::as_object) {
            Some(target_schema) => {
                for (key, value) in target_schema {
                    resolved.insert(key.clone(), value.clone());
                }
            }
            None => debug!("Unresolved schema reference: {}", reference),
        }
    }

    for (key, value) in property {
        if key != "allOf" && key != "$ref" {
            resolved.insert(key.clone(), value.clone());
        }
    }

    resolved
}

fn classify(name: &str, schema: &Map<String, Value>, options: &InterpretOptions) -> Option<FieldDescriptor> {
    let schema_type = schema.get("type").and_then(Value::as_str)?;
    let format = schema.get("format").and_then(Value::as_str);
    let enum_values = schema
        .get("enum")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let kind = match schema_type {
        "string" if format == Some("uri") && name == "mask" => FieldKind::MaskUri,
        "string" if format == Some("uri") => FieldKind::ImageUri,
        "string" if !enum_values.is_empty() => FieldKind::Enum,
        "string" => FieldKind::Text,
        "number" => FieldKind::Number,
        "integer" => FieldKind::Integer,
        "boolean" => FieldKind::Boolean,
        "array" => FieldKind::Array,
        _ => return None,
    };

    let mut constraints = Constraints {
        enum_values,
        ..Constraints::default()
    };

    if kind.is_numeric() {
        constraints.min = schema.get("minimum").and_then(Value::as_f64);
        constraints.max = schema.get("maximum").and_then(Value::as_f64);
        constraints.step = schema
            .get("multiple_of")
            .or_else(|| schema.get("multipleOf"))
            .and_then(Value::as_f64);
    }

    if kind.is_upload() {
        constraints.accepted_mime_types = accepted_mime_types(name, schema);
        constraints.max_size_bytes = schema
            .get("x-max-size")
            .and_then(Value::as_u64)
            .or(options.default_max_upload_bytes);
        constraints.dimensions = schema.get("x-dimensions").and_then(|dims| {
            Some(Dimensions {
                width: u32::try_from(dims.get("width")?.as_u64()?).ok()?,
                height: u32::try_from(dims.get("height")?.as_u64()?).ok()?,
            })
        });
    }

    Some(FieldDescriptor {
        name: name.to_string(),
        kind,
        required: false,
        default: schema.get("default").filter(|v| !v.is_null()).cloned(),
        title: schema.get("title").and_then(Value::as_str).map(str::to_string),
        description: schema
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        order: schema.get("x-order").and_then(Value::as_i64),
        constraints,
    })
}

fn accepted_mime_types(name: &str, schema: &Map<String, Value>) -> Vec<String> {
    // image and mask are always raster inputs regardless of extensions
    if name == "image" || name == "mask" {
        return vec![DEFAULT_ACCEPT.to_string()];
    }

    let declared = schema
        .get("x-accept")
        .or_else(|| schema.get("x-file-types"));

    let mut types: Vec<String> = match declared {
        Some(Value::String(list)) => list.split(',').map(str::to_string).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    types = types
        .into_iter()
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    if types.is_empty() {
        types.push(DEFAULT_ACCEPT.to_string());
    }
    types
}
