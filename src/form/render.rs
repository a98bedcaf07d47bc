use super::mask::{DEFAULT_BRUSH_SIZE, MAX_BRUSH_SIZE, MIN_BRUSH_SIZE};
use crate::schema::{FieldDescriptor, FieldKind};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrushControls {
    pub min: u32,
    pub max: u32,
    pub value: u32,
}

/// One interactive control, ready for any front end to draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "control", rename_all = "snake_case")]
pub enum Widget {
    TextArea {
        name: String,
        placeholder: String,
        value: String,
    },
    NumberInput {
        name: String,
        placeholder: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        step: String,
        value: String,
    },
    Checkbox {
        name: String,
        checked: bool,
    },
    Select {
        name: String,
        options: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        selected: Option<String>,
    },
    FilePicker {
        name: String,
        accept: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        brush: Option<BrushControls>,
    },
}

impl Widget {
    pub fn name(&self) -> &str {
        match self {
            Widget::TextArea { name, .. }
            | Widget::NumberInput { name, .. }
            | Widget::Checkbox { name, .. }
            | Widget::Select { name, .. }
            | Widget::FilePicker { name, .. } => name,
        }
    }
}

pub fn widget(field: &FieldDescriptor) -> Widget {
    let name = field.name.clone();
    let placeholder = field.placeholder().to_string();
    let constraints = &field.constraints;

    match field.kind {
        FieldKind::Text => Widget::TextArea {
            name,
            placeholder,
            value: field.default.as_ref().map(scalar_text).unwrap_or_default(),
        },
        FieldKind::Array => Widget::TextArea {
            name,
            placeholder,
            value: match &field.default {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(scalar_text)
                    .collect::<Vec<_>>()
                    .join(","),
                Some(other) => scalar_text(other),
                None => String::new(),
            },
        },
        FieldKind::Enum => Widget::Select {
            name,
            options: constraints.enum_values.iter().map(scalar_text).collect(),
            selected: field.default.as_ref().map(scalar_text),
        },
        FieldKind::Number | FieldKind::Integer if !constraints.enum_values.is_empty() => {
            Widget::Select {
                name,
                options: constraints.enum_values.iter().map(scalar_text).collect(),
                selected: field.default.as_ref().map(scalar_text),
            }
        }
        FieldKind::Number | FieldKind::Integer => Widget::NumberInput {
            name,
            placeholder,
            min: constraints.min,
            max: constraints.max,
            step: constraints
                .step
                .map(format_number)
                .unwrap_or_else(|| "any".to_string()),
            value: field.default.as_ref().map(scalar_text).unwrap_or_default(),
        },
        FieldKind::Boolean => Widget::Checkbox {
            name,
            checked: field
                .default
                .as_ref()
                .and_then(Value::as_bool)
                .unwrap_or(false),
        },
        FieldKind::ImageUri => Widget::FilePicker {
            name,
            accept: accept_attr(field),
            brush: None,
        },
        FieldKind::MaskUri => Widget::FilePicker {
            name,
            accept: accept_attr(field),
            brush: Some(BrushControls {
                min: MIN_BRUSH_SIZE,
                max: MAX_BRUSH_SIZE,
                value: DEFAULT_BRUSH_SIZE,
            }),
        },
    }
}

pub fn widgets(fields: &[FieldDescriptor]) -> Vec<Widget> {
    fields.iter().map(widget).collect()
}

/// HTML for the whole dynamic-inputs block. `errors` fills the per-field
/// error slots.
pub fn render_form(fields: &[FieldDescriptor], errors: &BTreeMap<String, String>) -> String {
    if fields.is_empty() {
        return "<p>No input fields available</p>".to_string();
    }

    let mut html = String::new();
    for field in fields {
        let error = errors.get(&field.name).map(String::as_str).unwrap_or("");
        render_field(&mut html, field, error);
    }
    html
}

fn render_field(out: &mut String, field: &FieldDescriptor, error: &str) {
    let name = escape(&field.name);
    let required = if field.required { " required" } else { "" };

    out.push_str("<div class=\"field\">");
    let _ = write!(out, "<label for=\"input-{name}\">{name}:</label>");

    match widget(field) {
        Widget::TextArea {
            placeholder, value, ..
        } => {
            let _ = write!(
                out,
                "<textarea id=\"input-{name}\" name=\"{name}\" placeholder=\"{}\"{required}>{}</textarea>",
                escape(&placeholder),
                escape(&value)
            );
        }
        Widget::NumberInput {
            placeholder,
            min,
            max,
            step,
            value,
            ..
        } => {
            let _ = write!(
                out,
                "<input type=\"number\" id=\"input-{name}\" name=\"{name}\" placeholder=\"{}\" min=\"{}\" max=\"{}\" step=\"{}\" value=\"{}\"{required}>",
                escape(&placeholder),
                min.map(format_number).unwrap_or_default(),
                max.map(format_number).unwrap_or_default(),
                escape(&step),
                escape(&value)
            );
        }
        Widget::Checkbox { checked, .. } => {
            let checked = if checked { " checked" } else { "" };
            let _ = write!(
                out,
                "<input type=\"checkbox\" id=\"input-{name}\" name=\"{name}\"{checked}>"
            );
        }
        Widget::Select {
            options, selected, ..
        } => {
            let _ = write!(out, "<select id=\"input-{name}\" name=\"{name}\"{required}>");
            for option in options {
                let is_selected = if selected.as_deref() == Some(option.as_str()) {
                    " selected"
                } else {
                    ""
                };
                let option = escape(&option);
                let _ = write!(out, "<option value=\"{option}\"{is_selected}>{option}</option>");
            }
            out.push_str("</select>");
        }
        Widget::FilePicker { accept, brush, .. } => {
            let _ = write!(
                out,
                "<input type=\"file\" id=\"input-{name}\" name=\"{name}\" accept=\"{}\"{required}>",
                escape(&accept)
            );
            let _ = write!(
                out,
                "<div class=\"preview-container\" id=\"{name}-preview-container\" style=\"display:none\">\
                 <img class=\"image-preview\" id=\"preview-{name}\">"
            );
            if brush.is_some() {
                let _ = write!(out, "<canvas id=\"canvas-{name}\" class=\"mask-canvas\"></canvas>");
            }
            out.push_str("</div>");
            let _ = write!(
                out,
                "<button type=\"button\" id=\"remove-{name}-button\" style=\"display:none\">Remove</button>"
            );
            if let Some(brush) = brush {
                let _ = write!(
                    out,
                    "<div class=\"brush-controls\">\
                     <input type=\"range\" id=\"brush-size-{name}\" min=\"{}\" max=\"{}\" value=\"{}\">\
                     <button type=\"button\" id=\"clear-{name}\">Clear</button>\
                     <button type=\"button\" id=\"undo-{name}\">Undo</button></div>",
                    brush.min, brush.max, brush.value
                );
            }
        }
    }

    let _ = write!(
        out,
        "<div id=\"error-{name}\" class=\"error-message\">{}</div></div>",
        escape(error)
    );
}

fn accept_attr(field: &FieldDescriptor) -> String {
    if field.constraints.accepted_mime_types.is_empty() {
        "image/*".to_string()
    } else {
        field.constraints.accepted_mime_types.join(",")
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
