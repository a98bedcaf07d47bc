use super::{mask::MaskCanvas, render, upload::UploadedFile};
use crate::{
    Error, Result,
    schema::{FieldDescriptor, FieldKind},
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// What the browser currently holds in one control.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlValue {
    Checked(bool),
    Text(String),
    File(UploadedFile),
}

impl ControlValue {
    /// Maps a JSON control value the way a browser form would hold it.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Bool(checked) => ControlValue::Checked(*checked),
            Value::String(text) => ControlValue::Text(text.clone()),
            Value::Null => ControlValue::Text(String::new()),
            Value::Array(items) => ControlValue::Text(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            other => ControlValue::Text(other.to_string()),
        }
    }
}

/// Control values frozen for one submission, so the session lock is not held
/// while the job runs.
#[derive(Debug, Clone, Default)]
pub struct FormSnapshot {
    pub values: HashMap<String, ControlValue>,
    pub mask: Option<String>,
}

/// Live state of the rendered form for the current model.
#[derive(Debug, Default)]
pub struct FormState {
    descriptors: Vec<FieldDescriptor>,
    values: HashMap<String, ControlValue>,
    errors: BTreeMap<String, String>,
    mask: Option<MaskCanvas>,
}

impl FormState {
    pub fn new(descriptors: Vec<FieldDescriptor>) -> Self {
        info!("Form built with {} fields", descriptors.len());
        Self {
            descriptors,
            ..Self::default()
        }
    }

    pub fn descriptors(&self) -> &[FieldDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, name: &str) -> Result<&FieldDescriptor> {
        self.descriptors
            .iter()
            .find(|field| field.name == name)
            .ok_or_else(|| Error::invalid_field(name, "no such field for this model"))
    }

    pub fn value(&self, name: &str) -> Option<&ControlValue> {
        self.values.get(name)
    }

    pub fn set_value(&mut self, name: &str, value: ControlValue) -> Result<()> {
        let kind = self.descriptor(name)?.kind;
        match (&value, kind) {
            (ControlValue::File(_), _) | (_, FieldKind::ImageUri | FieldKind::MaskUri) => {
                return Err(Error::invalid_field(name, "use the upload endpoint for files"));
            }
            (ControlValue::Checked(_), kind) if kind != FieldKind::Boolean => {
                return Err(Error::invalid_field(name, "expected a text value"));
            }
            _ => {}
        }
        self.touch(name);
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Any interaction with a field clears its error.
    pub fn touch(&mut self, name: &str) {
        self.errors.remove(name);
    }

    pub fn record_error(&mut self, name: &str, message: impl Into<String>) {
        let message = message.into();
        debug!("Field '{}' error: {}", name, message);
        self.errors.insert(name.to_string(), message);
    }

    pub fn error(&self, name: &str) -> Option<&str> {
        self.errors.get(name).map(String::as_str)
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    /// Stores a validated upload. For the mask field the upload is the
    /// reference image, and a blank canvas of its natural size goes on top.
    pub fn accept_upload(
        &mut self,
        name: &str,
        file: UploadedFile,
        display_size: Option<(f32, f32)>,
    ) -> Result<()> {
        let kind = self.descriptor(name)?.kind;
        if !kind.is_upload() {
            return Err(Error::invalid_field(name, "field does not take files"));
        }
        self.touch(name);

        if kind == FieldKind::MaskUri {
            let natural = file
                .dimensions
                .ok_or_else(|| Error::upload("Mask reference must be an image"))?;
            let (width, height) =
                display_size.unwrap_or((natural.width as f32, natural.height as f32));
            self.mask = Some(MaskCanvas::new(natural, width, height)?);
        }

        self.values.insert(name.to_string(), ControlValue::File(file));
        Ok(())
    }

    /// Records the rejection and clears the selection.
    pub fn reject_upload(&mut self, name: &str, error: &Error) {
        self.values.remove(name);
        if self.is_mask_field(name) {
            self.mask = None;
        }
        self.record_error(name, error.to_string());
    }

    pub fn remove_upload(&mut self, name: &str) -> Result<()> {
        let kind = self.descriptor(name)?.kind;
        self.touch(name);
        self.values.remove(name);
        if kind == FieldKind::MaskUri {
            self.mask = None;
        }
        Ok(())
    }

    pub fn mask(&self) -> Option<&MaskCanvas> {
        self.mask.as_ref()
    }

    pub fn mask_mut(&mut self) -> Result<&mut MaskCanvas> {
        if let Some(field) = self
            .descriptors
            .iter()
            .find(|field| field.kind == FieldKind::MaskUri)
        {
            self.errors.remove(&field.name);
        }
        self.mask
            .as_mut()
            .ok_or_else(|| Error::invalid_field("mask", "upload a reference image first"))
    }

    pub fn snapshot(&self) -> Result<FormSnapshot> {
        let mask = match &self.mask {
            Some(canvas) => Some(canvas.to_data_uri()?),
            None => None,
        };
        Ok(FormSnapshot {
            values: self.values.clone(),
            mask,
        })
    }

    pub fn render_html(&self) -> String {
        render::render_form(&self.descriptors, &self.errors)
    }

    fn is_mask_field(&self, name: &str) -> bool {
        self.descriptors
            .iter()
            .any(|field| field.name == name && field.kind == FieldKind::MaskUri)
    }
}
