pub mod mask;
pub mod render;
mod state;
pub mod upload;

pub use mask::MaskCanvas;
pub use render::{Widget, render_form, widgets};
pub use state::{ControlValue, FormSnapshot, FormState};
pub use upload::{DataUri, UploadedFile, validate_upload};
