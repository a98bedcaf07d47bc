mod interpreter;
mod types;

pub use interpreter::{extract_input_schema, interpret, interpret_version, InputSchema};
pub use types::{Constraints, Dimensions, FieldDescriptor, FieldKind, InterpretOptions};
