mod controller;
pub mod fsm;
pub mod payload;
mod types;

pub use controller::SubmissionController;
pub use fsm::{SubmissionEvent, SubmissionState, SubmissionStateMachine};
pub use payload::{InputPayload, build_payload};
pub use types::{PollPolicy, StatusLevel, StatusLine, SubmissionOutcome, SubmissionRequest};
