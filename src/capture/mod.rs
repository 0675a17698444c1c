pub mod controller;
pub mod loop_worker;
pub mod source;

pub use controller::CaptureController;
pub use source::{JsonLinesSource, Sighting, SightingSource, UNRECOGNIZED};
