pub mod capture;
pub mod control;
pub mod error;
pub mod har;

pub use capture::{CaptureType, CaptureTypeSet, HarRecorder};
pub use error::{Error, Result};
