mod reader;
mod types;
mod writer;

pub use reader::HarReader;
pub use types::*;
pub use writer::{HarWriter, TEMP_FILE_PREFIX};
