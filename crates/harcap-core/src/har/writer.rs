use super::types::Har;
use crate::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Prefix of the temporary files produced by [`HarWriter::to_temp_file`]
pub const TEMP_FILE_PREFIX: &str = "har_dump_";

pub struct HarWriter;

impl HarWriter {
    /// Write a HAR document to a file as 2-space indented JSON
    pub fn to_file(har: &Har, path: &Path) -> Result<()> {
        tracing::debug!("Writing HAR file to: {}", path.display());

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, har)?;
        writer.flush()?;

        tracing::info!(
            "Wrote HAR file with {} entries to {}",
            har.log.entries.len(),
            path.display()
        );

        Ok(())
    }

    /// Write a HAR document to a new, persisted temporary file and return its path
    pub fn to_temp_file(har: &Har) -> Result<PathBuf> {
        let file = tempfile::Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .suffix(".json")
            .tempfile()?;

        {
            let mut writer = BufWriter::new(file.as_file());
            serde_json::to_writer_pretty(&mut writer, har)?;
            writer.flush()?;
        }

        let (_, path) = file.keep().map_err(|e| e.error)?;

        tracing::debug!("Exported HAR to {}", path.display());

        Ok(path)
    }

    /// Convert a HAR document to a 2-space indented JSON string
    pub fn to_string(har: &Har) -> Result<String> {
        Ok(serde_json::to_string_pretty(har)?)
    }

    /// Convert a HAR document to a compact JSON string
    pub fn to_string_compact(har: &Har) -> Result<String> {
        Ok(serde_json::to_string(har)?)
    }
}
