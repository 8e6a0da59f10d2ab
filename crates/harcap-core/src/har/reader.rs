use super::types::{Entry, Har};
use crate::{Error, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub struct HarReader;

impl HarReader {
    /// Read and parse an exported HAR file
    pub fn from_file(path: &Path) -> Result<Har> {
        tracing::debug!("Reading HAR file from: {}", path.display());

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let har: Har = serde_json::from_reader(reader)?;

        tracing::debug!(
            "Parsed HAR file with {} pages and {} entries",
            har.log.pages.len(),
            har.log.entries.len()
        );

        Ok(har)
    }

    /// Parse a HAR document from a JSON string
    pub fn from_str(content: &str) -> Result<Har> {
        let har: Har = serde_json::from_str(content)?;
        Ok(har)
    }

    /// Check that a document is well-formed: a version, unique page ids and
    /// entries that reference a page of the same document.
    pub fn validate(har: &Har) -> Result<()> {
        if har.log.version.is_empty() {
            return Err(Error::InvalidStructure("Missing HAR version".to_string()));
        }

        let mut page_ids = HashSet::new();
        for page in &har.log.pages {
            if !page_ids.insert(page.id.as_str()) {
                return Err(Error::InvalidStructure(format!(
                    "Duplicate page id '{}'",
                    page.id
                )));
            }
        }

        har.log
            .entries
            .iter()
            .enumerate()
            .try_for_each(|(idx, entry)| check_entry(idx, entry, &page_ids))
    }
}

fn check_entry(idx: usize, entry: &Entry, page_ids: &HashSet<&str>) -> Result<()> {
    let problem = if entry.request.method.is_empty() {
        "has no request method".to_string()
    } else if entry.request.url.is_empty() {
        "has no request URL".to_string()
    } else if !page_ids.contains(entry.page_ref.as_str()) {
        format!("references unknown page '{}'", entry.page_ref)
    } else {
        return Ok(());
    };

    Err(Error::InvalidStructure(format!("Entry {} {}", idx, problem)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_default_to_empty() {
        let har = HarReader::from_str(
            r#"{"log": {"version": "1.1", "creator": {"name": "test", "version": "1.0"}, "entries": []}}"#,
        )
        .unwrap();

        assert!(har.log.pages.is_empty());
        assert!(HarReader::validate(&har).is_ok());
    }

    #[test]
    fn test_validate_empty_version() {
        let har_json = r#"{
            "log": {
                "version": "",
                "creator": {"name": "test", "version": "1.0"},
                "entries": []
            }
        }"#;

        let har = HarReader::from_str(har_json).unwrap();
        assert!(HarReader::validate(&har).is_err());
    }

    #[test]
    fn test_validate_rejects_dangling_page_ref() {
        let har_json = r#"{
            "log": {
                "version": "1.1",
                "creator": {"name": "test", "version": "1.0"},
                "pages": [],
                "entries": [{
                    "pageref": "Page 1",
                    "startedDateTime": "2024-01-01T00:00:00Z",
                    "time": 0,
                    "request": {
                        "method": "GET", "url": "http://x/", "httpVersion": "HTTP/1.1",
                        "cookies": [], "headers": [], "queryString": [],
                        "headersSize": 0, "bodySize": 0
                    },
                    "response": {
                        "status": 200, "statusText": "OK", "httpVersion": "HTTP/1.1",
                        "cookies": [], "headers": [],
                        "content": {"size": 0, "mimeType": ""},
                        "redirectURL": "", "headersSize": 0, "bodySize": 0
                    },
                    "timings": {"send": 0, "wait": 0, "receive": 0}
                }]
            }
        }"#;

        let har = HarReader::from_str(har_json).unwrap();
        let err = HarReader::validate(&har).unwrap_err();
        assert!(err.to_string().contains("Page 1"));
    }
}
