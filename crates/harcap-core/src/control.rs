//! Operations exposed to a control plane.
//!
//! Capture features implement [`ControlSurface`] and are collected into a
//! [`ControlRegistry`] at startup. Operations are addressed as
//! `<surface>/<operation>`, e.g. `har/get_har`.

use crate::capture::{CaptureTypeSet, HarRecorder};
use crate::har::{Har, HarWriter};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub name: &'static str,
    pub description: &'static str,
}

/// Named string parameters of an operation call
#[derive(Debug, Clone, Default)]
pub struct ControlParams {
    values: HashMap<String, String>,
}

impl ControlParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// True only for the literal `true`
    pub fn flag(&self, name: &str) -> bool {
        self.get(name) == Some("true")
    }
}

/// Result of an operation: the document it produced and where a copy of it
/// was written
#[derive(Debug, Clone, Default, Serialize)]
pub struct ControlResponse {
    pub path: Option<PathBuf>,
    #[serde(rename = "json")]
    pub har: Option<Har>,
}

pub trait ControlSurface: Send + Sync {
    /// Prefix of this surface's operation paths
    fn name(&self) -> &str;

    fn operations(&self) -> &[Operation];

    fn invoke(&self, operation: &str, params: &ControlParams) -> Result<ControlResponse>;
}

#[derive(Default)]
pub struct ControlRegistry {
    surfaces: Vec<Box<dyn ControlSurface>>,
}

impl ControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, surface: impl ControlSurface + 'static) {
        tracing::debug!(
            "Registered control surface '{}' with {} operations",
            surface.name(),
            surface.operations().len()
        );
        self.surfaces.push(Box::new(surface));
    }

    /// Every operation path, in registration order
    pub fn operations(&self) -> Vec<String> {
        self.surfaces
            .iter()
            .flat_map(|s| {
                s.operations()
                    .iter()
                    .map(move |op| format!("{}/{}", s.name(), op.name))
            })
            .collect()
    }

    /// Invoke an operation by its `<surface>/<operation>` path
    pub fn invoke(&self, path: &str, params: &ControlParams) -> Result<ControlResponse> {
        let unknown = || Error::UnknownOperation(path.to_string());

        let (surface_name, operation) = path.split_once('/').ok_or_else(unknown)?;
        let surface = self
            .surfaces
            .iter()
            .find(|s| s.name() == surface_name)
            .ok_or_else(unknown)?;

        if !surface.operations().iter().any(|op| op.name == operation) {
            return Err(unknown());
        }

        surface.invoke(operation, params)
    }
}

const HAR_OPERATIONS: &[Operation] = &[
    Operation {
        name: "get_har",
        description: "Export the live HAR, or an empty one with cleanHar=true",
    },
    Operation {
        name: "new_har",
        description: "Start a new HAR with an initial page and return the previous one",
    },
    Operation {
        name: "end_har",
        description: "Finalize and return the live HAR",
    },
    Operation {
        name: "new_page",
        description: "Open a new page and return the HAR through the page it closed",
    },
    Operation {
        name: "end_page",
        description: "Close the open page",
    },
    Operation {
        name: "set_har_capture_types",
        description: "Replace the active capture types",
    },
];

/// Control surface of the HAR recorder
pub struct HarControl {
    recorder: Arc<HarRecorder>,
}

impl HarControl {
    pub fn new(recorder: Arc<HarRecorder>) -> Self {
        Self { recorder }
    }

    pub fn get_har(&self, clean: bool) -> Result<ControlResponse> {
        export(Some(self.recorder.snapshot_for_export(clean)))
    }

    pub fn new_har(&self, page_ref: Option<&str>, title: Option<&str>) -> Result<ControlResponse> {
        export(self.recorder.new_document(page_ref, title))
    }

    pub fn end_har(&self) -> Result<ControlResponse> {
        export(self.recorder.end_document())
    }

    pub fn new_page(&self, page_ref: Option<&str>, title: Option<&str>) -> Result<ControlResponse> {
        export(self.recorder.open_page(page_ref, title))
    }

    pub fn end_page(&self) -> Result<ControlResponse> {
        self.recorder.close_page();
        export(self.recorder.snapshot())
    }

    /// Validate the whole list before applying any of it
    pub fn set_har_capture_types(&self, list: &str) -> Result<ControlResponse> {
        let capture_types = CaptureTypeSet::parse(list).inspect_err(|e| {
            tracing::warn!("Rejected capture types '{}': {}", list, e);
        })?;
        self.recorder.set_capture_types(capture_types);
        Ok(ControlResponse::default())
    }
}

impl ControlSurface for HarControl {
    fn name(&self) -> &str {
        "har"
    }

    fn operations(&self) -> &[Operation] {
        HAR_OPERATIONS
    }

    fn invoke(&self, operation: &str, params: &ControlParams) -> Result<ControlResponse> {
        let page_ref = params.get("pageRef");
        let title = params.get("pageTitle");

        match operation {
            "get_har" => self.get_har(params.flag("cleanHar")),
            "new_har" => self.new_har(page_ref, title),
            "end_har" => self.end_har(),
            "new_page" => self.new_page(page_ref, title),
            "end_page" => self.end_page(),
            "set_har_capture_types" => {
                self.set_har_capture_types(params.get("captureTypes").unwrap_or_default())
            }
            _ => Err(Error::UnknownOperation(format!("har/{}", operation))),
        }
    }
}

/// Write the document to a temp file. With no document an empty one is
/// exported.
fn export(har: Option<Har>) -> Result<ControlResponse> {
    let har = har.unwrap_or_else(Har::empty);
    let path = HarWriter::to_temp_file(&har)?;

    tracing::info!(
        "Exported HAR with {} entries to {}",
        har.log.entries.len(),
        path.display()
    );

    Ok(ControlResponse {
        path: Some(path),
        har: Some(har),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureType, Flow, RequestData};
    use crate::har::{HarReader, TEMP_FILE_PREFIX};
    use chrono::Utc;
    use std::fs;

    fn registry() -> (ControlRegistry, Arc<HarRecorder>) {
        let recorder = Arc::new(HarRecorder::new());
        let mut registry = ControlRegistry::new();
        registry.register(HarControl::new(Arc::clone(&recorder)));
        (registry, recorder)
    }

    fn request(recorder: &HarRecorder, url: &str) {
        let flow = Flow::new(recorder.next_flow_id(), RequestData::new("GET", url, Utc::now()));
        recorder.begin_entry(&flow);
    }

    fn cleanup(response: &ControlResponse) {
        if let Some(path) = &response.path {
            let _ = fs::remove_file(path);
        }
    }

    #[test]
    fn test_registry_lists_har_operations() {
        let (registry, _) = registry();
        let ops = registry.operations();

        assert_eq!(ops.len(), 6);
        assert!(ops.contains(&"har/get_har".to_string()));
        assert!(ops.contains(&"har/set_har_capture_types".to_string()));
    }

    #[test]
    fn test_unknown_operations_are_rejected() {
        let (registry, _) = registry();
        let params = ControlParams::new();

        for path in ["har/delete_har", "blacklist/set", "get_har"] {
            let err = registry.invoke(path, &params).unwrap_err();
            assert!(matches!(err, Error::UnknownOperation(p) if p == path));
        }
    }

    #[test]
    fn test_get_har_exports_to_temp_file() {
        let (registry, recorder) = registry();
        request(&recorder, "http://x/");

        let response = registry.invoke("har/get_har", &ControlParams::new()).unwrap();
        let path = response.path.clone().unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(TEMP_FILE_PREFIX));
        assert!(name.ends_with(".json"));

        let written = HarReader::from_file(&path).unwrap();
        assert_eq!(written.log.entries.len(), 1);
        assert_eq!(response.har.as_ref().unwrap().log.entries.len(), 1);
        cleanup(&response);
    }

    #[test]
    fn test_clean_get_har_does_not_disturb_capture() {
        let (registry, recorder) = registry();
        request(&recorder, "http://x/");

        let params = ControlParams::new().with("cleanHar", "true");
        let response = registry.invoke("har/get_har", &params).unwrap();
        assert!(response.har.as_ref().unwrap().log.entries.is_empty());
        cleanup(&response);

        assert_eq!(recorder.snapshot().unwrap().log.entries.len(), 1);
    }

    #[test]
    fn test_new_har_returns_previous_document() {
        let (registry, recorder) = registry();
        request(&recorder, "http://x/");

        let params = ControlParams::new()
            .with("pageRef", "Login")
            .with("pageTitle", "Login page");
        let response = registry.invoke("har/new_har", &params).unwrap();
        assert_eq!(response.har.as_ref().unwrap().log.entries.len(), 1);
        cleanup(&response);

        let live = recorder.snapshot().unwrap();
        assert!(live.log.entries.is_empty());
        assert_eq!(live.log.pages[0].id, "Login");
        assert_eq!(live.log.pages[0].title, "Login page");
    }

    #[test]
    fn test_new_page_returns_slice_of_closed_page() {
        let (registry, recorder) = registry();
        let control = HarControl::new(Arc::clone(&recorder));

        let first = control.new_page(Some("P1"), None).unwrap();
        assert!(first.har.as_ref().unwrap().log.pages.is_empty());
        cleanup(&first);

        request(&recorder, "http://x/1");
        let params = ControlParams::new().with("pageRef", "P2");
        let second = registry.invoke("har/new_page", &params).unwrap();
        let slice = second.har.as_ref().unwrap();
        assert_eq!(slice.log.pages.len(), 1);
        assert_eq!(slice.log.entries.len(), 1);
        cleanup(&second);
    }

    #[test]
    fn test_end_page_and_end_har() {
        let (registry, recorder) = registry();
        recorder.open_page(Some("P1"), None);

        let ended_page = registry.invoke("har/end_page", &ControlParams::new()).unwrap();
        assert_eq!(ended_page.har.as_ref().unwrap().log.pages.len(), 1);
        cleanup(&ended_page);
        assert_eq!(recorder.snapshot().unwrap().log.pages.len(), 1);

        let ended = registry.invoke("har/end_har", &ControlParams::new()).unwrap();
        assert_eq!(ended.har.as_ref().unwrap().log.pages.len(), 1);
        cleanup(&ended);
        assert!(recorder.snapshot().is_none());
    }

    #[test]
    fn test_set_capture_types_validates_whole_list() {
        let (registry, recorder) = registry();

        let valid = ControlParams::new().with("captureTypes", "[REQUEST_HEADERS, RESPONSE_CONTENT]");
        let response = registry.invoke("har/set_har_capture_types", &valid).unwrap();
        assert!(response.path.is_none());
        assert!(recorder.capture_types().contains(CaptureType::RequestHeaders));
        assert!(recorder.capture_types().contains(CaptureType::ResponseContent));

        let invalid = ControlParams::new().with("captureTypes", "[REQUEST_HEADERS, BOGUS]");
        let err = registry
            .invoke("har/set_har_capture_types", &invalid)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCaptureType(name) if name == "BOGUS"));

        // The previous configuration is untouched
        assert!(recorder.capture_types().contains(CaptureType::ResponseContent));
    }

    #[test]
    fn test_response_serializes_path_and_json() {
        let response = ControlResponse {
            path: Some(PathBuf::from("/tmp/har_dump_x.json")),
            har: Some(Har::empty()),
        };
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["path"], "/tmp/har_dump_x.json");
        assert_eq!(value["json"]["log"]["version"], "1.1");
    }
}
