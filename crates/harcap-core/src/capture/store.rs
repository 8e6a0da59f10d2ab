use super::capture_types::CaptureTypeSet;
use super::connection::ConnectionTimingTracker;
use super::page::PageLifecycleManager;
use crate::har::{Entry, Har, Page};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Shared handle to an entry so its flow can finish it without the store lock
pub type EntryHandle = Arc<Mutex<Entry>>;

/// The live HAR document: pages plus entries in request order
#[derive(Debug, Default)]
pub struct HarDocument {
    pages: Vec<Page>,
    entries: Vec<EntryHandle>,
}

impl HarDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn page(&self, id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    pub(crate) fn page_mut(&mut self, id: &str) -> Option<&mut Page> {
        self.pages.iter_mut().find(|p| p.id == id)
    }

    pub(crate) fn page_titled_mut(&mut self, title: &str) -> Option<&mut Page> {
        self.pages.iter_mut().find(|p| p.title == title)
    }

    pub(crate) fn push_page(&mut self, page: Page) {
        self.pages.push(page);
    }

    /// Append an entry. Entries are appended once, when their request is seen.
    pub(crate) fn push_entry(&mut self, entry: Entry) -> EntryHandle {
        let handle = Arc::new(Mutex::new(entry));
        self.entries.push(Arc::clone(&handle));
        handle
    }

    /// A consistent copy of the whole document
    pub fn snapshot(&self) -> Har {
        let mut har = Har::empty();
        har.log.pages = self.pages.clone();
        har.log.entries = self.entries.iter().map(|e| e.lock().clone()).collect();
        har
    }

    /// A copy holding the pages up to and including `page_ref`, in page
    /// order, and the entries that belong to them. The live document is
    /// left untouched.
    pub fn snapshot_through_page(&self, page_ref: &str) -> Har {
        let mut page_refs = HashSet::new();
        for page in &self.pages {
            page_refs.insert(page.id.as_str());
            if page.id == page_ref {
                break;
            }
        }

        let mut har = Har::empty();
        har.log.pages = self
            .pages
            .iter()
            .filter(|p| page_refs.contains(p.id.as_str()))
            .cloned()
            .collect();
        har.log.entries = self
            .entries
            .iter()
            .map(|e| e.lock().clone())
            .filter(|e| page_refs.contains(e.page_ref.as_str()))
            .collect();
        har
    }
}

/// Owns the single live document and everything scoped to it: the page
/// state, the connection tracker and the active capture types.
#[derive(Debug, Default)]
pub struct HarDocumentStore {
    document: Option<HarDocument>,
    pages: PageLifecycleManager,
    connections: ConnectionTimingTracker,
    capture_types: CaptureTypeSet,
}

impl HarDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_live(&mut self, now: DateTime<Utc>) {
        if self.document.is_none() {
            self.start_document(None, None, false, now);
        }
    }

    /// Install an empty document. Connection tracking is left as is, so
    /// setup events seen before the first request still count.
    fn start_document(
        &mut self,
        page_ref: Option<&str>,
        title: Option<&str>,
        create_page: bool,
        now: DateTime<Utc>,
    ) -> &mut HarDocument {
        tracing::info!("Starting new HAR document");

        self.pages.reset();
        let document = self.document.insert(HarDocument::new());
        if create_page {
            self.pages.open_page(document, page_ref, title, now);
        }
        document
    }

    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    /// The live document, created (with an initial page when `create_page`)
    /// if there is none. Never discards an existing document.
    pub fn ensure_document(
        &mut self,
        page_ref: Option<&str>,
        title: Option<&str>,
        create_page: bool,
        now: DateTime<Utc>,
    ) -> &mut HarDocument {
        if self.document.is_none() {
            return self.start_document(page_ref, title, create_page, now);
        }
        self.document.get_or_insert_with(HarDocument::new)
    }

    /// Finalize and return the current document, then start an empty one.
    pub fn new_document(
        &mut self,
        page_ref: Option<&str>,
        title: Option<&str>,
        create_page: bool,
        now: DateTime<Utc>,
    ) -> Option<Har> {
        let previous = self.end_document(now);
        self.start_document(page_ref, title, create_page, now);
        previous
    }

    /// Close the open page, then detach and return the current document.
    /// Connection tracking starts over.
    pub fn end_document(&mut self, now: DateTime<Utc>) -> Option<Har> {
        self.connections = ConnectionTimingTracker::new();
        let mut document = self.document.take()?;
        self.pages.close_page(&mut document, now);

        let har = document.snapshot();
        tracing::info!(
            "Ended HAR document with {} pages and {} entries",
            har.log.pages.len(),
            har.log.entries.len()
        );
        Some(har)
    }

    /// The document to export: a fresh empty one when `clean`, otherwise a
    /// copy of the live document (created if missing). Never replaces the
    /// live document.
    pub fn snapshot_for_export(&mut self, clean: bool, now: DateTime<Utc>) -> Har {
        if clean {
            return Har::empty();
        }
        self.ensure_document(None, None, false, now).snapshot()
    }

    pub fn capture_types(&self) -> &CaptureTypeSet {
        &self.capture_types
    }

    /// Replace the active capture types. Entries already built are unchanged.
    pub fn set_capture_types(&mut self, capture_types: CaptureTypeSet) {
        tracing::info!("HAR capture types set to {}", capture_types);
        self.capture_types = capture_types;
    }

    pub fn open_page(
        &mut self,
        page_ref: Option<&str>,
        title: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<Har> {
        self.ensure_live(now);
        let document = self.document.get_or_insert_with(HarDocument::new);
        self.pages.open_page(document, page_ref, title, now)
    }

    pub fn close_page(&mut self, now: DateTime<Utc>) {
        if let Some(document) = self.document.as_mut() {
            self.pages.close_page(document, now);
        }
    }

    pub fn current_page_ref(&mut self, now: DateTime<Utc>) -> String {
        self.ensure_live(now);
        let document = self.document.get_or_insert_with(HarDocument::new);
        self.pages.current_page_ref(document, now)
    }

    pub fn current_page(&self) -> Option<&str> {
        self.pages.current()
    }

    pub fn connections(&self) -> &ConnectionTimingTracker {
        &self.connections
    }

    pub fn connections_mut(&mut self) -> &mut ConnectionTimingTracker {
        &mut self.connections
    }

    /// Append an entry to the live document, creating the document if needed
    pub fn append_entry(&mut self, entry: Entry, now: DateTime<Utc>) -> EntryHandle {
        self.ensure_document(None, None, false, now).push_entry(entry)
    }

    pub fn snapshot(&self) -> Option<Har> {
        self.document.as_ref().map(HarDocument::snapshot)
    }
}
