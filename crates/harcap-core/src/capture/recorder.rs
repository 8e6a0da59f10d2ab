use super::capture_types::CaptureTypeSet;
use super::connection::{ConnectionEvent, ConnectionId, SetupTimings};
use super::entry::HarEntryBuilder;
use super::flow::{Flow, FlowFailure, FlowId};
use super::page::{DEFAULT_PAGE_REF, DEFAULT_PAGE_TITLE};
use super::store::{EntryHandle, HarDocumentStore};
use crate::har::{Har, NOT_APPLICABLE};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe front of the capture engine.
///
/// Document, page state and connection tracking sit behind one coarse lock.
/// Entries that are waiting for their response live in a per-flow map, so
/// completing one flow never waits on another flow's entry. The map is only
/// written with the store lock held.
#[derive(Debug, Default)]
pub struct HarRecorder {
    store: Mutex<HarDocumentStore>,
    in_flight: DashMap<FlowId, EntryHandle>,
    next_flow: AtomicU64,
}

impl HarRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capture_types(capture_types: CaptureTypeSet) -> Self {
        let recorder = Self::new();
        recorder.set_capture_types(capture_types);
        recorder
    }

    /// A fresh correlation key for a new flow
    pub fn next_flow_id(&self) -> FlowId {
        FlowId(self.next_flow.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Snapshot of the live document, creating it (with an initial page) if
    /// there is none
    pub fn ensure_document(&self, page_ref: Option<&str>, title: Option<&str>) -> Har {
        self.store
            .lock()
            .ensure_document(page_ref, title, true, Utc::now())
            .snapshot()
    }

    /// Start a new document with an initial page, returning the previous one
    pub fn new_document(&self, page_ref: Option<&str>, title: Option<&str>) -> Option<Har> {
        let mut store = self.store.lock();
        let previous = store.new_document(page_ref, title, true, Utc::now());
        self.discard_in_flight();
        previous
    }

    /// Finalize and detach the live document
    pub fn end_document(&self) -> Option<Har> {
        let mut store = self.store.lock();
        let ended = store.end_document(Utc::now());
        self.discard_in_flight();
        ended
    }

    pub fn snapshot_for_export(&self, clean: bool) -> Har {
        self.store.lock().snapshot_for_export(clean, Utc::now())
    }

    /// Snapshot of the live document, if there is one
    pub fn snapshot(&self) -> Option<Har> {
        self.store.lock().snapshot()
    }

    pub fn capture_types(&self) -> CaptureTypeSet {
        self.store.lock().capture_types().clone()
    }

    pub fn set_capture_types(&self, capture_types: CaptureTypeSet) {
        self.store.lock().set_capture_types(capture_types);
    }

    /// Open a page, returning the slice through the page it closed, if any
    pub fn open_page(&self, page_ref: Option<&str>, title: Option<&str>) -> Option<Har> {
        self.store.lock().open_page(page_ref, title, Utc::now())
    }

    pub fn close_page(&self) {
        self.store.lock().close_page(Utc::now());
    }

    pub fn current_page_ref(&self) -> String {
        self.store.lock().current_page_ref(Utc::now())
    }

    pub fn record_connection_event(
        &self,
        connection: ConnectionId,
        event: ConnectionEvent,
        at: DateTime<Utc>,
    ) {
        self.store
            .lock()
            .connections_mut()
            .record_connection_event(connection, event, at);
    }

    /// `(connect, ssl)` for the first flow on `connection`, `-1` afterwards
    pub fn connect_and_ssl_durations(&self, connection: ConnectionId) -> (i64, i64) {
        self.store
            .lock()
            .connections_mut()
            .connect_and_ssl_durations(connection)
    }

    /// Record the request of a new flow. The entry is appended right away so
    /// the document follows request order.
    pub fn begin_entry(&self, flow: &Flow) {
        let replaced = {
            let mut store = self.store.lock();
            let now = Utc::now();
            store.ensure_document(Some(DEFAULT_PAGE_REF), Some(DEFAULT_PAGE_TITLE), true, now);
            let page_ref = store.current_page_ref(now);
            let entry = HarEntryBuilder::new(store.capture_types()).begin(&flow.request, &page_ref);
            let handle = store.append_entry(entry, now);
            self.in_flight.insert(flow.id, handle).is_some()
        };

        tracing::debug!("{} {} {}", flow.id, flow.request.method, flow.request.url);

        if replaced {
            tracing::warn!("{} began twice, replacing its in-flight entry", flow.id);
        }
    }

    /// Fill in the response of a flow. Does nothing when the flow carries no
    /// response.
    pub fn complete_entry(&self, flow: &Flow) {
        let Some(response) = &flow.response else {
            tracing::warn!("{} completed without a response", flow.id);
            return;
        };

        let (handle, capture_types, setup, page_ref) = {
            let mut store = self.store.lock();
            let now = Utc::now();
            store.ensure_document(Some(DEFAULT_PAGE_REF), Some(DEFAULT_PAGE_TITLE), true, now);

            let setup = match &flow.server {
                Some(server) => store.connections_mut().setup_timings(server.id),
                None => SetupTimings::NOT_APPLICABLE,
            };
            let page_ref = store.current_page_ref(now);
            let handle = self.take_or_create(&mut store, flow, &page_ref, now);
            (handle, store.capture_types().clone(), setup, page_ref)
        };

        let mut entry = handle.lock();
        HarEntryBuilder::new(&capture_types).complete(&mut entry, flow, response, setup, page_ref);

        tracing::debug!(
            "{} completed with {} in {}ms",
            flow.id,
            response.status,
            entry.time
        );
    }

    /// Record a flow that ended without a response
    pub fn fail_entry(&self, flow: &Flow, failure: FlowFailure, at: DateTime<Utc>) {
        let (handle, capture_types, setup) = {
            let mut store = self.store.lock();
            let now = Utc::now();
            store.ensure_document(Some(DEFAULT_PAGE_REF), Some(DEFAULT_PAGE_TITLE), true, now);

            let setup = match &flow.server {
                Some(server) => store.connections_mut().failed_setup_timings(server.id, at),
                None => (NOT_APPLICABLE, NOT_APPLICABLE),
            };
            let page_ref = store.current_page_ref(now);
            let handle = self.take_or_create(&mut store, flow, &page_ref, now);
            (handle, store.capture_types().clone(), setup)
        };

        let mut entry = handle.lock();
        HarEntryBuilder::new(&capture_types).fail(&mut entry, flow, failure, setup, at);

        tracing::debug!(
            "{} failed: {}",
            flow.id,
            entry.response.error_message.as_deref().unwrap_or_default()
        );
    }

    /// Number of flows whose entry still waits for a response or error
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// The in-flight entry of `flow`, or a new one when the request was never
    /// seen. Called with the store lock held.
    fn take_or_create(
        &self,
        store: &mut HarDocumentStore,
        flow: &Flow,
        page_ref: &str,
        now: DateTime<Utc>,
    ) -> EntryHandle {
        if let Some((_, handle)) = self.in_flight.remove(&flow.id) {
            return handle;
        }

        tracing::debug!("{} has no in-flight entry, creating one", flow.id);
        let entry = HarEntryBuilder::new(store.capture_types()).begin(&flow.request, page_ref);
        store.append_entry(entry, now)
    }

    /// Called with the store lock held, so no flow can begin between the
    /// document switch and the discard.
    fn discard_in_flight(&self) {
        let count = self.in_flight.len();
        self.in_flight.clear();
        tracing::trace!("Discarded {} in-flight entries", count);
    }
}
