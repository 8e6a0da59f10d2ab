//! The HAR capture engine.
//!
//! The host proxy runtime reports flows and connection milestones to a
//! [`HarRecorder`], which turns them into entries of the live HAR document.

mod capture_types;
mod connection;
mod content;
mod entry;
mod flow;
mod page;
mod recorder;
mod store;

pub use capture_types::{CaptureType, CaptureTypeSet};
pub use connection::{
    ConnectionEvent, ConnectionId, ConnectionTimingRecord, ConnectionTimingTracker, SetupTimings,
};
pub use content::is_mostly_binary;
pub use entry::{HarEntryBuilder, NO_RESPONSE_ERROR_MESSAGE};
pub use flow::{
    CONNECTION_FAILED_ERROR_MESSAGE, Flow, FlowFailure, FlowId, RESOLUTION_FAILED_ERROR_MESSAGE,
    RESPONSE_TIMED_OUT_ERROR_MESSAGE, RequestData, ResponseData, ServerConnection,
};
pub use page::{DEFAULT_PAGE_REF, DEFAULT_PAGE_TITLE, PageLifecycleManager};
pub use recorder::HarRecorder;
pub use store::{EntryHandle, HarDocument, HarDocumentStore};
