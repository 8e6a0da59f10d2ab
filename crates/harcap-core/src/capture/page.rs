use super::store::HarDocument;
use crate::har::{Har, Page};
use chrono::{DateTime, Utc};

pub const DEFAULT_PAGE_REF: &str = "Default";
pub const DEFAULT_PAGE_TITLE: &str = "Default";

/// Owns the notion of the "current page" of a document.
///
/// At most one page is open at a time. Opening a page closes the open one
/// first, so the state only ever alternates between no page and one page.
#[derive(Debug, Default)]
pub struct PageLifecycleManager {
    current: Option<String>,
    page_count: u32,
}

impl PageLifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the open page, if any
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Forget the open page and restart the `Page N` numbering
    pub fn reset(&mut self) {
        self.current = None;
        self.page_count = 0;
    }

    /// Open a new page, closing the open one first.
    ///
    /// When a page was open, returns a copy of the document holding only the
    /// pages up to and including the closed one and their entries.
    pub fn open_page(
        &mut self,
        document: &mut HarDocument,
        page_ref: Option<&str>,
        title: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<Har> {
        let closed_slice = self.current.clone().map(|closed| {
            self.close_page(document, now);
            document.snapshot_through_page(&closed)
        });

        let id = match page_ref {
            Some(id) => unique_page_id(document, id),
            None => self.next_generated_id(document),
        };
        let title = title.map(str::to_string).unwrap_or_else(|| id.clone());

        tracing::info!("Opening HAR page '{}' ({})", id, title);

        document.push_page(Page::new(id.clone(), title, now));
        self.current = Some(id);

        closed_slice
    }

    /// Close the open page, recording its onLoad time. A no-op when no page
    /// is open. The default page, wherever it is, gets its timing refreshed too.
    pub fn close_page(&mut self, document: &mut HarDocument, now: DateTime<Utc>) {
        let Some(closed) = self.current.take() else {
            return;
        };

        if let Some(page) = document.page_mut(&closed) {
            page.page_timings.on_load = elapsed_ms(page.started_date_time, now);
            tracing::debug!(
                "Closed HAR page '{}' after {:.0}ms",
                closed,
                page.page_timings.on_load
            );
        }

        if let Some(default) = document.page_titled_mut(DEFAULT_PAGE_TITLE) {
            default.page_timings.on_load = elapsed_ms(default.started_date_time, now);
        }
    }

    /// Id of the open page, or of the default page (created if missing) when
    /// no page is open.
    pub fn current_page_ref(&mut self, document: &mut HarDocument, now: DateTime<Utc>) -> String {
        if let Some(current) = &self.current {
            return current.clone();
        }

        if document.page(DEFAULT_PAGE_REF).is_none() {
            tracing::debug!("Adding default HAR page");
            document.push_page(Page::new(DEFAULT_PAGE_REF, DEFAULT_PAGE_TITLE, now));
        }

        DEFAULT_PAGE_REF.to_string()
    }

    fn next_generated_id(&mut self, document: &HarDocument) -> String {
        loop {
            self.page_count += 1;
            let id = format!("Page {}", self.page_count);
            if document.page(&id).is_none() {
                return id;
            }
        }
    }
}

/// `id`, or `id (n)` for the smallest n that is not taken yet
fn unique_page_id(document: &HarDocument, id: &str) -> String {
    if document.page(id).is_none() {
        return id.to_string();
    }

    (2..)
        .map(|n| format!("{} ({})", id, n))
        .find(|candidate| document.page(candidate).is_none())
        .unwrap_or_else(|| id.to_string())
}

fn elapsed_ms(started: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - started)
        .num_microseconds()
        .map(|us| us.max(0) as f64 / 1000.0)
        .unwrap_or(0.0)
}
