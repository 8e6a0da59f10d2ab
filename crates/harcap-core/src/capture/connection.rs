use crate::har::NOT_APPLICABLE;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Identity of one physical upstream connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection setup milestones reported by the proxy runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    ResolvingStarted,
    ResolvingFinished,
    TcpConnected,
    TlsHandshakeStarted,
    /// The connection is usable, TLS included
    Established,
}

/// First-seen setup timestamps of a connection
#[derive(Debug, Clone, Default)]
pub struct ConnectionTimingRecord {
    pub resolving_started: Option<DateTime<Utc>>,
    pub resolving_finished: Option<DateTime<Utc>>,
    pub tcp_connected: Option<DateTime<Utc>>,
    pub tls_handshake_started: Option<DateTime<Utc>>,
    pub established: Option<DateTime<Utc>>,
    /// Earliest event of any kind
    pub first_seen: Option<DateTime<Utc>>,
}

impl ConnectionTimingRecord {
    fn slot(&mut self, event: ConnectionEvent) -> &mut Option<DateTime<Utc>> {
        match event {
            ConnectionEvent::ResolvingStarted => &mut self.resolving_started,
            ConnectionEvent::ResolvingFinished => &mut self.resolving_finished,
            ConnectionEvent::TcpConnected => &mut self.tcp_connected,
            ConnectionEvent::TlsHandshakeStarted => &mut self.tls_handshake_started,
            ConnectionEvent::Established => &mut self.established,
        }
    }

    /// Start of the connect phase: after name resolution when it was observed
    fn connect_started(&self) -> Option<DateTime<Utc>> {
        self.resolving_finished
            .or(self.resolving_started)
            .or(self.first_seen)
    }

    fn dns_ms(&self) -> i64 {
        match (self.resolving_started, self.resolving_finished) {
            (Some(start), Some(end)) => millis_between(start, end),
            _ => NOT_APPLICABLE,
        }
    }

    fn connect_ms(&self) -> i64 {
        let end = self.tcp_connected.or(self.established);
        match (self.connect_started(), end) {
            (Some(start), Some(end)) => millis_between(start, end),
            _ => NOT_APPLICABLE,
        }
    }

    fn ssl_ms(&self) -> i64 {
        match (self.tls_handshake_started, self.established) {
            (Some(start), Some(end)) => millis_between(start, end),
            _ => NOT_APPLICABLE,
        }
    }
}

/// Setup durations attributable to a flow, `-1` when not applicable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupTimings {
    pub dns: i64,
    pub connect: i64,
    pub ssl: i64,
}

impl SetupTimings {
    pub const NOT_APPLICABLE: SetupTimings = SetupTimings {
        dns: NOT_APPLICABLE,
        connect: NOT_APPLICABLE,
        ssl: NOT_APPLICABLE,
    };
}

/// Tracks connection setup so reused connections do not count setup time twice.
///
/// Scoped to a capture session: it is reset when a document is explicitly
/// started or ended, never when one is created lazily.
#[derive(Debug, Default)]
pub struct ConnectionTimingTracker {
    records: HashMap<ConnectionId, ConnectionTimingRecord>,
    seen: HashSet<ConnectionId>,
}

impl ConnectionTimingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a setup milestone. Only the first timestamp of each kind is kept,
    /// and nothing is recorded for connections already accounted for.
    pub fn record_connection_event(
        &mut self,
        connection: ConnectionId,
        event: ConnectionEvent,
        at: DateTime<Utc>,
    ) {
        if self.seen.contains(&connection) {
            return;
        }

        let record = self.records.entry(connection).or_default();
        record.first_seen.get_or_insert(at);
        record.slot(event).get_or_insert(at);
    }

    /// `(connect, ssl)` in milliseconds for the flow that first uses `connection`;
    /// `-1` for both on any later call.
    pub fn connect_and_ssl_durations(&mut self, connection: ConnectionId) -> (i64, i64) {
        let timings = self.setup_timings(connection);
        (timings.connect, timings.ssl)
    }

    /// Setup timings for the flow that first uses `connection`. The connection
    /// is marked seen, so every later call returns [`SetupTimings::NOT_APPLICABLE`].
    pub fn setup_timings(&mut self, connection: ConnectionId) -> SetupTimings {
        if !self.seen.insert(connection) {
            return SetupTimings::NOT_APPLICABLE;
        }

        match self.records.remove(&connection) {
            Some(record) => SetupTimings {
                dns: record.dns_ms(),
                connect: record.connect_ms(),
                ssl: record.ssl_ms(),
            },
            None => SetupTimings::NOT_APPLICABLE,
        }
    }

    /// `(dns, connect)` for a connection that failed before completing setup,
    /// measuring unfinished phases up to `now`. The connection's record is
    /// dropped.
    pub fn failed_setup_timings(
        &mut self,
        connection: ConnectionId,
        now: DateTime<Utc>,
    ) -> (i64, i64) {
        let Some(record) = self.records.remove(&connection) else {
            return (NOT_APPLICABLE, NOT_APPLICABLE);
        };

        let dns = match record.resolving_started {
            Some(start) => millis_between(start, record.resolving_finished.unwrap_or(now)),
            None => NOT_APPLICABLE,
        };
        let connect = match record.connect_started() {
            Some(start) => millis_between(start, now),
            None => NOT_APPLICABLE,
        };

        (dns, connect)
    }

    pub fn is_seen(&self, connection: ConnectionId) -> bool {
        self.seen.contains(&connection)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Connections with setup events that no flow has claimed yet
    pub fn pending_count(&self) -> usize {
        self.records.len()
    }
}

/// Whole milliseconds from `start` to `end`, clamped at zero
pub(crate) fn millis_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_milliseconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn at(base: DateTime<Utc>, ms: i64) -> DateTime<Utc> {
        base + TimeDelta::milliseconds(ms)
    }

    #[test]
    fn test_second_query_returns_sentinels() {
        let base = Utc::now();
        let conn = ConnectionId(1);
        let mut tracker = ConnectionTimingTracker::new();

        tracker.record_connection_event(conn, ConnectionEvent::ResolvingStarted, at(base, 0));
        tracker.record_connection_event(conn, ConnectionEvent::ResolvingFinished, at(base, 5));
        tracker.record_connection_event(conn, ConnectionEvent::TcpConnected, at(base, 25));

        let (connect, ssl) = tracker.connect_and_ssl_durations(conn);
        assert_eq!(connect, 20);
        assert_eq!(ssl, -1);

        assert_eq!(tracker.connect_and_ssl_durations(conn), (-1, -1));
        assert!(tracker.is_seen(conn));
    }

    #[test]
    fn test_tls_connection_reports_ssl() {
        let base = Utc::now();
        let conn = ConnectionId(7);
        let mut tracker = ConnectionTimingTracker::new();

        tracker.record_connection_event(conn, ConnectionEvent::ResolvingStarted, at(base, 0));
        tracker.record_connection_event(conn, ConnectionEvent::ResolvingFinished, at(base, 3));
        tracker.record_connection_event(conn, ConnectionEvent::TcpConnected, at(base, 13));
        tracker.record_connection_event(conn, ConnectionEvent::TlsHandshakeStarted, at(base, 13));
        tracker.record_connection_event(conn, ConnectionEvent::Established, at(base, 43));

        let timings = tracker.setup_timings(conn);
        assert_eq!(timings.dns, 3);
        assert_eq!(timings.connect, 10);
        assert_eq!(timings.ssl, 30);
    }

    #[test]
    fn test_first_timestamp_wins() {
        let base = Utc::now();
        let conn = ConnectionId(2);
        let mut tracker = ConnectionTimingTracker::new();

        tracker.record_connection_event(conn, ConnectionEvent::ResolvingStarted, at(base, 0));
        tracker.record_connection_event(conn, ConnectionEvent::ResolvingStarted, at(base, 50));
        tracker.record_connection_event(conn, ConnectionEvent::ResolvingFinished, at(base, 60));

        assert_eq!(tracker.setup_timings(conn).dns, 60);
    }

    #[test]
    fn test_unknown_connection_is_not_applicable_but_marked_seen() {
        let mut tracker = ConnectionTimingTracker::new();
        let conn = ConnectionId(3);

        assert_eq!(tracker.setup_timings(conn), SetupTimings::NOT_APPLICABLE);
        assert_eq!(tracker.seen_count(), 1);
    }

    #[test]
    fn test_events_after_first_use_are_ignored() {
        let base = Utc::now();
        let conn = ConnectionId(4);
        let mut tracker = ConnectionTimingTracker::new();

        tracker.record_connection_event(conn, ConnectionEvent::TcpConnected, at(base, 0));
        tracker.setup_timings(conn);
        tracker.record_connection_event(conn, ConnectionEvent::ResolvingStarted, at(base, 10));

        assert!(tracker.failed_setup_timings(conn, at(base, 20)) == (-1, -1));
    }

    #[test]
    fn test_failed_setup_measures_up_to_now() {
        let base = Utc::now();
        let conn = ConnectionId(5);
        let mut tracker = ConnectionTimingTracker::new();

        tracker.record_connection_event(conn, ConnectionEvent::ResolvingStarted, at(base, 0));

        let (dns, connect) = tracker.failed_setup_timings(conn, at(base, 40));
        assert_eq!(dns, 40);
        assert_eq!(connect, 40);
    }

    #[test]
    fn test_failed_connection_record_is_dropped() {
        let base = Utc::now();
        let conn = ConnectionId(6);
        let mut tracker = ConnectionTimingTracker::new();

        tracker.record_connection_event(conn, ConnectionEvent::ResolvingStarted, at(base, 0));
        tracker.record_connection_event(conn, ConnectionEvent::ResolvingFinished, at(base, 4));
        assert_eq!(tracker.pending_count(), 1);

        assert_eq!(tracker.failed_setup_timings(conn, at(base, 30)), (4, 26));
        assert_eq!(tracker.pending_count(), 0);
        assert_eq!(tracker.failed_setup_timings(conn, at(base, 50)), (-1, -1));
    }
}
