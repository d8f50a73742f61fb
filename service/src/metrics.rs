//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Lock-free metrics for the chat server

use metrics::{counter, gauge};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free server metrics
///
/// All counters are atomics and can be updated from any session task.
/// Each update is also forwarded to the `metrics` facade so an exporter
/// installed by the embedding binary sees the same numbers.
#[derive(Debug)]
pub struct ServerMetrics {
    // Sessions
    sessions_opened: AtomicU64,
    active_sessions: AtomicU64,
    sessions_rejected: AtomicU64,

    // Traffic
    messages_received: AtomicU64,
    messages_sent: AtomicU64,
    disconnect_requests: AtomicU64,

    // Errors
    connection_errors: AtomicU64,
    accept_errors: AtomicU64,
    shutdown_failures: AtomicU64,

    // Timing (stored as nanoseconds)
    total_session_duration_ns: AtomicU64,
    sessions_closed: AtomicU64,

    started_at: Instant,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            sessions_opened: AtomicU64::new(0),
            active_sessions: AtomicU64::new(0),
            sessions_rejected: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            disconnect_requests: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            accept_errors: AtomicU64::new(0),
            shutdown_failures: AtomicU64::new(0),
            total_session_duration_ns: AtomicU64::new(0),
            sessions_closed: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    // Session tracking

    /// Record a session being registered
    pub fn session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
        counter!("parley.sessions.opened").increment(1);
        gauge!("parley.sessions.active").increment(1.0);
    }

    /// Record a session's handler finishing cleanup
    pub fn session_closed(&self, duration: Duration) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
        self.total_session_duration_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        counter!("parley.sessions.closed").increment(1);
        gauge!("parley.sessions.active").decrement(1.0);
    }

    /// Record a connection dropped because the session limit was reached
    pub fn session_rejected(&self) {
        self.sessions_rejected.fetch_add(1, Ordering::Relaxed);
        counter!("parley.sessions.rejected").increment(1);
    }

    /// Get the current number of live sessions
    pub fn active_sessions(&self) -> u64 {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// Get the total number of sessions since server start
    pub fn total_sessions(&self) -> u64 {
        self.sessions_opened.load(Ordering::Relaxed)
    }

    // Traffic tracking

    /// Record a chat line received
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        counter!("parley.messages.received").increment(1);
    }

    /// Record a reply sent
    pub fn message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        counter!("parley.messages.sent").increment(1);
    }

    /// Record a disconnect sentinel
    pub fn disconnect_requested(&self) {
        self.disconnect_requests.fetch_add(1, Ordering::Relaxed);
        counter!("parley.sessions.disconnect_requests").increment(1);
    }

    // Error tracking

    /// Record a per-connection read or write failure
    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
        counter!("parley.errors.connection").increment(1);
    }

    /// Record a failed accept
    pub fn accept_error(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
        counter!("parley.errors.accept").increment(1);
    }

    /// Record a session that could not be notified or closed during shutdown
    pub fn shutdown_failure(&self) {
        self.shutdown_failures.fetch_add(1, Ordering::Relaxed);
        counter!("parley.errors.shutdown").increment(1);
    }

    // Snapshot

    /// Get a snapshot of all metrics
    ///
    /// Counters are read one at a time, so a snapshot taken while sessions
    /// are active may be slightly skewed between fields.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_sessions: self.sessions_opened.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            sessions_rejected: self.sessions_rejected.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            disconnect_requests: self.disconnect_requests.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            accept_errors: self.accept_errors.load(Ordering::Relaxed),
            shutdown_failures: self.shutdown_failures.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
            avg_session_duration: self.average_session_duration(),
        }
    }

    fn average_session_duration(&self) -> Duration {
        let closed = self.sessions_closed.load(Ordering::Relaxed);
        if closed == 0 {
            return Duration::ZERO;
        }
        let total_ns = self.total_session_duration_ns.load(Ordering::Relaxed);
        Duration::from_nanos(total_ns / closed)
    }
}

/// A snapshot of server metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Sessions registered since server start
    pub total_sessions: u64,
    /// Sessions whose handler has not finished
    pub active_sessions: u64,
    /// Connections dropped at the session limit
    pub sessions_rejected: u64,
    /// Chat lines received
    pub messages_received: u64,
    /// Replies sent
    pub messages_sent: u64,
    /// Disconnect sentinels received
    pub disconnect_requests: u64,
    /// Per-connection I/O failures
    pub connection_errors: u64,
    /// Failed accepts
    pub accept_errors: u64,
    /// Sessions not cleanly notified or closed during shutdown
    pub shutdown_failures: u64,
    /// Server uptime
    pub uptime: Duration,
    /// Average duration of finished sessions
    pub avg_session_duration: Duration,
}

impl MetricsSnapshot {
    /// Calculate messages per second (received)
    pub fn messages_received_per_sec(&self) -> f64 {
        if self.uptime.is_zero() {
            return 0.0;
        }
        self.messages_received as f64 / self.uptime.as_secs_f64()
    }

    /// Calculate total error count
    pub fn total_errors(&self) -> u64 {
        self.connection_errors + self.accept_errors + self.shutdown_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConnectionConfig, LineConnection};
    use metrics::{
        Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use tokio::io::AsyncWriteExt;

    /// Recorder that keeps counters by name
    #[derive(Default)]
    struct CountingRecorder {
        counters: Mutex<HashMap<String, Arc<AtomicU64>>>,
    }

    impl CountingRecorder {
        fn count(&self, name: &str) -> u64 {
            self.counters
                .lock()
                .unwrap()
                .get(name)
                .map_or(0, |counter| counter.load(Ordering::Relaxed))
        }
    }

    impl Recorder for CountingRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            let counter = self
                .counters
                .lock()
                .unwrap()
                .entry(key.name().to_string())
                .or_default()
                .clone();
            Counter::from_arc(counter)
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_session_tracking() {
        let metrics = ServerMetrics::new();

        assert_eq!(metrics.active_sessions(), 0);
        assert_eq!(metrics.total_sessions(), 0);

        metrics.session_opened();
        metrics.session_opened();
        assert_eq!(metrics.active_sessions(), 2);
        assert_eq!(metrics.total_sessions(), 2);

        metrics.session_closed(Duration::from_secs(10));
        assert_eq!(metrics.active_sessions(), 1);
        assert_eq!(metrics.total_sessions(), 2);
        assert_eq!(
            metrics.snapshot().avg_session_duration,
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_error_tracking() {
        let metrics = ServerMetrics::new();

        metrics.connection_error();
        metrics.accept_error();
        metrics.shutdown_failure();
        metrics.session_rejected();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connection_errors, 1);
        assert_eq!(snapshot.accept_errors, 1);
        assert_eq!(snapshot.shutdown_failures, 1);
        assert_eq!(snapshot.sessions_rejected, 1);
        assert_eq!(snapshot.total_errors(), 3);
    }

    #[test]
    fn test_exported_message_counters_match_snapshot() {
        let recorder = CountingRecorder::default();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let metrics = ServerMetrics::new();

        metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                let (local, mut remote) = tokio::io::duplex(1024);
                let connection = LineConnection::new(local, None, &ConnectionConfig::default());

                // Greeting, one chat line with its reply, then the sentinel.
                connection.write_line("Client1").await.unwrap();
                remote.write_all(b"hi\nSHUTDOWN\n").await.unwrap();
                connection.read_line().await.unwrap();
                metrics.message_received();
                connection.write_line("Hello!").await.unwrap();
                metrics.message_sent();
                connection.read_line().await.unwrap();
                metrics.disconnect_requested();
            })
        });

        let snapshot = metrics.snapshot();
        assert_eq!(recorder.count("parley.messages.received"), snapshot.messages_received);
        assert_eq!(recorder.count("parley.messages.sent"), snapshot.messages_sent);
        assert_eq!(recorder.count("parley.messages.received"), 1);
        assert_eq!(recorder.count("parley.lines.received"), 2);
        assert_eq!(recorder.count("parley.lines.sent"), 2);
    }

    #[test]
    fn test_concurrent_updates() {
        let metrics = std::sync::Arc::new(ServerMetrics::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let metrics = metrics.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    metrics.session_opened();
                    metrics.message_received();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.total_sessions(), 1000);
        assert_eq!(metrics.snapshot().messages_received, 1000);
    }
}
