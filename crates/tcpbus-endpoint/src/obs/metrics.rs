//! Minimal metrics registry for endpoints.
//!
//! Labels are flattened into sorted key vectors to keep deterministic
//! ordering. Histogram buckets are fixed in microseconds to avoid floating
//! point math.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn render_labels(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        self.map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for an exact label set (0 when never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} counter", name);
        for r in self.map.iter() {
            let _ = writeln!(
                out,
                "{}{{{}}} {}",
                name,
                render_labels(r.key()),
                r.value().load(Ordering::Relaxed)
            );
        }
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<LabelKey, AtomicI64>,
}

impl GaugeVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }
    pub fn dec(&self, labels: &[(&str, &str)]) {
        self.add(labels, -1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: i64) {
        self.map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicI64::new(0))
            .fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> i64 {
        self.map
            .get(&label_key(labels))
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} gauge", name);
        for r in self.map.iter() {
            let _ = writeln!(
                out,
                "{}{{{}}} {}",
                name,
                render_labels(r.key()),
                r.value().load(Ordering::Relaxed)
            );
        }
    }
}

// 100us, 500us, 1ms, 5ms, 10ms, 50ms, 100ms, 500ms, 1s
const BUCKETS_MICROS: [u64; 9] = [100, 500, 1_000, 5_000, 10_000, 50_000, 100_000, 500_000, 1_000_000];

#[derive(Default)]
struct AtomicHistogram {
    count: AtomicU64,
    sum: AtomicU64,
    buckets: [AtomicU64; 9],
}

#[derive(Default)]
pub struct HistogramVec {
    map: DashMap<LabelKey, AtomicHistogram>,
}

impl HistogramVec {
    /// Observe a duration (microsecond scale, cumulative buckets).
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let hist = self
            .map
            .entry(label_key(labels))
            .or_insert_with(AtomicHistogram::default);
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum.fetch_add(micros, Ordering::Relaxed);
        for (i, &b) in BUCKETS_MICROS.iter().enumerate() {
            if micros <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} histogram", name);
        for r in self.map.iter() {
            let hist = r.value();
            let label_str = render_labels(r.key());
            let prefix = if label_str.is_empty() {
                String::new()
            } else {
                format!("{},", label_str)
            };

            for (i, &le) in BUCKETS_MICROS.iter().enumerate() {
                let count = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", name, prefix, le, count);
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, count);
            let _ = writeln!(out, "{}_sum{{{}}} {}", name, label_str, hist.sum.load(Ordering::Relaxed));
            let _ = writeln!(out, "{}_count{{{}}} {}", name, label_str, count);
        }
    }
}

/// Per-endpoint metrics. Every series carries a `role` label.
#[derive(Default)]
pub struct BusMetrics {
    pub connections_opened: CounterVec,
    pub connections_active: GaugeVec,
    pub envelopes_in: CounterVec,
    pub envelopes_out: CounterVec,
    pub envelopes_unconsumed: CounterVec,
    pub decode_errors: CounterVec,
    pub write_failures: CounterVec,
    pub dispatch_duration: HistogramVec, // microseconds
}

impl BusMetrics {
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.connections_opened.render("tcpbus_connections_opened_total", &mut out);
        self.connections_active.render("tcpbus_connections_active", &mut out);
        self.envelopes_in.render("tcpbus_envelopes_in_total", &mut out);
        self.envelopes_out.render("tcpbus_envelopes_out_total", &mut out);
        self.envelopes_unconsumed.render("tcpbus_envelopes_unconsumed_total", &mut out);
        self.decode_errors.render("tcpbus_decode_errors_total", &mut out);
        self.write_failures.render("tcpbus_write_failures_total", &mut out);
        self.dispatch_duration.render("tcpbus_dispatch_duration_micros", &mut out);
        out
    }
}
