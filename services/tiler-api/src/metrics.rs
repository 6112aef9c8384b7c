//! Application metrics collection and reporting.

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::RwLock;

/// Which tile product a request asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    Bands,
    Ratio,
}

impl TileKind {
    pub fn label(&self) -> &'static str {
        match self {
            TileKind::Bands => "bands",
            TileKind::Ratio => "ratio",
        }
    }
}

/// Metrics collector for the tiler API.
#[derive(Debug)]
pub struct MetricsCollector {
    /// Request counts
    pub tile_requests: AtomicU64,
    pub processing_requests: AtomicU64,
    pub tile_errors: AtomicU64,
    pub fetches_total: AtomicU64,

    /// Stage timings (microseconds)
    fetch_times: RwLock<TimingStats>,
    render_times: RwLock<HashMap<TileKind, TimingStats>>,
    encode_times: RwLock<TimingStats>,

    /// Error counts by error code
    errors_by_code: RwLock<HashMap<String, u64>>,

    start_time: Instant,
}

#[derive(Debug, Default, Clone, Copy)]
struct TimingStats {
    count: u64,
    total_us: u64,
    min_us: u64,
    max_us: u64,
    last_us: u64,
}

impl TimingStats {
    fn record(&mut self, duration_us: u64) {
        self.count += 1;
        self.total_us += duration_us;
        self.last_us = duration_us;
        if self.count == 1 || duration_us < self.min_us {
            self.min_us = duration_us;
        }
        if duration_us > self.max_us {
            self.max_us = duration_us;
        }
    }

    fn summary(&self) -> TimingSummary {
        let avg_ms = if self.count == 0 {
            0.0
        } else {
            (self.total_us as f64 / self.count as f64) / 1000.0
        };
        TimingSummary {
            count: self.count,
            avg_ms,
            min_ms: self.min_us as f64 / 1000.0,
            max_ms: self.max_us as f64 / 1000.0,
            last_ms: self.last_us as f64 / 1000.0,
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            tile_requests: AtomicU64::new(0),
            processing_requests: AtomicU64::new(0),
            tile_errors: AtomicU64::new(0),
            fetches_total: AtomicU64::new(0),
            fetch_times: RwLock::new(TimingStats::default()),
            render_times: RwLock::new(HashMap::new()),
            encode_times: RwLock::new(TimingStats::default()),
            errors_by_code: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a tile request of either kind
    pub fn record_request(&self, kind: TileKind) {
        match kind {
            TileKind::Bands => {
                self.tile_requests.fetch_add(1, Ordering::Relaxed);
                counter!("tiles_requests_total").increment(1);
            }
            TileKind::Ratio => {
                self.processing_requests.fetch_add(1, Ordering::Relaxed);
                counter!("processing_requests_total").increment(1);
            }
        }
    }

    /// Record a failed tile request
    pub async fn record_error(&self, kind: TileKind, code: &'static str) {
        self.tile_errors.fetch_add(1, Ordering::Relaxed);
        counter!("tile_errors_total", "kind" => kind.label(), "code" => code).increment(1);
        *self
            .errors_by_code
            .write()
            .await
            .entry(code.to_string())
            .or_insert(0) += 1;
    }

    /// Record a raster source fetch
    pub async fn record_fetch(&self, duration_us: u64) {
        self.fetches_total.fetch_add(1, Ordering::Relaxed);
        histogram!("tile_fetch_ms").record(duration_us as f64 / 1000.0);
        self.fetch_times.write().await.record(duration_us);
    }

    /// Record the post-fetch pixel stages
    pub async fn record_render(&self, kind: TileKind, duration_us: u64) {
        histogram!("tile_render_ms", "kind" => kind.label()).record(duration_us as f64 / 1000.0);
        self.render_times
            .write()
            .await
            .entry(kind)
            .or_default()
            .record(duration_us);
    }

    /// Record image encoding
    pub async fn record_encode(&self, duration_us: u64) {
        histogram!("tile_encode_ms").record(duration_us as f64 / 1000.0);
        self.encode_times.write().await.record(duration_us);
    }

    /// Get current metrics snapshot
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let render_times = self.render_times.read().await;
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            tile_requests: self.tile_requests.load(Ordering::Relaxed),
            processing_requests: self.processing_requests.load(Ordering::Relaxed),
            tile_errors: self.tile_errors.load(Ordering::Relaxed),
            errors_by_code: self.errors_by_code.read().await.clone(),
            fetch: self.fetch_times.read().await.summary(),
            render: render_times
                .iter()
                .map(|(kind, stats)| (*kind, stats.summary()))
                .collect(),
            encode: self.encode_times.read().await.summary(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of current metrics for JSON serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub tile_requests: u64,
    pub processing_requests: u64,
    pub tile_errors: u64,
    pub errors_by_code: HashMap<String, u64>,
    pub fetch: TimingSummary,
    pub render: HashMap<TileKind, TimingSummary>,
    pub encode: TimingSummary,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimingSummary {
    pub count: u64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub last_ms: f64,
}

/// Timer guard for measuring operation duration.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}
