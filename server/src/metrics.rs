// Metrics collection and tracking

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tts_core::SynthesisStats;

/// Latency samples kept for percentile estimates.
const LATENCY_WINDOW: usize = 1000;

/// Per-endpoint request counters and latency window
#[derive(Debug, Clone)]
pub struct EndpointMetrics {
    request_count: Arc<AtomicU64>,
    error_count: Arc<AtomicU64>,
    total_latency_ms: Arc<AtomicU64>,
    min_latency_ms: Arc<AtomicU64>,
    max_latency_ms: Arc<AtomicU64>,
    latency_samples: Arc<Mutex<VecDeque<u64>>>,
}

impl EndpointMetrics {
    pub fn new() -> Self {
        Self {
            request_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            total_latency_ms: Arc::new(AtomicU64::new(0)),
            min_latency_ms: Arc::new(AtomicU64::new(u64::MAX)),
            max_latency_ms: Arc::new(AtomicU64::new(0)),
            latency_samples: Arc::new(Mutex::new(VecDeque::with_capacity(LATENCY_WINDOW))),
        }
    }

    pub fn record_request(&self, latency_ms: u64) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.min_latency_ms.fetch_min(latency_ms, Ordering::Relaxed);
        self.max_latency_ms.fetch_max(latency_ms, Ordering::Relaxed);

        if let Ok(mut samples) = self.latency_samples.lock() {
            if samples.len() == LATENCY_WINDOW {
                samples.pop_front();
            }
            samples.push_back(latency_ms);
        }
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn avg_latency_ms(&self) -> f64 {
        let count = self.request_count();
        if count == 0 {
            return 0.0;
        }
        self.total_latency_ms.load(Ordering::Relaxed) as f64 / count as f64
    }

    fn percentile(&self, p: usize) -> u64 {
        let Ok(samples) = self.latency_samples.lock() else {
            return 0;
        };
        if samples.is_empty() {
            return 0;
        }
        let mut sorted: Vec<u64> = samples.iter().copied().collect();
        sorted.sort_unstable();
        let index = (sorted.len() * p / 100).min(sorted.len() - 1);
        sorted[index]
    }

    pub fn snapshot(&self) -> EndpointStats {
        let min = self.min_latency_ms.load(Ordering::Relaxed);
        EndpointStats {
            request_count: self.request_count(),
            error_count: self.error_count(),
            avg_latency_ms: self.avg_latency_ms(),
            min_latency_ms: if min == u64::MAX { 0 } else { min },
            max_latency_ms: self.max_latency_ms.load(Ordering::Relaxed),
            p50_latency_ms: self.percentile(50),
            p95_latency_ms: self.percentile(95),
            p99_latency_ms: self.percentile(99),
        }
    }
}

impl Default for EndpointMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Pipeline-level counters fed from [`SynthesisStats`]
#[derive(Debug, Clone, Default)]
pub struct SynthesisMetrics {
    synthesis_count: Arc<AtomicU64>,
    total_synthesis_time_ms: Arc<AtomicU64>,
    total_generation_ms: Arc<AtomicU64>,
    total_decode_ms: Arc<AtomicU64>,
    total_frames: Arc<AtomicU64>,
    total_samples: Arc<AtomicU64>,
    exhausted_generations: Arc<AtomicU64>,
    insufficient_codes: Arc<AtomicU64>,
}

impl SynthesisMetrics {
    pub fn record_synthesis(&self, time_ms: u64, stats: &SynthesisStats, samples: usize) {
        self.synthesis_count.fetch_add(1, Ordering::Relaxed);
        self.total_synthesis_time_ms.fetch_add(time_ms, Ordering::Relaxed);
        self.total_generation_ms
            .fetch_add(stats.generation_ms, Ordering::Relaxed);
        self.total_decode_ms.fetch_add(stats.decode_ms, Ordering::Relaxed);
        self.total_frames
            .fetch_add(stats.frames as u64, Ordering::Relaxed);
        self.total_samples.fetch_add(samples as u64, Ordering::Relaxed);
        if stats.generation_exhausted {
            self.exhausted_generations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_insufficient_codes(&self) {
        self.insufficient_codes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SynthesisMetricsResponse {
        let count = self.synthesis_count.load(Ordering::Relaxed);
        let avg = |total: &AtomicU64| {
            if count == 0 {
                0.0
            } else {
                total.load(Ordering::Relaxed) as f64 / count as f64
            }
        };
        SynthesisMetricsResponse {
            synthesis_count: count,
            avg_synthesis_time_ms: avg(&self.total_synthesis_time_ms),
            avg_generation_ms: avg(&self.total_generation_ms),
            avg_decode_ms: avg(&self.total_decode_ms),
            total_frames: self.total_frames.load(Ordering::Relaxed),
            total_samples: self.total_samples.load(Ordering::Relaxed),
            exhausted_generations: self.exhausted_generations.load(Ordering::Relaxed),
            insufficient_code_failures: self.insufficient_codes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppMetrics {
    pub synthesize: EndpointMetrics,
    pub synthesis: SynthesisMetrics,
    started_at: Instant,
}

impl AppMetrics {
    pub fn new() -> Self {
        Self {
            synthesize: EndpointMetrics::new(),
            synthesis: SynthesisMetrics::default(),
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct DetailedMetricsResponse {
    pub timestamp: DateTime<Utc>,
    pub system: SystemMetrics,
    pub endpoints: EndpointMetricsResponse,
    pub synthesis: SynthesisMetricsResponse,
}

#[derive(Serialize)]
pub struct SystemMetrics {
    pub cpu_usage_percent: f32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub memory_usage_percent: f32,
    pub request_count: u64,
    pub uptime_seconds: u64,
    pub system_load: Option<f64>,
}

impl SystemMetrics {
    pub fn collect(request_count: u64, uptime_seconds: u64) -> Self {
        let mut system = sysinfo::System::new();
        system.refresh_cpu();
        system.refresh_memory();

        let memory_used = system.used_memory();
        let memory_total = system.total_memory();
        let memory_usage_percent = if memory_total > 0 {
            (memory_used as f64 / memory_total as f64 * 100.0) as f32
        } else {
            0.0
        };

        let load = sysinfo::System::load_average().one;

        Self {
            cpu_usage_percent: system.global_cpu_info().cpu_usage(),
            memory_used_mb: memory_used / 1024 / 1024,
            memory_total_mb: memory_total / 1024 / 1024,
            memory_usage_percent,
            request_count,
            uptime_seconds,
            system_load: (load > 0.0).then_some(load),
        }
    }
}

#[derive(Serialize)]
pub struct EndpointMetricsResponse {
    pub synthesize: EndpointStats,
}

#[derive(Debug, Serialize)]
pub struct EndpointStats {
    pub request_count: u64,
    pub error_count: u64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
    pub p99_latency_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct SynthesisMetricsResponse {
    pub synthesis_count: u64,
    pub avg_synthesis_time_ms: f64,
    pub avg_generation_ms: f64,
    pub avg_decode_ms: f64,
    pub total_frames: u64,
    pub total_samples: u64,
    pub exhausted_generations: u64,
    pub insufficient_code_failures: u64,
}
