//! Per-operation timing and heap measurement.
//!
//! Heap numbers come from [`TrackingAllocator`], a counting wrapper around
//! the system allocator. A binary opts in with
//!
//! ```ignore
//! #[global_allocator]
//! static ALLOC: selfscape::telemetry::TrackingAllocator = selfscape::telemetry::TrackingAllocator;
//! ```
//!
//! Without it every peak reads as zero and only timings are meaningful.
//! Counters are kept per thread: a measurement sees the allocations made by
//! the thread running it, so workers measuring different files at the same
//! time do not reset each other's peaks.

use crate::audit::Auditor;
use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::time::{Duration, Instant};

/// Default single-operation peak that triggers a warning (4 GB).
pub const DEFAULT_MEMORY_WARN_BYTES: u64 = 4_000_000_000;

thread_local! {
    // Signed: memory allocated on one thread may be freed on another.
    static CURRENT: Cell<i64> = const { Cell::new(0) };
    static PEAK: Cell<i64> = const { Cell::new(0) };
}

/// System allocator that counts live and peak heap bytes per thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackingAllocator;

impl TrackingAllocator {
    fn grew(size: usize) {
        let size = i64::try_from(size).unwrap_or(i64::MAX);
        // `try_with` fails only while the thread's locals are being torn
        // down; those allocations go uncounted.
        let _ = CURRENT.try_with(|current| {
            let now = current.get().saturating_add(size);
            current.set(now);
            let _ = PEAK.try_with(|peak| {
                if now > peak.get() {
                    peak.set(now);
                }
            });
        });
    }

    fn shrank(size: usize) {
        let size = i64::try_from(size).unwrap_or(i64::MAX);
        let _ = CURRENT.try_with(|current| current.set(current.get().saturating_sub(size)));
    }
}

// SAFETY: every call is forwarded unchanged to `System`, which upholds the
// `GlobalAlloc` contract. The bookkeeping only touches const-initialized
// `Cell<i64>` thread locals, which have no destructor and never allocate,
// so it cannot re-enter the allocator or unwind.
unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            Self::grew(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            Self::grew(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        Self::shrank(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            if new_size > layout.size() {
                Self::grew(new_size - layout.size());
            } else {
                Self::shrank(layout.size() - new_size);
            }
        }
        new_ptr
    }
}

/// Result of [`measure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement<T> {
    /// What the operation returned.
    pub value: T,
    /// Wall-clock duration.
    pub elapsed: Duration,
    /// Highest heap growth above the starting level.
    pub peak_bytes: u64,
}

impl<T> Measurement<T> {
    /// Elapsed time in fractional milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1e3
    }
}

/// Run `operation`, recording its duration and heap peak.
///
/// The operation's return value, errors included, is passed through as is.
pub fn measure<T>(operation: impl FnOnce() -> T) -> Measurement<T> {
    let baseline = CURRENT.with(Cell::get);
    // Only this thread's peak is rewound; an enclosing measurement on the
    // same thread keeps its own high-water mark below.
    let outer_peak = PEAK.with(|peak| peak.replace(baseline));
    let start = Instant::now();

    let value = operation();

    let elapsed = start.elapsed();
    let peak = PEAK.with(|peak| {
        let inner = peak.get();
        peak.set(inner.max(outer_peak));
        inner
    });
    Measurement {
        value,
        elapsed,
        peak_bytes: u64::try_from(peak.saturating_sub(baseline)).unwrap_or(0),
    }
}

/// Logs measurements and warns on heavy operations.
#[derive(Debug, Clone)]
pub struct Telemetry {
    auditor: Auditor,
    memory_warn_bytes: u64,
}

impl Telemetry {
    /// Create a reporter logging through `auditor`.
    pub fn new(auditor: Auditor, memory_warn_bytes: u64) -> Self {
        Self {
            auditor,
            memory_warn_bytes,
        }
    }

    /// Measure `operation` and report it under `label`.
    pub fn track<T>(&self, label: &str, operation: impl FnOnce() -> T) -> Measurement<T> {
        let measured = measure(operation);
        self.report(label, &measured);
        measured
    }

    /// Log one measurement: debug always, warn when the peak is too high.
    pub fn report<T>(&self, label: &str, measured: &Measurement<T>) {
        self.auditor.debug(format!(
            "{} in {:.3} ms (peak heap: {:.3}MB)",
            label,
            measured.elapsed_ms(),
            measured.peak_bytes as f64 * 1e-6
        ));
        if self.exceeds(measured.peak_bytes) {
            self.auditor.warn(format!(
                "HIGH RAM USAGE! {} peaked at {:.3}GB",
                label,
                measured.peak_bytes as f64 * 1e-9
            ));
        }
    }

    /// True if `peak_bytes` reaches the warning threshold.
    pub fn exceeds(&self, peak_bytes: u64) -> bool {
        peak_bytes >= self.memory_warn_bytes
    }
}
