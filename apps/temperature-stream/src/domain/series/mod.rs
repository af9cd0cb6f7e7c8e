//! Windowed Series Store
//!
//! Bounded per-location history of received samples for display.
//!
//! Each location maps to a fixed-capacity window. Appending to a full window
//! evicts the oldest point, so a window always holds the most recent
//! `capacity` points in arrival order. Windows are created lazily on the
//! first point for a location.

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;

use super::sample::{Location, Sample};

/// Default window capacity.
pub const DEFAULT_WINDOW_CAPACITY: NonZeroUsize = match NonZeroUsize::new(20) {
    Some(capacity) => capacity,
    None => unreachable!(),
};

// =============================================================================
// Series Point
// =============================================================================

/// One (display-time, value) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    /// Human-readable clock string.
    pub display_time: String,
    /// Reading value.
    pub value: f64,
}

impl SeriesPoint {
    /// Create a point.
    #[must_use]
    pub fn new(display_time: impl Into<String>, value: f64) -> Self {
        Self {
            display_time: display_time.into(),
            value,
        }
    }
}

impl From<&Sample> for SeriesPoint {
    fn from(sample: &Sample) -> Self {
        Self::new(sample.display_time(), sample.value())
    }
}

// =============================================================================
// Series Window
// =============================================================================

/// Fixed-capacity sliding window, oldest first.
#[derive(Debug, Clone)]
pub struct SeriesWindow {
    capacity: NonZeroUsize,
    points: VecDeque<SeriesPoint>,
}

impl SeriesWindow {
    /// Create an empty window.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity.get()),
        }
    }

    /// Append a point, evicting the oldest one if the window is full.
    ///
    /// Returns the evicted point.
    pub fn push(&mut self, point: SeriesPoint) -> Option<SeriesPoint> {
        let evicted = if self.points.len() == self.capacity.get() {
            self.points.pop_front()
        } else {
            None
        };
        self.points.push_back(point);
        evicted
    }

    /// Maximum number of points.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Current number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the window holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate points oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &SeriesPoint> + ExactSizeIterator {
        self.points.iter()
    }

    /// Most recent point.
    #[must_use]
    pub fn latest(&self) -> Option<&SeriesPoint> {
        self.points.back()
    }

    /// Oldest point still in the window.
    #[must_use]
    pub fn oldest(&self) -> Option<&SeriesPoint> {
        self.points.front()
    }

    /// Values oldest to newest.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Display times oldest to newest (x-axis labels).
    #[must_use]
    pub fn display_times(&self) -> Vec<&str> {
        self.points.iter().map(|p| p.display_time.as_str()).collect()
    }

    /// Minimum and maximum value in the window.
    #[must_use]
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.points.iter().map(|p| p.value).fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

// =============================================================================
// Store
// =============================================================================

/// Mapping from location to its sliding window.
#[derive(Debug, Clone)]
pub struct WindowedSeriesStore {
    capacity: NonZeroUsize,
    windows: HashMap<Location, SeriesWindow>,
}

impl Default for WindowedSeriesStore {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

impl WindowedSeriesStore {
    /// Create an empty store whose windows hold `capacity` points.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            windows: HashMap::new(),
        }
    }

    /// Window capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Append a point to a location's window, creating the window if needed.
    ///
    /// Returns the updated window.
    pub fn append(&mut self, location: &str, point: SeriesPoint) -> &SeriesWindow {
        let capacity = self.capacity;
        let window = self
            .windows
            .entry(location.to_string())
            .or_insert_with(|| SeriesWindow::new(capacity));
        window.push(point);
        window
    }

    /// Window for a location, if any point has been received for it.
    #[must_use]
    pub fn window(&self, location: &str) -> Option<&SeriesWindow> {
        self.windows.get(location)
    }

    /// Number of locations with a window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Check if no window has been created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
