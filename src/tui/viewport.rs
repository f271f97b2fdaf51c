use crate::parser::{ApexLog, EventId};

/// Narrowest window the viewport can zoom into, in nanoseconds
pub const MIN_WINDOW_NS: u64 = 1_000;

/// Zoom step applied per key press
const ZOOM_FACTOR: f64 = 2.0;

/// Maps the visible time window to timeline columns and culls events
/// against it. All render paths go through this so a frame's cost
/// depends on the window, never on total event count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewport {
    /// Left edge of the visible window, ns since log start
    pub start_ns: u64,

    /// Visible window width in ns
    pub window_ns: u64,

    /// Full log duration in ns
    pub total_ns: u64,

    /// Timeline width in terminal cells
    pub width: u16,
}

impl Viewport {
    pub fn new(total_ns: u64, width: u16) -> Self {
        let total_ns = total_ns.max(1);
        Self {
            start_ns: 0,
            window_ns: total_ns,
            total_ns,
            width: width.max(1),
        }
    }

    pub fn set_width(&mut self, width: u16) {
        self.width = width.max(1);
    }

    pub fn end_ns(&self) -> u64 {
        self.start_ns.saturating_add(self.window_ns)
    }

    pub fn visible_range(&self) -> (u64, u64) {
        (self.start_ns, self.end_ns())
    }

    /// Nanoseconds represented by one column
    pub fn ns_per_col(&self) -> f64 {
        self.window_ns as f64 / self.width as f64
    }

    /// World column of the window's left edge, used to translate
    /// screen-space hits into world coordinates
    pub fn offset_cols(&self) -> i64 {
        (self.start_ns as f64 / self.ns_per_col()) as i64
    }

    /// Column of a timestamp, or None when outside the window
    pub fn time_to_col(&self, ns: u64) -> Option<u16> {
        if ns < self.start_ns || ns >= self.end_ns() {
            return None;
        }
        let col = ((ns - self.start_ns) as f64 / self.ns_per_col()) as u16;
        Some(col.min(self.width - 1))
    }

    /// Timestamp at the left edge of a column
    pub fn col_to_time(&self, col: u16) -> u64 {
        self.start_ns + (col as f64 * self.ns_per_col()) as u64
    }

    /// Column range covered by a span, clamped to the window; None when
    /// the span does not intersect it
    pub fn span_to_cols(&self, start: u64, end: u64) -> Option<(u16, u16)> {
        let (v0, v1) = self.visible_range();
        if end < v0 || start >= v1 {
            return None;
        }
        let first = self.time_to_col(start.max(v0)).unwrap_or(0);
        let last_ns = end.min(v1.saturating_sub(1)).max(v0);
        let last = self.time_to_col(last_ns).unwrap_or(self.width - 1);
        Some((first, last.max(first)))
    }

    /// Halve the window, keeping the time under `anchor_col` fixed
    pub fn zoom_in(&mut self, anchor_col: u16) {
        let anchor_ns = self.col_to_time(anchor_col.min(self.width - 1));
        let new_window = ((self.window_ns as f64 / ZOOM_FACTOR) as u64).max(MIN_WINDOW_NS);
        self.apply_zoom(anchor_ns, anchor_col, new_window);
    }

    /// Double the window, keeping the time under `anchor_col` fixed
    pub fn zoom_out(&mut self, anchor_col: u16) {
        let anchor_ns = self.col_to_time(anchor_col.min(self.width - 1));
        let new_window = ((self.window_ns as f64 * ZOOM_FACTOR) as u64).min(self.total_ns);
        self.apply_zoom(anchor_ns, anchor_col, new_window);
    }

    fn apply_zoom(&mut self, anchor_ns: u64, anchor_col: u16, new_window: u64) {
        self.window_ns = new_window;
        let anchor_offset = (anchor_col as f64 * self.ns_per_col()) as u64;
        self.start_ns = anchor_ns.saturating_sub(anchor_offset);
        self.clamp_start();
    }

    /// Pan by a signed nanosecond delta, clamped to the log bounds
    pub fn pan(&mut self, delta_ns: i64) {
        self.start_ns = if delta_ns < 0 {
            self.start_ns.saturating_sub(delta_ns.unsigned_abs())
        } else {
            self.start_ns.saturating_add(delta_ns as u64)
        };
        self.clamp_start();
    }

    /// Pan by a fraction of the current window (e.g. 0.1 per key press)
    pub fn pan_fraction(&mut self, fraction: f64) {
        self.pan((self.window_ns as f64 * fraction) as i64);
    }

    /// Center the window on a timestamp without changing zoom
    pub fn center_on(&mut self, ns: u64) {
        self.start_ns = ns.saturating_sub(self.window_ns / 2);
        self.clamp_start();
    }

    /// Reset to the whole log
    pub fn fit(&mut self) {
        self.start_ns = 0;
        self.window_ns = self.total_ns;
    }

    fn clamp_start(&mut self) {
        let max_start = self.total_ns.saturating_sub(self.window_ns);
        self.start_ns = self.start_ns.min(max_start);
    }

    /// Ids of events whose span intersects the visible window. The
    /// dominant cost control for large logs: everything downstream only
    /// sees this set.
    pub fn cull(&self, log: &ApexLog) -> Vec<EventId> {
        let (v0, v1) = self.visible_range();
        log.events
            .iter()
            .filter(|e| e.id != log.root)
            .filter(|e| {
                let (start, end) = e.span();
                end >= v0 && start < v1
            })
            .map(|e| e.id)
            .collect()
    }
}
