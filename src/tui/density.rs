use super::theme::Theme;
use super::viewport::Viewport;
use crate::parser::{ApexLog, Category, EventId};
use ratatui::style::Color;

/// Opacity of an empty-or-single-event bucket
pub const MIN_OPACITY: f32 = 0.25;

/// Opacity at and above the saturation count
pub const MAX_OPACITY: f32 = 1.0;

/// Event count at which a bucket saturates to MAX_OPACITY
pub const SATURATION_COUNT: usize = 32;

/// Per-row event count above which individual rendering gives way to
/// bucketing
pub const DENSITY_THRESHOLD: usize = 64;

/// Precomputed opacity lookup table: recomputing a logarithm per bucket
/// per frame is the dominant cost when zoomed far out, so the law
/// `clamp(MIN + RANGE * log10(n)/log10(SATURATION), MIN, MAX)` is
/// tabulated once up to the saturation count.
#[derive(Debug, Clone)]
pub struct OpacityTable {
    table: [f32; SATURATION_COUNT + 1],
}

impl OpacityTable {
    pub fn new() -> Self {
        let mut table = [MIN_OPACITY; SATURATION_COUNT + 1];
        let range = MAX_OPACITY - MIN_OPACITY;
        let denom = (SATURATION_COUNT as f32).log10();
        for (count, slot) in table.iter_mut().enumerate().skip(1) {
            let raw = MIN_OPACITY + range * (count as f32).log10() / denom;
            *slot = raw.clamp(MIN_OPACITY, MAX_OPACITY);
        }
        Self { table }
    }

    /// O(1) lookup; counts above saturation clamp to MAX_OPACITY
    pub fn opacity(&self, count: usize) -> f32 {
        self.table[count.min(SATURATION_COUNT)]
    }
}

impl Default for OpacityTable {
    fn default() -> Self {
        Self::new()
    }
}

/// One fixed-width pixel bucket: an event count and per-category tallies
/// for picking the dominant color
#[derive(Debug, Clone, Copy, Default)]
pub struct Bucket {
    pub count: usize,
    by_category: [usize; 7],
}

impl Bucket {
    fn add(&mut self, category: Category) {
        self.count += 1;
        self.by_category[category as usize] += 1;
    }

    /// The category with the highest tally; ties break toward the
    /// lower-numbered category for determinism
    pub fn dominant(&self) -> Option<Category> {
        if self.count == 0 {
            return None;
        }
        let mut best = 0;
        for idx in 1..self.by_category.len() {
            if self.by_category[idx] > self.by_category[best] {
                best = idx;
            }
        }
        Some(Category::ALL[best])
    }
}

/// Aggregate already-culled events into at most `viewport.width` buckets
/// keyed by start column. Cost is O(visible events + buckets), never
/// O(total events).
pub fn bucket_events(log: &ApexLog, viewport: &Viewport, visible: &[EventId]) -> Vec<Bucket> {
    let mut buckets = vec![Bucket::default(); viewport.width as usize];

    for &id in visible {
        let event = log.event(id);
        let (start, end) = event.span();
        if let Some((first, last)) = viewport.span_to_cols(start, end) {
            for col in first..=last {
                buckets[col as usize].add(event.category());
            }
        }
    }

    buckets
}

/// Pre-blend a category color against the background at the given
/// opacity, yielding an opaque color so the render loop never alpha
/// blends.
pub fn blend(fg: (u8, u8, u8), bg: (u8, u8, u8), alpha: f32) -> Color {
    let mix = |f: u8, b: u8| -> u8 {
        (b as f32 + (f as f32 - b as f32) * alpha).round().clamp(0.0, 255.0) as u8
    };
    Color::Rgb(mix(fg.0, bg.0), mix(fg.1, bg.1), mix(fg.2, bg.2))
}

/// Final color of a bucket, or None when it holds no events and must
/// not be drawn
pub fn bucket_color(bucket: &Bucket, theme: &Theme, opacities: &OpacityTable) -> Option<Color> {
    let category = bucket.dominant()?;
    let alpha = opacities.opacity(bucket.count);
    Some(blend(theme.rgb(category), theme.background, alpha))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LogParser;
    use crate::tui::theme::ThemeStore;

    #[test]
    fn test_opacity_endpoints() {
        let table = OpacityTable::new();
        assert_eq!(table.opacity(0), MIN_OPACITY);
        assert_eq!(table.opacity(1), MIN_OPACITY);
        assert_eq!(table.opacity(SATURATION_COUNT), MAX_OPACITY);
        assert_eq!(table.opacity(SATURATION_COUNT * 10), MAX_OPACITY);
    }

    #[test]
    fn test_opacity_monotonic_and_bounded() {
        let table = OpacityTable::new();
        let mut prev = 0.0f32;
        for count in 0..=SATURATION_COUNT * 2 {
            let o = table.opacity(count);
            assert!(o >= prev, "opacity must be non-decreasing");
            assert!((MIN_OPACITY..=MAX_OPACITY).contains(&o));
            prev = o;
        }
    }

    #[test]
    fn test_empty_bucket_not_drawn() {
        let theme = ThemeStore::new().get("default");
        let table = OpacityTable::new();
        assert_eq!(bucket_color(&Bucket::default(), &theme, &table), None);
    }

    #[test]
    fn test_blend_extremes() {
        let bg = (0, 0, 0);
        assert_eq!(blend((200, 100, 50), bg, 1.0), Color::Rgb(200, 100, 50));
        assert_eq!(blend((200, 100, 50), bg, 0.0), Color::Rgb(0, 0, 0));
    }

    #[test]
    fn test_bucketing_counts_by_column() {
        let text = "\
09:00:00.0 (0)|SOQL_EXECUTE_BEGIN|[1]|Aggregations:0|SELECT Id FROM A
09:00:00.0 (9)|SOQL_EXECUTE_END|[1]|Rows:1
09:00:00.0 (10)|SOQL_EXECUTE_BEGIN|[2]|Aggregations:0|SELECT Id FROM B
09:00:00.0 (19)|SOQL_EXECUTE_END|[2]|Rows:1
09:00:00.0 (1000)|METHOD_ENTRY|[3]|id|Tail.run()
09:00:00.0 (1999)|METHOD_EXIT|[3]|id|Tail.run()
";
        let log = LogParser::new().parse_text(text).unwrap();
        let viewport = Viewport::new(log.duration_ns, 10);
        let visible = viewport.cull(&log);
        let buckets = bucket_events(&log, &viewport, &visible);

        // ns_per_col is ~200: both queries land in bucket 0
        assert_eq!(buckets[0].count, 2);
        assert_eq!(buckets[0].dominant(), Some(Category::Soql));
        // The tail method spans columns 5..=9
        assert_eq!(buckets[5].count, 1);
        assert_eq!(buckets[5].dominant(), Some(Category::Method));
        assert_eq!(buckets[3].count, 0);
        assert_eq!(buckets[3].dominant(), None);
    }
}
