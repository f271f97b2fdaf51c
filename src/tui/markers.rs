use crate::parser::{ApexLog, Severity};
use ratatui::style::Color;

/// Renderable marker kinds, ranked by severity ascending
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MarkerKind {
    Skip,
    Unexpected,
    Error,
}

impl MarkerKind {
    fn from_severity(severity: Severity) -> Option<MarkerKind> {
        match severity {
            Severity::Error => Some(MarkerKind::Error),
            Severity::Unexpected => Some(MarkerKind::Unexpected),
            Severity::Skip => Some(MarkerKind::Skip),
            Severity::Info => None,
        }
    }

    pub fn color(&self) -> Color {
        match self {
            MarkerKind::Error => Color::Red,
            MarkerKind::Unexpected => Color::LightRed,
            MarkerKind::Skip => Color::Yellow,
        }
    }
}

/// Read-only, time-anchored projection of a renderable issue. Built once
/// per log load and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineMarker {
    pub id: usize,
    pub kind: MarkerKind,
    pub start_time: u64,
    /// Next marker's start, or the log's total duration for the last
    pub end_time: u64,
    pub summary: String,
    pub metadata: String,
}

/// Project the log's issues into sorted markers. Issues outside the
/// renderable kinds or missing a start time are dropped silently; that
/// is a derived-view concern, not a parse concern. Sorting by start
/// first makes the end-time resolution a single monotonic pass.
pub fn extract_markers(log: &ApexLog) -> Vec<TimelineMarker> {
    let mut markers: Vec<TimelineMarker> = log
        .issues
        .iter()
        .filter_map(|issue| {
            let kind = MarkerKind::from_severity(issue.severity())?;
            let start_time = issue.start_time?;
            Some(TimelineMarker {
                id: 0,
                kind,
                start_time,
                end_time: log.duration_ns,
                summary: issue.summary.clone(),
                metadata: issue.description.clone(),
            })
        })
        .collect();

    markers.sort_by_key(|m| m.start_time);

    for idx in 0..markers.len() {
        markers[idx].id = idx;
        if idx + 1 < markers.len() {
            markers[idx].end_time = markers[idx + 1].start_time;
        }
    }

    markers
}

/// Screen-space interval of a marker drawn this frame, in world columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderedMarker {
    /// Index into the full marker list
    pub marker: usize,
    pub start_x: i64,
    pub end_x: i64,
}

/// Hit-test a screen X against the currently rendered markers. The
/// world coordinate is `screen_x + offset_x`; overlapping markers
/// resolve by severity rank, ties by first-found.
pub fn hit_test<'a>(
    markers: &'a [TimelineMarker],
    rendered: &[RenderedMarker],
    screen_x: i64,
    offset_x: i64,
) -> Option<&'a TimelineMarker> {
    let world_x = screen_x + offset_x;
    let mut best: Option<&TimelineMarker> = None;

    for hit in rendered {
        if world_x < hit.start_x || world_x > hit.end_x {
            continue;
        }
        let candidate = &markers[hit.marker];
        match best {
            Some(current) if candidate.kind <= current.kind => {}
            _ => best = Some(candidate),
        }
    }

    best
}
