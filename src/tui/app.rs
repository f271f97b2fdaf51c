use super::density::OpacityTable;
use super::markers::{RenderedMarker, TimelineMarker, extract_markers, hit_test};
use super::search::{MatchNavigator, NavigatedCursor, SearchCursor, build_matches};
use super::theme::{Theme, ThemeStore};
use super::viewport::Viewport;
use crate::parser::{ApexLog, SummaryStats, TimestampMatch, find_event_by_timestamp};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Fraction of the window panned per key press
const PAN_STEP: f64 = 0.1;

pub struct SearchState {
    pub active: bool,
    pub query: String,
    pub cursor: SearchCursor,
}

impl SearchState {
    fn new() -> Self {
        Self {
            active: false,
            query: String::new(),
            cursor: SearchCursor::default(),
        }
    }
}

pub struct App {
    // Data
    pub log: ApexLog,
    pub summary: SummaryStats,
    pub depths: Vec<usize>,
    pub markers: Vec<TimelineMarker>,
    pub file_path: Option<String>,

    // UI state
    pub viewport: Viewport,
    pub theme: Theme,
    pub opacities: OpacityTable,
    pub playhead_col: u16,

    /// Screen intervals of the markers drawn last frame, refreshed by
    /// the render pass and consumed by hit-testing
    pub rendered_markers: Vec<RenderedMarker>,
    pub selected: Option<TimestampMatch>,
    pub selected_marker: Option<usize>,

    // Search state
    pub search_state: SearchState,

    /// Timestamp to announce to the host after this event, if any
    pub pending_navigation: Option<u64>,

    // Flags
    pub should_quit: bool,
    pub show_help: bool,
}

impl App {
    pub fn new(log: ApexLog, file_path: Option<String>) -> Self {
        let summary = log.summary();
        let depths = log.depths();
        let markers = extract_markers(&log);
        let viewport = Viewport::new(log.duration_ns, 80);
        let theme = ThemeStore::new().get("default");

        Self {
            log,
            summary,
            depths,
            markers,
            file_path,
            viewport,
            theme,
            opacities: OpacityTable::new(),
            playhead_col: 0,
            rendered_markers: Vec::new(),
            selected: None,
            selected_marker: None,
            search_state: SearchState::new(),
            pending_navigation: None,
            should_quit: false,
            show_help: false,
        }
    }

    pub fn handle_event(&mut self, event: KeyEvent) {
        if self.search_state.active {
            self.handle_search_event(event);
            return;
        }

        if self.show_help {
            if matches!(event.code, KeyCode::Char('?') | KeyCode::Esc) {
                self.show_help = false;
            }
            return;
        }

        match event.code {
            // Quit
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
            }
            KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }

            // Help
            KeyCode::Char('?') => {
                self.show_help = true;
            }

            // Zoom, anchored on the playhead
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.viewport.zoom_in(self.playhead_col);
            }
            KeyCode::Char('-') => {
                self.viewport.zoom_out(self.playhead_col);
            }

            // Pan
            KeyCode::Char('h') => {
                self.viewport.pan_fraction(-PAN_STEP);
            }
            KeyCode::Char('l') => {
                self.viewport.pan_fraction(PAN_STEP);
            }
            KeyCode::Char('g') | KeyCode::Home => {
                self.viewport.pan(-(self.viewport.total_ns as i64));
            }
            KeyCode::Char('G') | KeyCode::End => {
                self.viewport.pan(self.viewport.total_ns as i64);
            }
            KeyCode::Char('f') => {
                self.viewport.fit();
            }

            // Playhead
            KeyCode::Left => {
                self.playhead_col = self.playhead_col.saturating_sub(1);
            }
            KeyCode::Right => {
                self.playhead_col = (self.playhead_col + 1).min(self.viewport.width - 1);
            }

            // Selection
            KeyCode::Enter => {
                self.select_at_playhead();
            }
            KeyCode::Char('m') => {
                self.select_marker_at_playhead();
            }
            KeyCode::Esc => {
                self.selected = None;
                self.selected_marker = None;
            }

            // Search controls
            KeyCode::Char('/') => {
                self.start_search();
            }
            KeyCode::Char('n') if !self.search_state.query.is_empty() => {
                self.search_move(true);
            }
            KeyCode::Char('N') if !self.search_state.query.is_empty() => {
                self.search_move(false);
            }

            _ => {}
        }
    }

    /// Resolve the event under the playhead, preferring the deepest
    /// containing span
    fn select_at_playhead(&mut self) {
        let target = self.viewport.col_to_time(self.playhead_col);
        self.selected = find_event_by_timestamp(&self.log, self.log.top_level(), target, 0);
        self.selected_marker = None;
    }

    fn select_marker_at_playhead(&mut self) {
        let hit = hit_test(
            &self.markers,
            &self.rendered_markers,
            self.playhead_col as i64,
            self.viewport.offset_cols(),
        );
        self.selected_marker = hit.map(|m| m.id);
        self.selected = None;
    }

    pub fn start_search(&mut self) {
        self.search_state.active = true;
        self.search_state.query.clear();
        self.search_state.cursor = SearchCursor::default();
    }

    fn rebuild_matches(&mut self) {
        let matches = build_matches(&self.log, &self.viewport, &self.search_state.query);
        self.search_state.cursor = SearchCursor::new(matches);
    }

    /// Step the search cursor. The navigation side effects (centering
    /// the viewport, queuing a host notification) live in the decorator;
    /// wrapping past either end restarts from the opposite one.
    fn search_move(&mut self, forward: bool) {
        let cursor = std::mem::take(&mut self.search_state.cursor);
        let viewport = &mut self.viewport;
        let mut navigated = None;

        let mut nav = NavigatedCursor::new(cursor, |found| {
            viewport.center_on(found.timestamp);
            navigated = Some(found.timestamp);
        });
        let moved = if forward { nav.next() } else { nav.prev() }.is_some();
        if !moved {
            if forward {
                nav.first();
            } else {
                nav.last();
            }
        }
        self.search_state.cursor = nav.into_inner();

        if let Some(ns) = navigated {
            self.pending_navigation = Some(ns);
        }
    }

    pub fn handle_search_event(&mut self, event: KeyEvent) {
        match event.code {
            KeyCode::Char(c) if !event.modifiers.contains(KeyModifiers::CONTROL) => {
                self.search_state.query.push(c);
                self.rebuild_matches();
            }
            KeyCode::Backspace => {
                self.search_state.query.pop();
                self.rebuild_matches();
            }
            KeyCode::Enter => {
                self.search_state.active = false;
            }
            KeyCode::Esc => {
                self.search_state.active = false;
                self.search_state.query.clear();
                self.search_state.cursor = SearchCursor::default();
            }
            KeyCode::Char('n') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                self.search_move(true);
            }
            KeyCode::Char('p') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                self.search_move(false);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LogParser;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn sample_app() -> App {
        let text = "\
09:00:00.0 (0)|EXECUTION_STARTED
09:00:00.0 (100)|METHOD_ENTRY|[1]|id|Billing.charge()
09:00:00.0 (900)|METHOD_EXIT|[1]|id|Billing.charge()
09:00:00.0 (50000)|METHOD_ENTRY|[2]|id|Other.run()
09:00:00.0 (90000)|METHOD_EXIT|[2]|id|Other.run()
09:00:00.0 (100000)|EXECUTION_FINISHED
";
        let log = LogParser::new().parse_text(text).unwrap();
        App::new(log, None)
    }

    #[test]
    fn test_quit_keys() {
        let mut app = sample_app();
        app.handle_event(key(KeyCode::Char('q')));
        assert!(app.should_quit);

        let mut app = sample_app();
        app.handle_event(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }

    #[test]
    fn test_zoom_anchors_on_playhead() {
        let mut app = sample_app();
        app.playhead_col = 40;
        let anchor = app.viewport.col_to_time(40);

        app.handle_event(key(KeyCode::Char('+')));
        assert_eq!(app.viewport.window_ns, 50_000);
        assert_eq!(app.viewport.col_to_time(40), anchor);

        app.handle_event(key(KeyCode::Char('-')));
        assert_eq!(app.viewport.window_ns, 100_000);
    }

    #[test]
    fn test_enter_selects_deepest_event() {
        let mut app = sample_app();
        // Column 0 maps to 0 ns, the exact start of the execution
        app.playhead_col = 0;
        app.handle_event(key(KeyCode::Enter));

        let hit = app.selected.expect("playhead is inside the execution");
        assert_eq!(hit.depth, 0);

        app.handle_event(key(KeyCode::Esc));
        assert!(app.selected.is_none());
    }

    #[test]
    fn test_search_typing_builds_matches() {
        let mut app = sample_app();
        app.handle_event(key(KeyCode::Char('/')));
        assert!(app.search_state.active);

        for c in "billing".chars() {
            app.handle_event(key(KeyCode::Char(c)));
        }
        assert_eq!(app.search_state.cursor.len(), 1);

        app.handle_event(key(KeyCode::Enter));
        assert!(!app.search_state.active);
        assert_eq!(app.search_state.query, "billing");
    }

    #[test]
    fn test_search_next_centers_and_queues_navigation() {
        let mut app = sample_app();
        app.handle_event(key(KeyCode::Char('/')));
        for c in "run".chars() {
            app.handle_event(key(KeyCode::Char(c)));
        }
        app.handle_event(key(KeyCode::Enter));
        app.viewport.zoom_in(0);

        app.handle_event(key(KeyCode::Char('n')));
        assert_eq!(app.pending_navigation, Some(50_000));
        let (v0, v1) = app.viewport.visible_range();
        assert!((v0..v1).contains(&50_000));
    }

    #[test]
    fn test_search_wraps_at_ends() {
        let mut app = sample_app();
        app.handle_event(key(KeyCode::Char('/')));
        for c in ".".chars() {
            app.handle_event(key(KeyCode::Char(c)));
        }
        app.handle_event(key(KeyCode::Enter));
        let total = app.search_state.cursor.len();
        assert!(total >= 2);

        for _ in 0..total {
            app.handle_event(key(KeyCode::Char('n')));
        }
        assert_eq!(app.search_state.cursor.position(), Some(total - 1));
        app.handle_event(key(KeyCode::Char('n')));
        assert_eq!(app.search_state.cursor.position(), Some(0));

        app.handle_event(key(KeyCode::Char('N')));
        assert_eq!(app.search_state.cursor.position(), Some(total - 1));
    }

    #[test]
    fn test_escape_cancels_search() {
        let mut app = sample_app();
        app.handle_event(key(KeyCode::Char('/')));
        app.handle_event(key(KeyCode::Char('x')));
        app.handle_event(key(KeyCode::Esc));

        assert!(!app.search_state.active);
        assert!(app.search_state.query.is_empty());
        assert_eq!(app.search_state.cursor.len(), 0);
    }
}
