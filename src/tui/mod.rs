mod app;
mod density;
mod markers;
mod search;
mod theme;
mod ui;
mod viewport;

pub use app::App;
pub use density::{DENSITY_THRESHOLD, OpacityTable};
pub use markers::{MarkerKind, RenderedMarker, TimelineMarker, extract_markers, hit_test};
pub use search::{MatchKind, MatchNavigator, NavigatedCursor, SearchCursor, SearchMatch,
    build_matches};
pub use theme::{Theme, ThemeStore};
pub use viewport::Viewport;

use crate::host::{DuplexChannel, HostClient, HostEvent, LocalChannel};
use crate::parser::ApexLog;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEvent, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::fs::{self, OpenOptions};
use std::io;
use std::time::Duration;

pub fn run_tui(log: ApexLog, file_path: Option<String>) -> io::Result<()> {
    run_tui_with_host(log, file_path, None::<HostClient<LocalChannel>>)
}

/// Run the timeline with an optional host channel: playhead and search
/// navigation are announced as `NavigateToTimestamp` events.
pub fn run_tui_with_host<C: DuplexChannel>(
    log: ApexLog,
    file_path: Option<String>,
    host: Option<HostClient<C>>,
) -> io::Result<()> {
    // Initialize logging to file only if RUST_LOG is set
    if std::env::var("RUST_LOG").is_ok() {
        let log_dir = dirs::cache_dir()
            .or_else(dirs::state_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join("apexlog-tui");

        fs::create_dir_all(&log_dir)?;
        let log_path = log_dir.join("apexlog-tui.log");

        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        env_logger::Builder::new()
            .target(env_logger::Target::Pipe(Box::new(log_file)))
            .parse_default_env()
            .init();

        log::info!("Starting apexlog-tui - log file: {}", log_path.display());
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(log, file_path);

    let res = run_app(&mut terminal, &mut app, host);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

fn run_app<B, C>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut host: Option<HostClient<C>>,
) -> io::Result<()>
where
    B: ratatui::backend::Backend<Error = io::Error>,
    C: DuplexChannel,
{
    loop {
        let app_ref = &mut *app;
        terminal.draw(move |f| ui::draw(f, app_ref))?;

        if let Some(event) = get_event()? {
            app.handle_event(event);
        }

        if let Some(ns) = app.pending_navigation.take() {
            log::debug!("Navigated to {} ns", ns);
            if let Some(host) = host.as_mut()
                && let Err(e) = host.notify(HostEvent::NavigateToTimestamp { ns })
            {
                log::warn!("Host notification failed: {}", e);
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

pub fn get_event() -> io::Result<Option<KeyEvent>> {
    if event::poll(Duration::from_millis(100))?
        && let Event::Key(key) = event::read()?
    {
        // Only process key press events, not release
        if key.kind == KeyEventKind::Press {
            return Ok(Some(key));
        }
    }
    Ok(None)
}
