//! Interactive terminal reviewer: walks a pull request's changed PNGs
//! with the comparison painted in half-block cells, two image rows per
//! terminal row.

mod draw;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event as CEvent, KeyCode, KeyEvent,
    KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, ExecutableCommand};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::Terminal;
use tokio::runtime::Handle;

use crate::compare::CompareConfig;
use crate::github::{GitHubClient, ImageListing};
use crate::session::{GitHubReviewSource, ReviewSession};
use crate::view::RenderLayout;

const PAN_STEP_COLS: f32 = 8.0; // image columns per h/l keypress
const PARAM_STEP: f32 = 0.05; // opacity/split change per arrow keypress

pub struct TuiOptions {
    pub repo: String,
    pub number: u64,
    pub token: Option<String>,
    pub compare: CompareConfig,
}

/// Fetch the PR's image listing and run the reviewer until the user quits.
/// Blocks the calling thread; background fetches run on `handle`.
pub fn run(options: TuiOptions, handle: Handle) -> Result<()> {
    let client =
        Arc::new(GitHubClient::new(options.token).context("Failed to build GitHub client")?);
    let listing = handle
        .block_on(fetch_listing(&client, &options.repo, options.number))
        .with_context(|| format!("Failed to load {}#{}", options.repo, options.number))?;

    let source = Arc::new(GitHubReviewSource::new(
        Arc::clone(&client),
        options.repo.clone(),
    ));
    let mut session = ReviewSession::new(listing, source, options.compare, handle);
    session.attach_comments(client, options.repo);

    run_interactive(App::new(session))
}

async fn fetch_listing(client: &GitHubClient, repo: &str, number: u64) -> Result<ImageListing> {
    let pr = client.pull_request(repo, number).await?;
    let files = client
        .compare_files(repo, &pr.base.sha, &pr.head.sha)
        .await?;
    Ok(ImageListing::assemble(number, pr, files))
}

struct App {
    session: ReviewSession,
    /// Geometry of the last painted frame, for pointer hit tests and
    /// viewport-relative scrolling.
    layout: RenderLayout,
    canvas_area: Rect,
    help_open: bool,
    /// Comment composer text; `Some` captures all key input.
    composer: Option<String>,
    status: String,
}

impl App {
    fn new(session: ReviewSession) -> Self {
        Self {
            session,
            layout: RenderLayout::empty(),
            canvas_area: Rect::default(),
            help_open: false,
            composer: None,
            status: String::new(),
        }
    }

    fn handle_composer_input(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.composer = None;
                self.status = "Comment discarded".to_string();
            }
            KeyCode::Enter => {
                let text = self.composer.take().unwrap_or_default();
                if text.trim().is_empty() {
                    self.status = "Empty comment dropped".to_string();
                } else {
                    self.session.post_comment(&text);
                    self.status = "Posting comment".to_string();
                }
            }
            KeyCode::Backspace => {
                if let Some(text) = &mut self.composer {
                    text.pop();
                }
            }
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                if let Some(text) = &mut self.composer {
                    text.push(c);
                }
            }
            _ => {}
        }
    }

    /// One keypress. Returns true when the app should exit.
    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if self.composer.is_some() {
            self.handle_composer_input(key);
            return Ok(false);
        }
        if self.help_open {
            self.help_open = false;
            return Ok(false);
        }

        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Esc => {
                self.status.clear();
                self.session.state.set_loupe_cursor(None);
            }
            KeyCode::Char(c @ '1'..='4') => {
                self.session.state.select_mode(c as u8 - b'0');
            }
            KeyCode::Char('n') => {
                let count = self.session.region_count();
                self.session.state.next_region(count);
                self.focus_selected_region();
            }
            KeyCode::Char('p') => {
                let count = self.session.region_count();
                self.session.state.prev_region(count);
                self.focus_selected_region();
            }
            KeyCode::Char('j') | KeyCode::Down => self.session.next_file(),
            KeyCode::Char('k') | KeyCode::Up => self.session.prev_file(),
            KeyCode::Left => self.session.state.adjust_param(-PARAM_STEP),
            KeyCode::Right => self.session.state.adjust_param(PARAM_STEP),
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.scroll_rows(0.5);
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.scroll_rows(-0.5);
            }
            KeyCode::Char('h') => self.scroll_cols(-PAN_STEP_COLS),
            KeyCode::Char('l') => self.scroll_cols(PAN_STEP_COLS),
            KeyCode::Char('r') => {
                self.session.state.viewport.reset();
                self.status = "View reset".to_string();
            }
            KeyCode::Char('R') => {
                self.session.reload();
                self.status = "Reloading".to_string();
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.session.state.loupe_zoom_in(),
            KeyCode::Char('-') => self.session.state.loupe_zoom_out(),
            KeyCode::Char('c') => self.open_composer(),
            KeyCode::Char('?') => self.help_open = true,
            _ => {}
        }

        Ok(false)
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) | MouseEventKind::Drag(MouseButton::Left) => {
                if let Some((x, _)) = self.canvas_position(mouse.column, mouse.row) {
                    let value = self.divider_fraction(x);
                    self.session.state.set_param(value);
                }
            }
            MouseEventKind::Moved => {
                let cursor = if mouse.modifiers.contains(KeyModifiers::ALT) {
                    self.canvas_position(mouse.column, mouse.row)
                } else {
                    None
                };
                self.session.state.set_loupe_cursor(cursor);
            }
            _ => {}
        }
    }

    /// Terminal cell to canvas pixel (the cell's upper half), when the
    /// pointer is inside the canvas area.
    fn canvas_position(&self, column: u16, row: u16) -> Option<(u16, u16)> {
        let area = self.canvas_area;
        if area.width == 0 || area.height == 0 {
            return None;
        }
        let inside = column >= area.x
            && column < area.x + area.width
            && row >= area.y
            && row < area.y + area.height;
        if !inside {
            return None;
        }
        Some((column - area.x, (row - area.y) * 2))
    }

    /// Horizontal fraction across the rendered pane, for pointer-driven
    /// swipe split and crossfade opacity.
    fn divider_fraction(&self, canvas_x: u16) -> f32 {
        match self.layout.primary() {
            Some(pane) => draw::pane_fraction(pane.x, pane.width, u32::from(canvas_x)),
            None => 0.5,
        }
    }

    /// Center the viewport on the selected region after n/p.
    fn focus_selected_region(&mut self) {
        let Some(region) = self.session.selected_region() else {
            return;
        };
        let Some(pane) = self.layout.primary() else {
            return;
        };
        let visible = pane.visible_rows();
        let (max_row, _) = pane.max_pan();
        let (row, _) = region.center();
        self.session
            .state
            .viewport
            .center_on_row(row as f32, visible, max_row);
    }

    /// Vertical scroll by a fraction of the visible image span.
    fn scroll_rows(&mut self, viewports: f32) {
        let Some(pane) = self.layout.primary() else {
            return;
        };
        let delta = pane.visible_rows() * viewports;
        let max = pane.max_pan();
        self.session.state.viewport.scroll_by(delta, 0.0, max);
    }

    fn scroll_cols(&mut self, delta: f32) {
        let Some(pane) = self.layout.primary() else {
            return;
        };
        let max = pane.max_pan();
        self.session.state.viewport.scroll_by(0.0, delta, max);
    }

    fn open_composer(&mut self) {
        if self.session.current_file().is_none() {
            return;
        }
        if self.session.can_comment() {
            self.composer = Some(String::new());
        } else if self.session.posting() {
            self.status = "Still posting the previous comment".to_string();
        } else {
            self.status = "Commenting needs a GitHub token".to_string();
        }
    }
}

struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        io::stdout()
            .execute(EnterAlternateScreen)?
            .execute(EnableMouseCapture)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
    }
}

fn run_interactive(mut app: App) -> Result<()> {
    let _guard = TerminalGuard::enter()?;

    let stdout = io::stdout();
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    loop {
        terminal.draw(|frame| app.draw(frame))?;
        app.session.tick();

        if event::poll(Duration::from_millis(120))? {
            match event::read()? {
                CEvent::Key(key) if key.kind == KeyEventKind::Press => {
                    if app.handle_key(key)? {
                        break;
                    }
                }
                CEvent::Mouse(mouse) => app.handle_mouse(mouse),
                _ => {}
            }
        }
    }

    Ok(())
}
