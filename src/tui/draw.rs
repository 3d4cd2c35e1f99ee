use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::prelude::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};

use super::App;
use crate::compare::{GutterMap, TRANSPARENT};
use crate::session::{LoadOutcome, LoadState};
use crate::view::{
    render_comparison, render_placeholder, render_single, Canvas, Loupe, LoupeSample,
    RenderLayout, Side, ViewMode,
};

impl App {
    pub(super) fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let chunks =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(frame.size());
        let body = chunks[0];
        let status = chunks[1];

        let files_width = body.width.saturating_div(4).clamp(20, 34);
        let comments_width = if body.width >= 110 { 36 } else { 0 };
        let cols = Layout::horizontal([
            Constraint::Length(files_width),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(comments_width),
        ])
        .split(body);

        self.draw_files(frame, cols[0]);
        self.draw_canvas(frame, cols[1]);
        self.draw_gutter(frame, cols[2]);
        if comments_width > 0 {
            self.draw_comments(frame, cols[3]);
        }
        self.draw_status(frame, status);

        if let Some(sample) = self.loupe_sample() {
            self.draw_loupe(frame, &sample);
        }
        if self.help_open {
            draw_help(frame);
        }
        if let Some(text) = &self.composer {
            self.draw_composer(frame, text);
        }
    }

    fn draw_files(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let listing = self.session.listing();
        let selected = self.session.selected_index();

        let items: Vec<ListItem> = if listing.images.is_empty() {
            vec![ListItem::new(Line::raw("  (no changed PNGs)"))]
        } else {
            listing
                .images
                .iter()
                .enumerate()
                .map(|(idx, entry)| {
                    let marker = if idx == selected { "> " } else { "  " };
                    let count = self.session.comment_count(&entry.path);
                    let badge = if count > 0 {
                        format!(" [{count}]")
                    } else {
                        String::new()
                    };
                    let mut line = Line::raw(format!(
                        "{marker}{} {}{badge}",
                        status_glyph(&entry.status),
                        entry.path
                    ));
                    if idx == selected {
                        line = line.fg(Color::Yellow).bold();
                    }
                    ListItem::new(line)
                })
                .collect()
        };

        let list = List::new(items).block(
            Block::default()
                .title(format!(" PR #{}: {} ", listing.pr_number, listing.pr_title))
                .borders(Borders::RIGHT)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        frame.render_widget(list, area);
    }

    fn draw_canvas(&mut self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        self.canvas_area = area;
        if area.width == 0 || area.height == 0 {
            self.layout = RenderLayout::empty();
            return;
        }

        // Two image rows per terminal row via the half-block glyph.
        let mut canvas = Canvas::new(u32::from(area.width), u32::from(area.height) * 2);
        self.layout = match self.session.load_state() {
            LoadState::Empty | LoadState::Loading => RenderLayout::empty(),
            LoadState::Done(LoadOutcome::Compared(comparison)) => {
                render_comparison(&mut canvas, comparison, &self.session.state)
            }
            LoadState::Done(LoadOutcome::SingleSide { side, bitmap, .. }) => {
                render_single(&mut canvas, bitmap, *side, &self.session.state)
            }
            LoadState::Done(LoadOutcome::Unavailable { .. }) => render_placeholder(&mut canvas),
        };

        paint_canvas(frame, area, &canvas);

        if matches!(self.session.load_state(), LoadState::Loading) {
            let notice = Paragraph::new(" loading…").style(Style::default().fg(Color::DarkGray));
            let top = Rect {
                height: area.height.min(1),
                ..area
            };
            frame.render_widget(notice, top);
        }
    }

    fn draw_gutter(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let Some(comparison) = self.session.comparison() else {
            return;
        };
        let lines: Vec<Line> = gutter_column(&comparison.gutter, area.height)
            .chars()
            .map(|c| Line::styled(c.to_string(), Style::default().fg(Color::Red)))
            .collect();
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn draw_comments(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        if self.session.posting() {
            lines.push(Line::styled("posting…", Style::default().fg(Color::Yellow)));
        }
        if let Some(err) = self.session.comment_error() {
            lines.push(Line::styled(
                err.to_string(),
                Style::default().fg(Color::Red),
            ));
        }
        if self.session.comments().is_empty() && lines.is_empty() {
            lines.push(Line::styled(
                "no comments on this file",
                Style::default().fg(Color::DarkGray),
            ));
        }
        for comment in self.session.comments() {
            let date = comment.created_at.get(..10).unwrap_or(&comment.created_at);
            lines.push(Line::styled(
                format!("{} {}", comment.user, date),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ));
            for body_line in comment.body.lines() {
                lines.push(Line::raw(body_line.to_string()));
            }
            lines.push(Line::raw(""));
        }

        let widget = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
            Block::default()
                .title(format!(" Comments ({}) ", self.session.comments().len()))
                .borders(Borders::LEFT)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        frame.render_widget(widget, area);
    }

    fn draw_status(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let file_part = match self.session.current_file() {
            Some(entry) => format!(
                "{}/{} {}",
                self.session.selected_index() + 1,
                self.session.files().len(),
                entry.path
            ),
            None => "no images".to_string(),
        };

        let mode = self.session.state.mode;
        let mode_part = match mode {
            ViewMode::Crossfade { opacity } => format!("{} {opacity:.2}", mode.label()),
            ViewMode::Swipe { split } => format!("{} {split:.2}", mode.label()),
            ViewMode::SideBySide | ViewMode::DiffOverlay => mode.label().to_string(),
        };

        let load_part = match self.session.load_state() {
            LoadState::Empty => String::new(),
            LoadState::Loading => "loading…".to_string(),
            LoadState::Done(LoadOutcome::Compared(_)) => {
                let count = self.session.region_count();
                if count == 0 {
                    "no pixel differences".to_string()
                } else {
                    match self.session.state.cursor.selected() {
                        Some(idx) => format!("region {}/{count}", idx + 1),
                        None => format!("{count} regions"),
                    }
                }
            }
            LoadState::Done(LoadOutcome::SingleSide { side, other, .. }) => {
                format!("{} only; other side {}", side.label(), other.describe())
            }
            LoadState::Done(LoadOutcome::Unavailable { base, current }) => {
                format!(
                    "no image either side (base {}; current {})",
                    base.describe(),
                    current.describe()
                )
            }
        };

        let loupe_part = if self.session.state.loupe.cursor.is_some() {
            format!("loupe ×{}", self.session.state.loupe.zoom)
        } else {
            String::new()
        };

        let mut status_text = format!("{file_part} | {mode_part}");
        for part in [load_part, loupe_part] {
            if !part.is_empty() {
                status_text.push_str(" | ");
                status_text.push_str(&part);
            }
        }
        if !self.status.is_empty() {
            status_text.push_str(" | ");
            status_text.push_str(&self.status);
        }

        frame.render_widget(
            Paragraph::new(format!(" {status_text}")).style(Style::default().fg(Color::Gray)),
            area,
        );
    }

    fn loupe_sample(&self) -> Option<LoupeSample> {
        let comparison = self.session.comparison()?;
        Loupe::sample(&self.session.state, comparison, &self.layout)
    }

    fn draw_loupe(&self, frame: &mut ratatui::Frame<'_>, sample: &LoupeSample) {
        let grid = sample.size() as u16;
        let grid_rows = (grid + 1) / 2;
        let panel_width = grid.max(16) + 2;
        let panel_height = grid_rows + 4 + 2;

        let host = self.canvas_area;
        if host.width < panel_width + 2 || host.height < panel_height {
            return;
        }
        let area = Rect {
            x: host.x + host.width - panel_width - 1,
            y: host.y,
            width: panel_width,
            height: panel_height,
        };

        let block = Block::default()
            .title(format!(" loupe r{} c{} ", sample.row, sample.col))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        let inner = block.inner(area);
        frame.render_widget(Clear, area);
        frame.render_widget(block, area);

        // Magnified neighborhood of the hovered side, two pixels per cell.
        let pixels = match sample.side {
            Side::Base => &sample.base,
            Side::Current => &sample.current,
        };
        let buffer = frame.buffer_mut();
        for cell_y in 0..grid_rows.min(inner.height) {
            for cell_x in 0..grid.min(inner.width) {
                let upper_idx = usize::from(cell_y) * 2 * usize::from(grid) + usize::from(cell_x);
                let lower_idx = upper_idx + usize::from(grid);
                let upper = pixels.get(upper_idx).copied().unwrap_or(TRANSPARENT);
                let lower = pixels.get(lower_idx).copied().unwrap_or(TRANSPARENT);
                buffer
                    .get_mut(inner.x + cell_x, inner.y + cell_y)
                    .set_symbol("▀")
                    .set_fg(color_of(upper))
                    .set_bg(color_of(lower));
            }
        }

        let readout = [
            format!("side  {}", sample.side.label()),
            format!("base  {}", hex_rgba(sample.center_base())),
            format!("cur   {}", hex_rgba(sample.center_current())),
            format!("delta {}", sample.center_magnitude()),
        ];
        for (i, line) in readout.iter().enumerate() {
            let y = inner.y + grid_rows + i as u16;
            if y >= inner.y + inner.height {
                break;
            }
            buffer.set_stringn(
                inner.x,
                y,
                line,
                usize::from(inner.width),
                Style::default().fg(Color::Gray),
            );
        }
    }

    fn draw_composer(&self, frame: &mut ratatui::Frame<'_>, text: &str) {
        let path = self
            .session
            .current_file()
            .map_or("", |entry| entry.path.as_str());
        let anchor = match self.session.selected_region() {
            Some(r) => format!(
                "anchors to rows {}-{}, cols {}-{}",
                r.min_row, r.max_row, r.min_col, r.max_col
            ),
            None => "file-level comment".to_string(),
        };

        let size = frame.size();
        let area = centered_rect(size, size.width.saturating_sub(8).min(72), 6);
        frame.render_widget(Clear, area);
        let widget = Paragraph::new(vec![
            Line::raw(format!("> {text}")),
            Line::raw(""),
            Line::styled(anchor, Style::default().fg(Color::DarkGray)),
            Line::styled(
                "Enter posts, Esc discards",
                Style::default().fg(Color::DarkGray),
            ),
        ])
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(format!(" Comment on {path} "))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        );
        frame.render_widget(widget, area);
    }
}

fn draw_help(frame: &mut ratatui::Frame<'_>) {
    const KEYS: &[(&str, &str)] = &[
        ("1-4", "side-by-side / crossfade / swipe / diff overlay"),
        ("n p", "next / previous changed region"),
        ("j k", "next / previous file"),
        ("← →", "nudge crossfade opacity or swipe split"),
        ("drag", "set the split or opacity with the pointer"),
        ("h l", "pan horizontally"),
        ("C-d C-u", "scroll half a viewport"),
        ("r", "reset the viewport"),
        ("alt+move", "pixel loupe"),
        ("+ -", "loupe radius"),
        ("c", "comment on this file"),
        ("R", "reload this file"),
        ("q", "quit"),
    ];

    let mut lines: Vec<Line> = KEYS
        .iter()
        .map(|(key, what)| {
            Line::from(vec![
                Span::styled(format!(" {key:<9}"), Style::default().fg(Color::Yellow)),
                Span::raw(*what),
            ])
        })
        .collect();
    lines.push(Line::raw(""));
    lines.push(Line::styled(
        " any key to close",
        Style::default().fg(Color::DarkGray),
    ));

    let area = centered_rect(frame.size(), 58, lines.len() as u16 + 2);
    frame.render_widget(Clear, area);
    let widget = Paragraph::new(lines).block(
        Block::default()
            .title(" Keys ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    frame.render_widget(widget, area);
}

/// Paint an RGBA canvas into the terminal with half blocks: each cell
/// carries two vertically stacked pixels, the upper one on the foreground.
fn paint_canvas(frame: &mut ratatui::Frame<'_>, area: Rect, canvas: &Canvas) {
    let buffer = frame.buffer_mut();
    for dy in 0..area.height {
        for dx in 0..area.width {
            let upper = canvas.pixel(u32::from(dx), u32::from(dy) * 2);
            let lower = canvas.pixel(u32::from(dx), u32::from(dy) * 2 + 1);
            buffer
                .get_mut(area.x + dx, area.y + dy)
                .set_symbol("▀")
                .set_fg(color_of(upper))
                .set_bg(color_of(lower));
        }
    }
}

fn color_of(px: [u8; 4]) -> Color {
    Color::Rgb(px[0], px[1], px[2])
}

fn hex_rgba(px: [u8; 4]) -> String {
    format!("#{:02x}{:02x}{:02x}{:02x}", px[0], px[1], px[2], px[3])
}

fn status_glyph(status: &str) -> char {
    match status {
        "added" => '+',
        "removed" => '-',
        "renamed" => '>',
        _ => '~',
    }
}

fn centered_rect(host: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(host.width);
    let height = height.min(host.height);
    Rect {
        x: host.x + (host.width - width) / 2,
        y: host.y + (host.height - height) / 2,
        width,
        height,
    }
}

/// Compress per-row densities into one shade character per terminal row.
/// Each cell takes the worst density in its band of image rows.
pub(super) fn gutter_column(gutter: &GutterMap, cells: u16) -> String {
    let rows = gutter.rows();
    if cells == 0 || rows == 0 {
        return " ".repeat(usize::from(cells));
    }
    (0..usize::from(cells))
        .map(|cell| {
            let start = cell * rows / usize::from(cells);
            let end = ((cell + 1) * rows / usize::from(cells)).max(start + 1);
            let worst = (start..end.min(rows))
                .map(|row| gutter.density(row as u32))
                .fold(0.0, f32::max);
            shade_for_density(worst)
        })
        .collect()
}

/// Shade for one density value. Any nonzero density stays visible.
pub(super) fn shade_for_density(density: f32) -> char {
    if density <= 0.0 {
        ' '
    } else if density < 0.10 {
        '░'
    } else if density < 0.35 {
        '▒'
    } else if density < 0.75 {
        '▓'
    } else {
        '█'
    }
}

/// Horizontal fraction of a canvas position across one pane, clamped.
pub(super) fn pane_fraction(pane_x: u32, pane_width: u32, x: u32) -> f32 {
    if pane_width == 0 {
        return 0.5;
    }
    ((x as f32 - pane_x as f32) / pane_width as f32).clamp(0.0, 1.0)
}
