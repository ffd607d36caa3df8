use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::month_view::fit;
use crate::app::App;
use crate::theme;

const CONTINUE_NOTE: &str = "... Scan QR Code to Continue Reading";

pub struct CardOverlay;

impl CardOverlay {
    pub fn render(frame: &mut Frame, area: Rect, app: &App, org_name: &str) {
        let Some(card) = app.card.as_ref() else {
            return;
        };
        let theme = theme::current();
        let ev = &card.event;

        let popup_w = area.width.saturating_sub(4).min(100);
        let popup_h = area.height.saturating_sub(2).min(30);
        let x = area.x + area.width.saturating_sub(popup_w) / 2;
        let y = area.y + area.height.saturating_sub(popup_h) / 2;
        let popup = Rect::new(x, y, popup_w, popup_h);

        // Faded while a transition runs.
        let fade = if app.is_fading() {
            Modifier::DIM
        } else {
            Modifier::empty()
        };

        frame.render_widget(Clear, popup);
        let block = Block::default()
            .title(Span::styled(
                format!(" {} ", ev.title),
                theme.card.add_modifier(Modifier::BOLD),
            ))
            .title_bottom(Line::from(Span::styled(format!(" {org_name} "), theme.dim)).right_aligned())
            .borders(Borders::ALL)
            .border_style(theme.card)
            .style(Style::default().add_modifier(fade));
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        let qr_w = card
            .qr
            .first()
            .map(|row| row.chars().count() as u16)
            .unwrap_or(0)
            .max(14)
            + 2;
        let cols = Layout::horizontal([Constraint::Min(20), Constraint::Length(qr_w)]).split(inner);

        let left = cols[0];
        let text_w = left.width.saturating_sub(1) as usize;
        let mut lines = vec![
            Line::from(Span::styled(
                fit(&ev.schedule_line(), text_w),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::raw(fit(&ev.location, text_w))),
            Line::from(Span::styled(
                fit(&format!("Image: {}", ev.image_url), text_w),
                theme.dim,
            )),
            Line::from(""),
        ];
        let room = (left.height as usize).saturating_sub(lines.len());
        let (blurb, cut) = clamp_lines(wrap(&ev.blurb, text_w), room);
        lines.extend(blurb.into_iter().map(Line::from));
        if cut {
            lines.push(Line::from(Span::styled(
                CONTINUE_NOTE,
                theme.dim.add_modifier(Modifier::BOLD),
            )));
        }
        frame.render_widget(Paragraph::new(lines), left);

        let right = cols[1];
        let mut qr_lines: Vec<Line> = card.qr.iter().map(|row| Line::from(row.clone())).collect();
        qr_lines.push(Line::from(Span::styled("Scan to RSVP", theme.header)).centered());
        qr_lines.push(
            Line::from(Span::styled(fit(&card.link, right.width as usize), theme.dim)).centered(),
        );
        frame.render_widget(Paragraph::new(qr_lines), right);
    }
}

/// Greedy word wrap; words longer than `width` are split.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !line.is_empty() {
                    out.push(std::mem::take(&mut line));
                }
                out.push(word.drain(..width).collect());
            }
            let word: String = word.into_iter().collect();
            let needed = line.chars().count() + usize::from(!line.is_empty()) + word.chars().count();
            if needed > width && !line.is_empty() {
                out.push(std::mem::take(&mut line));
            }
            if !word.is_empty() {
                if !line.is_empty() {
                    line.push(' ');
                }
                line.push_str(&word);
            }
        }
        if !line.is_empty() {
            out.push(line);
        }
    }
    out
}

/// Keep what fits in `room` lines, leaving one for the continue note if cut.
fn clamp_lines(mut lines: Vec<String>, room: usize) -> (Vec<String>, bool) {
    if lines.len() <= room {
        return (lines, false);
    }
    lines.truncate(room.saturating_sub(1));
    (lines, true)
}
