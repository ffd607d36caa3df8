use chrono::{Datelike, NaiveDate};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{App, DayMark};
use crate::theme;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

pub struct MonthView;

impl MonthView {
    pub fn render(frame: &mut Frame, area: Rect, app: &App) {
        let theme = theme::current();

        let block = Block::default()
            .title(Line::from(format!(" {} ", app.title)).centered())
            .title_style(theme.header)
            .borders(Borders::ALL)
            .border_style(theme.border);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let Some(first_day) = NaiveDate::from_ymd_opt(app.year, app.month, 1) else {
            return;
        };
        let offset = first_day.weekday().num_days_from_sunday();
        let days = app.days_in_month();
        let weeks = (offset + days).div_ceil(7);

        let mut row_constraints = vec![Constraint::Length(1)];
        row_constraints.extend((0..weeks).map(|_| Constraint::Fill(1)));
        let rows = Layout::vertical(row_constraints).split(inner);

        let col_constraints = [Constraint::Ratio(1, 7); 7];
        let header_cols = Layout::horizontal(col_constraints).split(rows[0]);
        for (name, col) in DAY_NAMES.iter().zip(header_cols.iter()) {
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(*name, theme.header)).centered()),
                *col,
            );
        }

        for week in 0..weeks {
            let cols = Layout::horizontal(col_constraints).split(rows[week as usize + 1]);
            for (weekday, cell) in cols.iter().enumerate() {
                let slot = week * 7 + weekday as u32;
                if slot < offset || slot - offset >= days {
                    continue;
                }
                let day = slot - offset + 1;
                render_day(frame, *cell, app, day);
            }
        }
    }
}

fn render_day(frame: &mut Frame, area: Rect, app: &App, day: u32) {
    let theme = theme::current();
    let is_today = app.today.year() == app.year
        && app.today.month() == app.month
        && app.today.day() == day;

    let number_style = if is_today { theme.today } else { theme.header };
    let mut block = Block::default()
        .title(Span::styled(format!("{day:>2}"), number_style))
        .borders(Borders::ALL)
        .border_style(theme.border);

    let mark = app.marks.get(&day);
    if app.pulse == Some(day) {
        block = block.style(theme.pulse).border_style(theme.pulse);
    } else {
        match mark {
            Some(DayMark::Events(_)) => block = block.border_style(theme.event),
            Some(DayMark::Holiday(_)) => block = block.border_style(theme.holiday),
            None => {}
        }
    }

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = match mark {
        Some(DayMark::Events(titles)) => preview_lines(titles, inner, theme.event),
        Some(DayMark::Holiday(name)) => vec![Line::from(Span::styled(
            fit(name, inner.width as usize),
            theme.holiday,
        ))],
        None => Vec::new(),
    };
    frame.render_widget(Paragraph::new(lines), inner);
}

/// One line per title, with a "+N more" line when the cell is too short.
fn preview_lines(titles: &[String], area: Rect, style: Style) -> Vec<Line<'static>> {
    let width = area.width as usize;
    let room = area.height as usize;
    if room == 0 {
        return Vec::new();
    }

    let shown = if titles.len() > room { room - 1 } else { titles.len() };
    let mut lines: Vec<Line> = titles[..shown]
        .iter()
        .map(|t| Line::from(Span::styled(fit(t, width), style)))
        .collect();
    if shown < titles.len() {
        lines.push(Line::from(Span::styled(
            fit(&format!("+{} more", titles.len() - shown), width),
            theme::current().dim,
        )));
    }
    lines
}

/// Truncate to `width` columns with an ellipsis.
pub fn fit(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(width - 1).collect();
    out.push('\u{2026}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_truncates_with_ellipsis() {
        assert_eq!(fit("Career Fair", 20), "Career Fair");
        assert_eq!(fit("Career Fair", 7), "Career\u{2026}");
        assert_eq!(fit("Career Fair", 0), "");
    }

    #[test]
    fn overflowing_previews_summarize_the_rest() {
        let titles: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        let lines = preview_lines(&titles, Rect::new(0, 0, 10, 3), Style::default());
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].to_string(), "+2 more");

        let lines = preview_lines(&titles, Rect::new(0, 0, 10, 4), Style::default());
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3].to_string(), "D");
    }
}
