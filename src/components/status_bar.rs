use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::App;
use crate::theme;

pub struct StatusBar;

impl StatusBar {
    pub fn render(frame: &mut Frame, area: Rect, app: &App) {
        let style = theme::current().status;
        let w = area.width as usize;

        let left = format!(" {} ", app.title);
        let right = status_text(app, w.saturating_sub(left.chars().count()));
        let padding = " ".repeat(w.saturating_sub(left.chars().count() + right.chars().count()));

        let line = Line::from(vec![
            Span::styled(left, style),
            Span::styled(padding, style),
            Span::styled(right, style),
        ]);
        frame.render_widget(Paragraph::new(line).style(style), area);
    }
}

/// Event count and last refresh, shortened to fit `room` columns.
fn status_text(app: &App, room: usize) -> String {
    let count = match app.event_count {
        1 => "1 event".to_string(),
        n => format!("{n} events"),
    };
    let full = match app.last_published {
        Some(at) => format!(" {count} \u{b7} updated {} ", at.format("%-I:%M %p")),
        None => format!(" {count} "),
    };
    if full.chars().count() <= room {
        full
    } else {
        format!(" {count} ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use std::time::Duration;

    #[test]
    fn drops_the_timestamp_when_narrow() {
        let mut app = App::new("Events", Local::now().date_naive(), Duration::ZERO);
        app.event_count = 1;
        assert_eq!(status_text(&app, 80), " 1 event ");

        app.last_published = Some(Local::now());
        assert!(status_text(&app, 80).contains("updated"));
        assert_eq!(status_text(&app, 10), " 1 event ");
    }
}
