use chrono::{DateTime, Local};

pub const PLACEHOLDER_IMAGE: &str = "assets/placeholder-900x600.png";
pub const NO_LINK: &str = "#";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Event,
    Holiday,
}

impl EventKind {
    /// Anything not explicitly a holiday is an event.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("holiday") {
            EventKind::Holiday
        } else {
            EventKind::Event
        }
    }
}

/// A display-ready event record.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub day: u32,
    pub title: String,
    pub date_label: String,
    pub time_label: String,
    pub location: String,
    pub blurb: String,
    pub qr_link: String,
    pub image_url: String,
    pub kind: EventKind,
    pub start: DateTime<Local>,
}

impl Event {
    pub fn is_holiday(&self) -> bool {
        self.kind == EventKind::Holiday
    }

    /// The link to encode on the card, or `None` when the record had no usable one.
    pub fn link(&self) -> Option<&str> {
        let link = self.qr_link.trim();
        if link.is_empty() || link == NO_LINK {
            None
        } else {
            Some(link)
        }
    }

    pub fn schedule_line(&self) -> String {
        match (self.date_label.is_empty(), self.time_label.is_empty()) {
            (false, false) => format!("{} \u{2022} {}", self.date_label, self.time_label),
            (false, true) => self.date_label.clone(),
            (true, false) => self.time_label.clone(),
            (true, true) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parsing_is_lenient() {
        assert_eq!(EventKind::parse(" Holiday "), EventKind::Holiday);
        assert_eq!(EventKind::parse("HOLIDAY"), EventKind::Holiday);
        assert_eq!(EventKind::parse("event"), EventKind::Event);
        assert_eq!(EventKind::parse(""), EventKind::Event);
        assert_eq!(EventKind::parse("workshop"), EventKind::Event);
    }

    #[test]
    fn placeholder_link_counts_as_missing() {
        let mut ev = Event {
            day: 1,
            title: "Info Session".into(),
            date_label: "Mon, Nov 3".into(),
            time_label: "10:00 AM".into(),
            location: String::new(),
            blurb: String::new(),
            qr_link: NO_LINK.into(),
            image_url: PLACEHOLDER_IMAGE.into(),
            kind: EventKind::Event,
            start: Local::now(),
        };
        assert_eq!(ev.link(), None);
        ev.qr_link = "https://example.edu/rsvp".into();
        assert_eq!(ev.link(), Some("https://example.edu/rsvp"));
        assert_eq!(ev.schedule_line(), "Mon, Nov 3 \u{2022} 10:00 AM");
    }
}
