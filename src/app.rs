use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Datelike, Local, NaiveDate};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::calendar::{days_in_month, month_name, Event};

/// What a day cell shows under its number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayMark {
    Events(Vec<String>),
    Holiday(String),
}

/// Group events by day. A day with any event lists every event title;
/// a holiday marker only shows on a day with no events.
pub fn day_marks(events: &[Event]) -> BTreeMap<u32, DayMark> {
    let mut by_day: BTreeMap<u32, Vec<&Event>> = BTreeMap::new();
    for ev in events {
        by_day.entry(ev.day).or_default().push(ev);
    }

    by_day
        .into_iter()
        .filter_map(|(day, evs)| {
            let titles: Vec<String> = evs
                .iter()
                .filter(|e| !e.is_holiday())
                .map(|e| e.title.clone())
                .collect();
            if !titles.is_empty() {
                return Some((day, DayMark::Events(titles)));
            }
            evs.iter()
                .find(|e| e.is_holiday())
                .map(|h| (day, DayMark::Holiday(h.title.clone())))
        })
        .collect()
}

/// The card content, resolved once when the card opens.
#[derive(Debug, Clone)]
pub struct CardView {
    pub event: Event,
    pub link: String,
    pub qr: Vec<String>,
}

#[derive(Debug)]
pub enum CardPhase {
    Closed,
    Opening {
        since: Instant,
        done: oneshot::Sender<()>,
    },
    Open,
    Closing {
        since: Instant,
        done: oneshot::Sender<()>,
    },
}

pub struct App {
    pub heading: String,
    pub title: String,
    pub year: i32,
    pub month: u32,
    pub today: NaiveDate,
    pub marks: BTreeMap<u32, DayMark>,
    pub pulse: Option<u32>,
    pub card: Option<CardView>,
    pub phase: CardPhase,
    pub loading: bool,
    pub event_count: usize,
    pub last_published: Option<DateTime<Local>>,
    fade: Duration,
}

impl App {
    pub fn new(heading: impl Into<String>, today: NaiveDate, fade: Duration) -> Self {
        let mut app = Self {
            heading: heading.into(),
            title: String::new(),
            year: today.year(),
            month: today.month(),
            today,
            marks: BTreeMap::new(),
            pulse: None,
            card: None,
            phase: CardPhase::Closed,
            loading: true,
            event_count: 0,
            last_published: None,
            fade,
        };
        app.set_title(today);
        app
    }

    pub fn set_title(&mut self, today: NaiveDate) {
        self.title = format!("{} {}", month_name(today.month()), self.heading);
    }

    /// Reset the grid to the month of `today`. An active pulse is left alone.
    pub fn draw_grid(&mut self, today: NaiveDate) {
        self.year = today.year();
        self.month = today.month();
        self.today = today;
        self.marks.clear();
    }

    pub fn highlight(&mut self, events: &[Event]) {
        self.marks = day_marks(events);
        self.event_count = events.iter().filter(|e| !e.is_holiday()).count();
        self.last_published = Some(Local::now());
    }

    pub fn days_in_month(&self) -> u32 {
        days_in_month(self.year, self.month)
    }

    pub fn has_day(&self, day: u32) -> bool {
        (1..=self.days_in_month()).contains(&day)
    }

    pub fn set_pulse(&mut self, day: u32, on: bool) {
        if on {
            self.pulse = Some(day);
        } else if self.pulse == Some(day) {
            self.pulse = None;
        }
    }

    pub fn begin_open(&mut self, card: CardView, done: oneshot::Sender<()>, now: Instant) {
        self.card = Some(card);
        self.phase = CardPhase::Opening { since: now, done };
    }

    /// Start the fade-out. Returns false, after resetting, when no card is up.
    pub fn begin_close(&mut self, done: oneshot::Sender<()>, now: Instant) -> bool {
        if self.card.is_none() || matches!(self.phase, CardPhase::Closed) {
            self.force_closed();
            return false;
        }
        self.phase = CardPhase::Closing { since: now, done };
        true
    }

    pub fn force_closed(&mut self) {
        self.card = None;
        self.phase = CardPhase::Closed;
    }

    pub fn is_fading(&self) -> bool {
        matches!(
            self.phase,
            CardPhase::Opening { .. } | CardPhase::Closing { .. }
        )
    }

    /// Finish a transition whose fade has run its course and signal its waiter.
    pub fn tick(&mut self, now: Instant) {
        let since = match &self.phase {
            CardPhase::Opening { since, .. } | CardPhase::Closing { since, .. } => *since,
            _ => return,
        };
        if now.duration_since(since) < self.fade {
            return;
        }

        let done = match std::mem::replace(&mut self.phase, CardPhase::Closed) {
            CardPhase::Opening { done, .. } => {
                self.phase = CardPhase::Open;
                Some(done)
            }
            CardPhase::Closing { done, .. } => {
                self.card = None;
                Some(done)
            }
            _ => None,
        };
        if let Some(done) = done {
            let _ = done.send(());
        }
    }
}
