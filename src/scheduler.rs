//! The presentation loop and the background refresh that feeds it.
//!
//! The loop and the refresh task run cooperatively on one thread. They share
//! nothing but a `watch` channel: the refresh task publishes a whole new list,
//! and the loop picks it up at the start of its next iteration.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use color_eyre::Result;
use tokio::sync::watch;
use tokio::time::{self, sleep, Instant, MissedTickBehavior};

use crate::calendar::store::Fetch;
use crate::calendar::{filter, Event, Source};

/// The month grid as the scheduler sees it.
pub trait CalendarGrid {
    fn set_title(&self, today: NaiveDate);
    fn draw_grid(&self, today: NaiveDate);
    /// Rebuild every day's previews from `events`, replacing what was there.
    fn highlight_days(&self, events: &[Event]);
    fn has_day(&self, day: u32) -> bool;
    fn set_pulse(&self, day: u32, on: bool);
}

/// The detail overlay. `open` and `close` resolve once their transition has finished.
#[allow(async_fn_in_trait)]
pub trait EventCard {
    async fn open(&self, event: &Event) -> Result<()>;
    async fn close(&self) -> Result<()>;
    /// Drop any card immediately. Safe to call at any time.
    fn force_closed(&self);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timings {
    pub calendar_pause: Duration,
    pub card_dwell: Duration,
    pub between_events: Duration,
    pub pulse_lead: Duration,
    pub refresh_every: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            calendar_pause: Duration::from_secs(20),
            card_dwell: Duration::from_secs(15),
            between_events: Duration::from_millis(1200),
            pulse_lead: Duration::from_millis(500),
            refresh_every: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    PausedOnCalendar,
    Pulsing,
    ShowingCard,
    HidingCard,
}

/// The working list and the position in it.
#[derive(Debug, Clone)]
pub struct Playlist {
    events: Arc<[Event]>,
    index: usize,
}

impl Playlist {
    pub fn new(events: Arc<[Event]>) -> Self {
        Self { events, index: 0 }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<(usize, Event)> {
        self.events
            .get(self.index)
            .map(|event| (self.index, event.clone()))
    }

    pub fn advance(&mut self) {
        if !self.events.is_empty() {
            self.index = (self.index + 1) % self.events.len();
        }
    }

    pub fn replace(&mut self, events: Arc<[Event]>) {
        self.events = events;
        if self.index >= self.events.len() {
            self.index = 0;
        }
    }
}

pub struct Scheduler<G, C> {
    grid: G,
    card: C,
    timings: Timings,
    playlist: Playlist,
    updates: watch::Receiver<Arc<[Event]>>,
    phase: Phase,
}

impl<G: CalendarGrid, C: EventCard> Scheduler<G, C> {
    pub fn new(
        grid: G,
        card: C,
        timings: Timings,
        mut updates: watch::Receiver<Arc<[Event]>>,
    ) -> Self {
        let playlist = Playlist::new(updates.borrow_and_update().clone());
        Self {
            grid,
            card,
            timings,
            playlist,
            updates,
            phase: Phase::Idle,
        }
    }

    /// Loop forever. Returns only when there is nothing to show at start.
    pub async fn run(mut self) {
        if self.playlist.is_empty() {
            tracing::warn!("no events to display, presentation loop not started");
            return;
        }
        tracing::info!(events = self.playlist.len(), "presentation loop starting");

        self.enter(Phase::PausedOnCalendar);
        sleep(self.timings.calendar_pause).await;

        loop {
            self.cycle().await;
        }
    }

    async fn cycle(&mut self) {
        self.take_update();

        if let Some((pos, event)) = self.playlist.current() {
            let total = self.playlist.len();
            if let Err(err) = self.present(&event, pos, total).await {
                tracing::error!(title = %event.title, "presentation failed: {err:#}");
                self.grid.set_pulse(event.day, false);
                self.card.force_closed();
            }
        }

        self.enter(Phase::PausedOnCalendar);
        sleep(self.timings.calendar_pause).await;

        self.playlist.advance();
        sleep(self.timings.between_events).await;
    }

    async fn present(&mut self, event: &Event, pos: usize, total: usize) -> Result<()> {
        if !self.grid.has_day(event.day) {
            tracing::warn!(day = event.day, title = %event.title, "no calendar cell for day");
            return Ok(());
        }

        self.enter(Phase::Pulsing);
        self.grid.set_pulse(event.day, true);
        sleep(self.timings.pulse_lead).await;

        tracing::info!("showing event {}/{}: {:?}", pos + 1, total, event.title);
        self.enter(Phase::ShowingCard);
        self.card.open(event).await?;
        sleep(self.timings.card_dwell).await;

        self.enter(Phase::HidingCard);
        self.grid.set_pulse(event.day, false);
        self.card.close().await?;
        Ok(())
    }

    fn take_update(&mut self) {
        if self.updates.has_changed().unwrap_or(false) {
            let events = self.updates.borrow_and_update().clone();
            tracing::debug!(
                old = self.playlist.len(),
                new = events.len(),
                "swapping in refreshed events"
            );
            self.playlist.replace(events);
            tracing::debug!(index = self.playlist.index(), "resuming");
        }
    }

    fn enter(&mut self, phase: Phase) {
        tracing::trace!(from = ?self.phase, to = ?phase, "phase");
        self.phase = phase;
    }
}

/// Push a month of events to the grid and return the ones that get cards.
pub fn publish<G: CalendarGrid>(grid: &G, events: &[Event], today: NaiveDate) -> Arc<[Event]> {
    grid.set_title(today);
    grid.draw_grid(today);
    grid.highlight_days(events);
    filter::pop_ups(events)
}

pub struct Refresher<G, F> {
    grid: G,
    source: Source<F>,
    every: Duration,
    updates: watch::Sender<Arc<[Event]>>,
}

impl<G: CalendarGrid, F: Fetch> Refresher<G, F> {
    pub fn new(
        grid: G,
        source: Source<F>,
        every: Duration,
        updates: watch::Sender<Arc<[Event]>>,
    ) -> Self {
        Self {
            grid,
            source,
            every,
            updates,
        }
    }

    /// Reload, republish the grid, and hand the scheduler a new working list.
    pub async fn refresh(&self, force_refresh: bool) {
        let events = self.source.load_current_month(force_refresh).await;
        let cards = publish(&self.grid, &events, Local::now().date_naive());
        tracing::info!(
            events = events.len(),
            cards = cards.len(),
            "published events"
        );
        self.updates.send_replace(cards);
    }

    pub async fn run(self) {
        let mut ticker = time::interval_at(Instant::now() + self.every, self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            tracing::debug!("scheduled refresh");
            self.refresh(true).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::normalize::normalize_csv;
    use color_eyre::eyre::eyre;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tokio::time::timeout;

    #[derive(Clone)]
    struct Log {
        start: Instant,
        entries: Rc<RefCell<Vec<(u128, String)>>>,
    }

    impl Log {
        fn new() -> Self {
            Self {
                start: Instant::now(),
                entries: Rc::default(),
            }
        }

        fn push(&self, what: impl Into<String>) {
            let at = self.start.elapsed().as_millis();
            self.entries.borrow_mut().push((at, what.into()));
        }

        fn entries(&self) -> Vec<(u128, String)> {
            self.entries.borrow().clone()
        }

        fn opened(&self) -> Vec<String> {
            self.entries()
                .into_iter()
                .filter_map(|(_, e)| e.strip_prefix("open ").map(str::to_string))
                .collect()
        }
    }

    struct FakeGrid {
        log: Log,
        days: u32,
    }

    impl CalendarGrid for FakeGrid {
        fn set_title(&self, _today: NaiveDate) {
            self.log.push("title");
        }

        fn draw_grid(&self, _today: NaiveDate) {
            self.log.push("grid");
        }

        fn highlight_days(&self, events: &[Event]) {
            self.log.push(format!("highlight {}", events.len()));
        }

        fn has_day(&self, day: u32) -> bool {
            (1..=self.days).contains(&day)
        }

        fn set_pulse(&self, day: u32, on: bool) {
            self.log
                .push(format!("pulse {day} {}", if on { "on" } else { "off" }));
        }
    }

    struct FakeCard {
        log: Log,
        fade: Duration,
        broken: Option<&'static str>,
    }

    impl EventCard for FakeCard {
        async fn open(&self, event: &Event) -> Result<()> {
            self.log.push(format!("open {}", event.title));
            if self.broken == Some(event.title.as_str()) {
                return Err(eyre!("QR data too long"));
            }
            sleep(self.fade).await;
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.log.push("close");
            sleep(self.fade).await;
            Ok(())
        }

        fn force_closed(&self) {
            self.log.push("force closed");
        }
    }

    /// Rows normalized against a 31-day month so any day 1..=31 is admitted.
    fn events(rows: &[(u32, &str)]) -> Arc<[Event]> {
        use chrono::TimeZone;
        let october = Local.with_ymd_and_hms(2024, 10, 15, 9, 0, 0).unwrap();
        let csv: String = std::iter::once("Day,Title".to_string())
            .chain(rows.iter().map(|(d, t)| format!("{d},{t}")))
            .collect::<Vec<_>>()
            .join("\n");
        normalize_csv(&csv, october).into()
    }

    fn scheduler(
        log: &Log,
        list: Arc<[Event]>,
        broken: Option<&'static str>,
    ) -> (Scheduler<FakeGrid, FakeCard>, watch::Sender<Arc<[Event]>>) {
        let (tx, rx) = watch::channel(list);
        let grid = FakeGrid {
            log: log.clone(),
            days: 30,
        };
        let card = FakeCard {
            log: log.clone(),
            fade: Duration::from_millis(600),
            broken,
        };
        (Scheduler::new(grid, card, Timings::default(), rx), tx)
    }

    #[test]
    fn advance_wraps_around() {
        let mut playlist = Playlist::new(events(&[(1, "a"), (2, "b"), (3, "c")]));
        playlist.advance();
        playlist.advance();
        assert_eq!(playlist.index(), 2);
        playlist.advance();
        assert_eq!(playlist.index(), 0);
    }

    #[test]
    fn shorter_list_resets_index() {
        let mut playlist = Playlist::new(events(&[
            (1, "a"),
            (2, "b"),
            (3, "c"),
            (4, "d"),
            (5, "e"),
            (6, "f"),
        ]));
        for _ in 0..5 {
            playlist.advance();
        }
        assert_eq!(playlist.index(), 5);

        playlist.replace(events(&[(1, "x"), (2, "y"), (3, "z")]));
        assert_eq!(playlist.index(), 0);
        assert_eq!(playlist.current().unwrap().1.title, "x");
    }

    #[test]
    fn longer_list_keeps_index() {
        let mut playlist = Playlist::new(events(&[(1, "a"), (2, "b")]));
        playlist.advance();
        playlist.replace(events(&[(1, "x"), (2, "y"), (3, "z")]));
        assert_eq!(playlist.current().unwrap().1.title, "y");
    }

    #[test]
    fn empty_playlist_has_nothing_current() {
        let mut playlist = Playlist::new(Arc::from(Vec::new()));
        playlist.advance();
        assert!(playlist.current().is_none());
        assert_eq!(playlist.index(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_follows_the_fixed_timeline() {
        let log = Log::new();
        let (scheduler, _tx) = scheduler(&log, events(&[(5, "A"), (12, "B")]), None);

        let _ = timeout(Duration::from_secs(60), scheduler.run()).await;

        let entries = log.entries();
        let expected: Vec<(u128, String)> = vec![
            (20_000, "pulse 5 on".into()),
            (20_500, "open A".into()),
            (36_100, "pulse 5 off".into()),
            (36_100, "close".into()),
            (57_900, "pulse 12 on".into()),
            (58_400, "open B".into()),
        ];
        assert_eq!(entries, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_wraps_back_to_the_first_event() {
        let log = Log::new();
        let (scheduler, _tx) = scheduler(&log, events(&[(1, "A"), (2, "B"), (3, "C")]), None);

        let _ = timeout(Duration::from_secs(140), scheduler.run()).await;

        assert_eq!(log.opened(), ["A", "B", "C", "A"]);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_day_cell_keeps_the_full_pause() {
        let log = Log::new();
        let (scheduler, _tx) = scheduler(&log, events(&[(31, "Ghost"), (3, "Real")]), None);

        let _ = timeout(Duration::from_secs(42), scheduler.run()).await;

        let entries = log.entries();
        assert_eq!(entries[0], (41_200, "pulse 3 on".to_string()));
        assert!(!log.opened().contains(&"Ghost".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_card_is_force_closed_and_the_loop_continues() {
        let log = Log::new();
        let (scheduler, _tx) = scheduler(&log, events(&[(2, "Broken"), (4, "Fine")]), Some("Broken"));

        let _ = timeout(Duration::from_secs(43), scheduler.run()).await;

        let expected: Vec<(u128, String)> = vec![
            (20_000, "pulse 2 on".into()),
            (20_500, "open Broken".into()),
            (20_500, "pulse 2 off".into()),
            (20_500, "force closed".into()),
            (41_700, "pulse 4 on".into()),
            (42_200, "open Fine".into()),
        ];
        assert_eq!(log.entries(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_start_returns_without_presenting() {
        let log = Log::new();
        let (scheduler, _tx) = scheduler(&log, Arc::from(Vec::new()), None);

        let finished = timeout(Duration::from_secs(1), scheduler.run()).await;

        assert!(finished.is_ok());
        assert!(log.entries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_lands_after_the_current_iteration() {
        let log = Log::new();
        let (scheduler, tx) = scheduler(&log, events(&[(1, "A"), (2, "B"), (3, "C")]), None);

        let swap = async {
            sleep(Duration::from_secs(25)).await;
            tx.send_replace(events(&[(9, "Z")]));
        };
        let _ = tokio::join!(timeout(Duration::from_secs(60), scheduler.run()), swap);

        assert_eq!(log.opened(), ["A", "Z"]);
        assert!(log.entries().contains(&(36_100, "close".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn refresher_publishes_grid_and_cards() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        std::fs::write(&path, "Day,Title,Type\n5,Career Fair,event\n12,Winter Break,holiday\n")
            .unwrap();

        let log = Log::new();
        let grid = FakeGrid {
            log: log.clone(),
            days: 31,
        };
        let (tx, rx) = watch::channel(Arc::from(Vec::new()));
        let every = Duration::from_secs(3600);
        let refresher: Refresher<_, crate::calendar::HttpFeed> =
            Refresher::new(grid, Source::Csv(path), every, tx);

        refresher.refresh(false).await;
        assert_eq!(rx.borrow().len(), 1);
        assert_eq!(rx.borrow()[0].title, "Career Fair");

        let _ = timeout(every * 2 + Duration::from_secs(1), refresher.run()).await;
        let highlights = log
            .entries()
            .into_iter()
            .filter(|(_, e)| e == "highlight 2")
            .count();
        assert_eq!(highlights, 3);
    }

    /// Feed that counts calls and always serves the same live payload.
    struct CountingFeed {
        calls: Rc<std::cell::Cell<usize>>,
        payload: serde_json::Value,
    }

    impl Fetch for CountingFeed {
        async fn fetch(&self, _cache_bust: i64) -> Result<serde_json::Value> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.payload.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_refresh_goes_past_a_fresh_cache() {
        use crate::calendar::store::{CacheEntry, FeedCache, Store};
        use serde_json::json;

        let start = Local::now().to_rfc3339();
        let dir = tempfile::tempdir().unwrap();
        let cache = FeedCache::new(dir.path().join("feed.json"));
        cache
            .write(&CacheEntry {
                timestamp: chrono::Utc::now().timestamp_millis(),
                data: json!([{ "title": "Cached Fair", "start": start }]),
            })
            .unwrap();

        let calls = Rc::new(std::cell::Cell::new(0));
        let feed = CountingFeed {
            calls: calls.clone(),
            payload: json!([{ "title": "Live Fair", "start": start }]),
        };
        let every = Duration::from_secs(3600);
        let store = Store::new(feed, cache, every);
        let grid = FakeGrid {
            log: Log::new(),
            days: 31,
        };
        let (tx, rx) = watch::channel(Arc::from(Vec::new()));
        let refresher = Refresher::new(grid, Source::Feed(store), every, tx);

        refresher.refresh(false).await;
        assert_eq!(calls.get(), 0);
        assert_eq!(rx.borrow()[0].title, "Cached Fair");

        let _ = timeout(every * 2 + Duration::from_secs(1), refresher.run()).await;
        assert_eq!(calls.get(), 2);
        assert_eq!(rx.borrow()[0].title, "Live Fair");
    }
}
