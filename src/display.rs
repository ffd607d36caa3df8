use std::cell::{Ref, RefCell};
use std::rc::Rc;

use chrono::NaiveDate;
use color_eyre::eyre::{eyre, Result};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::app::{App, CardView};
use crate::calendar::Event;
use crate::components::qr;
use crate::scheduler::{CalendarGrid, EventCard};

/// Shared handle to the terminal display model.
///
/// The render loop reads it every frame and completes card transitions in
/// `tick`; the scheduler and the refresher drive it through the grid and
/// card traits.
#[derive(Clone)]
pub struct Display {
    app: Rc<RefCell<App>>,
    page_url: Rc<str>,
}

impl Display {
    pub fn new(app: App, page_url: &str) -> Self {
        Self {
            app: Rc::new(RefCell::new(app)),
            page_url: Rc::from(page_url),
        }
    }

    pub fn app(&self) -> Ref<'_, App> {
        self.app.borrow()
    }

    pub fn tick(&self) {
        self.app.borrow_mut().tick(Instant::now());
    }

    pub fn finish_loading(&self) {
        self.app.borrow_mut().loading = false;
    }
}

impl CalendarGrid for Display {
    fn set_title(&self, today: NaiveDate) {
        self.app.borrow_mut().set_title(today);
    }

    fn draw_grid(&self, today: NaiveDate) {
        self.app.borrow_mut().draw_grid(today);
    }

    fn highlight_days(&self, events: &[Event]) {
        self.app.borrow_mut().highlight(events);
    }

    fn has_day(&self, day: u32) -> bool {
        self.app.borrow().has_day(day)
    }

    fn set_pulse(&self, day: u32, on: bool) {
        self.app.borrow_mut().set_pulse(day, on);
    }
}

impl EventCard for Display {
    async fn open(&self, event: &Event) -> Result<()> {
        let link = event.link().unwrap_or(&*self.page_url).to_string();
        let qr = qr::render(&link)?;
        let (done, finished) = oneshot::channel();
        self.app.borrow_mut().begin_open(
            CardView {
                event: event.clone(),
                link,
                qr,
            },
            done,
            Instant::now(),
        );
        finished
            .await
            .map_err(|_| eyre!("card was reset before it finished opening"))
    }

    async fn close(&self) -> Result<()> {
        let (done, finished) = oneshot::channel();
        if !self.app.borrow_mut().begin_close(done, Instant::now()) {
            return Ok(());
        }
        finished
            .await
            .map_err(|_| eyre!("card was reset before it finished closing"))
    }

    fn force_closed(&self) {
        self.app.borrow_mut().force_closed();
    }
}
