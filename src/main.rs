mod app;
mod calendar;
mod components;
mod config;
mod display;
mod logging;
mod scheduler;
mod theme;
mod tui;

use std::sync::Arc;

use app::App;
use chrono::Local;
use color_eyre::Result;
use config::KioskConfig;
use display::Display;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::Line;
use ratatui::widgets::Paragraph;
use scheduler::{CalendarGrid, EventCard, Refresher, Scheduler};
use tokio::sync::watch;
use tokio::time::sleep;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let log_path = logging::init()?;

    let config = KioskConfig::load().unwrap_or_else(|err| {
        tracing::warn!("falling back to built-in configuration: {err:#}");
        KioskConfig::default()
    });
    theme::install(&config.display.theme);
    tracing::info!(log = ?log_path, source = ?config.source, "calendar kiosk starting");

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = tui::restore();
        original_hook(panic_info);
    }));

    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &config).await;
    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, config: &KioskConfig) -> Result<()> {
    let today = Local::now().date_naive();
    let display = Display::new(
        App::new(&config.display.heading, today, config.timings.card_fade()),
        &config.display.page_url,
    );
    display.force_closed();
    display.set_title(today);
    display.draw_grid(today);

    let timings = config.timings.scheduler();
    let (updates, cards) = watch::channel(Arc::from(Vec::new()));
    let refresher = Refresher::new(
        display.clone(),
        config.source()?,
        timings.refresh_every,
        updates,
    );

    let kiosk = async {
        tokio::join!(refresher.refresh(false), sleep(config.timings.loader()));
        display.finish_loading();

        let scheduler = Scheduler::new(display.clone(), display.clone(), timings, cards);
        tokio::join!(scheduler.run(), refresher.run());
    };

    tokio::select! {
        result = render_loop(terminal, &display, config) => result,
        _ = kiosk => Ok(()),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, shutting down");
            Ok(())
        }
    }
}

async fn render_loop(terminal: &mut tui::Tui, display: &Display, config: &KioskConfig) -> Result<()> {
    let frame_every = config.timings.frame();
    loop {
        display.tick();
        {
            let app = display.app();
            if let Err(err) =
                terminal.draw(|frame| render(frame, &app, &config.display.org_name))
            {
                tracing::error!("failed to draw frame: {err}");
            }
        }
        sleep(frame_every).await;
    }
}

fn render(frame: &mut ratatui::Frame, app: &App, org_name: &str) {
    let area = frame.area();
    if app.loading {
        render_loader(frame, area, app);
        return;
    }

    let layout = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(area);
    components::MonthView::render(frame, layout[0], app);
    components::CardOverlay::render(frame, layout[0], app, org_name);
    components::StatusBar::render(frame, layout[1], app);
}

fn render_loader(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let theme = theme::current();
    let [_, middle, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(2),
        Constraint::Fill(1),
    ])
    .areas(area);

    let lines = vec![
        Line::styled(app.title.clone(), theme.header).centered(),
        Line::styled("Loading events\u{2026}", theme.dim).centered(),
    ];
    frame.render_widget(Paragraph::new(lines), middle);
}
