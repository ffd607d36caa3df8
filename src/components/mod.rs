pub mod event_card;
pub mod month_view;
pub mod qr;
pub mod status_bar;

pub use event_card::CardOverlay;
pub use month_view::MonthView;
pub use status_bar::StatusBar;
