use std::sync::Arc;

use chrono::{DateTime, Datelike, Local};

use super::Event;

/// Keep events whose start falls in the local month and year of `now`.
pub fn in_month(mut events: Vec<Event>, now: DateTime<Local>) -> Vec<Event> {
    events.retain(|e| e.start.year() == now.year() && e.start.month() == now.month());
    events
}

/// Holidays mark the grid but never get a card.
pub fn pop_ups(events: &[Event]) -> Arc<[Event]> {
    events.iter().filter(|e| !e.is_holiday()).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::normalize::normalize_feed;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn drops_other_months_and_years_in_order() {
        let now = Local.with_ymd_and_hms(2024, 11, 15, 9, 0, 0).unwrap();
        let events = normalize_feed(
            &json!([
                { "title": "a", "start": "2024-11-20T09:00:00" },
                { "title": "b", "start": "2024-10-31T09:00:00" },
                { "title": "c", "start": "2023-11-03T09:00:00" },
                { "title": "d", "start": "2024-11-01T00:00:00" },
                { "title": "e", "start": "2024-12-01T00:00:00" }
            ]),
            now,
        );
        let kept: Vec<String> = in_month(events, now).into_iter().map(|e| e.title).collect();
        assert_eq!(kept, ["a", "d"]);
    }

    #[test]
    fn pop_ups_skip_holidays() {
        let now = Local.with_ymd_and_hms(2024, 11, 15, 9, 0, 0).unwrap();
        let events = crate::calendar::normalize::normalize_csv(
            "Day,Title,Type\n5,Career Fair,event\n12,Winter Break,holiday\n",
            now,
        );
        let cards = pop_ups(&events);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].title, "Career Fair");
    }
}
