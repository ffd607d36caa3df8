use std::collections::HashMap;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde_json::Value;

use super::days_in_month;
use super::event::{Event, EventKind, NO_LINK, PLACEHOLDER_IMAGE};

/// Wide enough that html2text never wraps a blurb.
const STRIP_WIDTH: usize = 4096;

/// Epoch values below this are taken as seconds, at or above as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

type Candidates = &'static [&'static [&'static str]];

/// A source record that can be queried by key path, whatever its shape.
pub trait SourceRecord {
    /// Non-empty text at `path`, trimmed.
    fn text(&self, path: &[&str]) -> Option<String>;

    fn first(&self, candidates: &[&[&str]]) -> Option<String> {
        candidates.iter().find_map(|path| self.text(path))
    }
}

impl SourceRecord for Value {
    fn text(&self, path: &[&str]) -> Option<String> {
        let mut cur = self;
        for key in path {
            cur = cur.get(key)?;
        }
        match cur {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// One CSV data row keyed by lowercased header name.
#[derive(Debug, Clone, Default)]
pub struct CsvRow {
    cells: HashMap<String, String>,
}

impl SourceRecord for CsvRow {
    fn text(&self, path: &[&str]) -> Option<String> {
        let [key] = path else { return None };
        self.cells
            .get(&key.to_ascii_lowercase())
            .filter(|v| !v.is_empty())
            .cloned()
    }
}

/// Candidate key paths per output field, tried in order.
struct FieldMap {
    day: Candidates,
    title: Candidates,
    link: Candidates,
    start: Candidates,
    end: Candidates,
    date: Candidates,
    time: Candidates,
    location: Candidates,
    blurb: Candidates,
    image: Candidates,
    kind: Candidates,
    /// Whether the start instant carries a meaningful time of day.
    timed: bool,
}

const FEED_FIELDS: FieldMap = FieldMap {
    day: &[],
    title: &[&["title", "rendered"], &["title"], &["name"]],
    link: &[&["link"], &["url"], &["permalink"], &["registration"]],
    start: &[
        &["start"],
        &["start_date"],
        &["date"],
        &["startDate"],
        &["start_time"],
        &["datetime"],
        &["dateTime"],
    ],
    end: &[&["end"], &["end_date"], &["endDate"], &["end_time"]],
    date: &[],
    time: &[],
    location: &[&["location"], &["venue"], &["place"], &["room"]],
    blurb: &[
        &["excerpt", "rendered"],
        &["excerpt"],
        &["description"],
        &["content", "rendered"],
        &["content"],
        &["summary"],
    ],
    image: &[
        &["featured_image", "url"],
        &["image_url"],
        &["image"],
        &["thumbnail"],
        &["featuredImage"],
    ],
    kind: &[],
    timed: true,
};

const CSV_FIELDS: FieldMap = FieldMap {
    day: &[&["Day"]],
    title: &[&["Title"], &["Name"]],
    link: &[&["QR_Link"], &["Link"], &["URL"]],
    start: &[],
    end: &[],
    date: &[&["Date"]],
    time: &[&["Time"]],
    location: &[&["Location"]],
    blurb: &[&["Blurb"], &["Description"]],
    image: &[&["Image"], &["Image_URL"]],
    kind: &[&["Type"]],
    timed: false,
};

/// Normalize a JSON feed payload. Anything but an array yields no events.
pub fn normalize_feed(payload: &Value, now: DateTime<Local>) -> Vec<Event> {
    let Some(items) = payload.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| normalize_record(item, &FEED_FIELDS, idx, now))
        .collect()
}

/// Normalize CSV text. Rows whose `Day` is missing, outside 1..=31, or past
/// the last day of `now`'s month are dropped.
pub fn normalize_csv(text: &str, now: DateTime<Local>) -> Vec<Event> {
    let rows = parse_csv(text);
    let total = rows.len();
    let events: Vec<Event> = rows
        .iter()
        .enumerate()
        .filter_map(|(idx, row)| normalize_record(row, &CSV_FIELDS, idx, now))
        .collect();

    let rejected = total - events.len();
    if rejected > 0 {
        tracing::warn!(rejected, total, "skipped CSV rows with an invalid Day");
    }
    events
}

/// Split CSV text on newlines and bare commas. Quoting is not supported.
pub fn parse_csv(text: &str) -> Vec<CsvRow> {
    let mut lines = text
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty());

    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let headers: Vec<String> = header
        .split(',')
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_ascii_lowercase())
        .collect();

    lines
        .map(|line| CsvRow {
            cells: headers
                .iter()
                .cloned()
                .zip(line.split(',').map(|c| c.trim().to_string()))
                .collect(),
        })
        .collect()
}

fn normalize_record<R: SourceRecord>(
    record: &R,
    fields: &FieldMap,
    idx: usize,
    now: DateTime<Local>,
) -> Option<Event> {
    let (day, start) = if fields.day.is_empty() {
        let start = record
            .first(fields.start)
            .and_then(|raw| parse_when(&raw))
            .unwrap_or(now);
        (start.day(), start)
    } else {
        let day = record.first(fields.day).and_then(|raw| parse_day(&raw))?;
        (day, day_in_month(now, day)?)
    };
    let end = record.first(fields.end).and_then(|raw| parse_when(&raw));

    let time_label = record.first(fields.time).unwrap_or_else(|| {
        if fields.timed {
            time_range(start, end)
        } else {
            String::new()
        }
    });

    Some(Event {
        day,
        title: record
            .first(fields.title)
            .unwrap_or_else(|| format!("Event {}", idx + 1)),
        date_label: record
            .first(fields.date)
            .unwrap_or_else(|| start.format("%a, %b %-d").to_string()),
        time_label,
        location: record.first(fields.location).unwrap_or_default(),
        blurb: record
            .first(fields.blurb)
            .map(|raw| strip_html(&raw))
            .unwrap_or_default(),
        qr_link: record
            .first(fields.link)
            .unwrap_or_else(|| NO_LINK.to_string()),
        image_url: record
            .first(fields.image)
            .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
        kind: record
            .first(fields.kind)
            .map(|raw| EventKind::parse(&raw))
            .unwrap_or(EventKind::Event),
        start,
    })
}

fn parse_day(raw: &str) -> Option<u32> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|d| (1..=31).contains(d))
}

/// Midnight of `day` in the month of `now`. `None` when the month has no such day.
fn day_in_month(now: DateTime<Local>, day: u32) -> Option<DateTime<Local>> {
    if day > days_in_month(now.year(), now.month()) {
        return None;
    }
    let midnight = NaiveDate::from_ymd_opt(now.year(), now.month(), day)?.and_hms_opt(0, 0, 0)?;
    Some(Local.from_local_datetime(&midnight).earliest().unwrap_or(now))
}

/// Parse ISO-8601, RFC 2822, epoch numbers, and `YYYY-MM-DD hh:mm[:ss]`.
pub fn parse_when(raw: &str) -> Option<DateTime<Local>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(n) = raw.parse::<i64>() {
        let millis = if n.abs() < EPOCH_MILLIS_THRESHOLD {
            n.checked_mul(1000)?
        } else {
            n
        };
        return Local.timestamp_millis_opt(millis).single();
    }

    let iso = if raw.len() > 10 && raw.as_bytes()[10] == b' ' {
        raw.replacen(' ', "T", 1)
    } else {
        raw.to_string()
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&iso) {
        return Some(dt.with_timezone(&Local));
    }
    if let Ok(dt) = DateTime::parse_from_str(&iso, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Local));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&iso, fmt) {
            return Local.from_local_datetime(&naive).earliest();
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Local
            .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
            .earliest();
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Local));
    }
    None
}

pub fn time_range(start: DateTime<Local>, end: Option<DateTime<Local>>) -> String {
    let fmt = "%-I:%M %p";
    match end {
        Some(end) => format!("{} \u{2013} {}", start.format(fmt), end.format(fmt)),
        None => start.format(fmt).to_string(),
    }
}

/// Reduce an HTML fragment to plain text: tags dropped, entities decoded.
pub fn strip_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let text = html2text::config::plain_no_decorate()
        .string_from_read(html.as_bytes(), STRIP_WIDTH)
        .unwrap_or_else(|_| html.to_string());
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
