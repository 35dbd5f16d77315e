//! iCalendar export of course materials.

use chrono::{DateTime, Utc};

use crate::models::{course, material};

const PRODID: &str = "-//Courpera//Course Calendar//EN";

/// Escape a TEXT value (RFC 5545 §3.3.11)
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}

pub fn format_utc(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Render a VCALENDAR with one VEVENT per material, CRLF-terminated
pub fn course_calendar(
    course: &course::Model,
    materials: &[material::Model],
    now: DateTime<Utc>,
) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{}", PRODID),
        format!("X-WR-CALNAME:{}", escape_text(&course.title)),
    ];

    let stamp = format_utc(now);
    for m in materials {
        lines.push("BEGIN:VEVENT".to_string());
        lines.push(format!("UID:material-{}@courpera", m.id));
        lines.push(format!("DTSTAMP:{}", stamp));
        lines.push(format!("DTSTART:{}", format_utc(m.created_at)));
        lines.push(format!(
            "SUMMARY:{}",
            escape_text(&format!("{}: {}", course.title, m.title))
        ));
        lines.push("END:VEVENT".to_string());
    }
    lines.push("END:VCALENDAR".to_string());

    let mut body = lines.join("\r\n");
    body.push_str("\r\n");
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn course() -> course::Model {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        course::Model {
            id: 3,
            owner_id: 1,
            title: "Intro; Rust, 101".to_string(),
            description: String::new(),
            created_at: at,
            updated_at: at,
        }
    }

    fn material(id: i64, title: &str) -> material::Model {
        material::Model {
            id,
            course_id: 3,
            uploaded_by: Some(1),
            title: title.to_string(),
            file: format!("materials/{}.pdf", id),
            size_bytes: 10,
            mime: "application/pdf".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 2, 10, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a,b;c\\d\ne"), "a\\,b\\;c\\\\d\\ne");
    }

    #[test]
    fn test_calendar_structure() {
        let now = Utc.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap();
        let ics = course_calendar(&course(), &[material(7, "Week 1")], now);

        assert!(ics.starts_with("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n"));
        assert!(ics.contains("PRODID:-//Courpera//Course Calendar//EN\r\n"));
        assert!(ics.contains("X-WR-CALNAME:Intro\\; Rust\\, 101\r\n"));
        assert!(ics.contains("UID:material-7@courpera\r\n"));
        assert!(ics.contains("DTSTAMP:20250401T120000Z\r\n"));
        assert!(ics.contains("DTSTART:20250302T103000Z\r\n"));
        assert!(ics.contains("SUMMARY:Intro\\; Rust\\, 101: Week 1\r\n"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
        assert!(!ics.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_calendar_without_materials_has_no_events() {
        let ics = course_calendar(&course(), &[], Utc::now());
        assert!(!ics.contains("BEGIN:VEVENT"));
    }
}
