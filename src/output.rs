//! Terminal output helpers shared by the CLI commands.
//!
//! Command results go to **stdout**; diagnostics go through `tracing` to
//! stderr, so stdout stays parseable for scripts. `--json` switches every
//! command to one JSON document on stdout.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::io::Write;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn stdout_is_tty() -> bool {
    atty::is(atty::Stream::Stdout)
}

/// Prints a streamed answer whose frames each carry the full text so far.
///
/// When the new text extends what is already on screen only the new suffix
/// is written; otherwise the answer is restarted on a fresh line. With
/// `live = false` nothing is printed until [`finish`](Self::finish).
pub struct StreamPrinter<W: Write> {
    out: W,
    live: bool,
    shown: String,
}

impl<W: Write> StreamPrinter<W> {
    pub fn new(out: W, live: bool) -> Self {
        Self {
            out,
            live,
            shown: String::new(),
        }
    }

    pub fn update(&mut self, text: &str) -> std::io::Result<()> {
        if !self.live || text.is_empty() || text == self.shown {
            return Ok(());
        }
        match text.strip_prefix(self.shown.as_str()) {
            Some(suffix) => self.out.write_all(suffix.as_bytes())?,
            None => {
                self.out.write_all(b"\n")?;
                self.out.write_all(text.as_bytes())?;
            }
        }
        self.out.flush()?;
        self.shown = text.to_string();
        Ok(())
    }

    /// Writes whatever part of the final answer is not on screen yet and
    /// ends the line.
    pub fn finish(&mut self, text: &str) -> std::io::Result<()> {
        if self.live {
            self.update(text)?;
        } else {
            self.out.write_all(text.as_bytes())?;
        }
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.shown.clear();
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Parses the backend's timestamps: RFC 3339, or naive ISO 8601 /
/// `YYYY-MM-DD HH:MM:SS` taken as UTC.
pub fn parse_backend_ts(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Format a timestamp relative to `now` (e.g. "3 hours ago").
pub fn format_relative(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = (now - ts).num_seconds();

    if delta < 0 {
        return ts.format("%Y-%m-%d %H:%M").to_string();
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        ts.format("%Y-%m-%d %H:%M").to_string()
    }
}

/// Shortens `text` to at most `max` characters, marking the cut with `…`.
pub fn truncate(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn relative_times() {
        let now = Utc::now();
        assert_eq!(format_relative(now - Duration::seconds(10), now), "just now");
        assert_eq!(format_relative(now - Duration::minutes(1), now), "1 min ago");
        assert_eq!(format_relative(now - Duration::hours(3), now), "3 hours ago");
        assert_eq!(format_relative(now - Duration::days(2), now), "2 days ago");
    }

    #[test]
    fn backend_timestamps() {
        assert!(parse_backend_ts("2024-11-02T10:11:12.123456").is_some());
        assert!(parse_backend_ts("2024-11-02T10:11:12+00:00").is_some());
        assert!(parse_backend_ts("2024-11-02 10:11:12").is_some());
        assert!(parse_backend_ts("yesterday").is_none());
    }

    #[test]
    fn truncate_flattens_and_cuts() {
        assert_eq!(truncate("a\n b", 10), "a b");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn stream_printer_writes_suffixes() {
        let mut printer = StreamPrinter::new(Vec::new(), true);
        printer.update("He").unwrap();
        printer.update("Hello").unwrap();
        printer.update("").unwrap();
        printer.finish("Hello world").unwrap();
        assert_eq!(String::from_utf8(printer.into_inner()).unwrap(), "Hello world\n");
    }

    #[test]
    fn stream_printer_restarts_on_rewrite() {
        let mut printer = StreamPrinter::new(Vec::new(), true);
        printer.update("Hello").unwrap();
        printer.update("Goodbye").unwrap();
        printer.finish("Goodbye").unwrap();
        assert_eq!(
            String::from_utf8(printer.into_inner()).unwrap(),
            "Hello\nGoodbye\n"
        );
    }

    #[test]
    fn stream_printer_quiet_mode_prints_final_only() {
        let mut printer = StreamPrinter::new(Vec::new(), false);
        printer.update("He").unwrap();
        printer.finish("Hello").unwrap();
        assert_eq!(String::from_utf8(printer.into_inner()).unwrap(), "Hello\n");
    }
}
