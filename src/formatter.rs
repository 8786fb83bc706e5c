use crate::record::LogRecord;
use chrono::SecondsFormat;

/// Turns a [`LogRecord`] into the text stored by sinks that keep a single
/// rendered message (the database `content` column).
pub trait Formatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> String;
}

/// Template-based formatter.
///
/// Supported placeholders: `%date%`, `%level%`, `%message%`. Context values
/// are substituted for `%key%` placeholders whose key is present in the
/// record context; unknown placeholders are left untouched.
#[derive(Debug, Clone)]
pub struct LineFormatter {
    template: String,
}

impl LineFormatter {
    pub const DEFAULT_TEMPLATE: &'static str = "[%date%][%level%] %message%";

    pub fn new(template: impl Into<String>) -> Self {
        LineFormatter {
            template: template.into(),
        }
    }
}

impl Default for LineFormatter {
    fn default() -> Self {
        LineFormatter::new(Self::DEFAULT_TEMPLATE)
    }
}

impl LineFormatter {
    fn placeholder(&self, record: &LogRecord, key: &str) -> Option<String> {
        match key {
            "date" => Some(record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, false)),
            "level" => Some(record.level_name.clone()),
            "message" => Some(record.message.clone()),
            _ => record.context.get(key).map(|value| match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        }
    }
}

impl Formatter for LineFormatter {
    /// Substituted values are copied as-is and never scanned for further
    /// placeholders.
    fn format(&self, record: &LogRecord) -> String {
        let mut out = String::with_capacity(self.template.len() + record.message.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find('%') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let Some(end) = after.find('%') else {
                out.push_str(&rest[start..]);
                return out;
            };
            match self.placeholder(record, &after[..end]) {
                Some(value) => {
                    out.push_str(&value);
                    rest = &after[end + 1..];
                }
                // The closing `%` may open the next placeholder.
                None => {
                    out.push('%');
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Level;
    use chrono::{TimeZone, Utc};

    #[test]
    fn default_template_renders_date_level_and_message() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let record = LogRecord::at(Level::Error, "Error message #1", ts);

        assert_eq!(
            LineFormatter::default().format(&record),
            "[2024-01-02T03:04:05+00:00][ERROR] Error message #1"
        );
    }

    #[test]
    fn context_placeholders_are_interpolated() {
        let record = LogRecord::new(Level::Info, "login")
            .with_context("user", "alice")
            .with_context("attempt", 3);
        let formatter = LineFormatter::new("%message% user=%user% attempt=%attempt% %missing%");

        assert_eq!(formatter.format(&record), "login user=alice attempt=3 %missing%");
    }

    #[test]
    fn message_text_is_not_interpolated() {
        let record = LogRecord::new(Level::Warning, "literal %user% and %level%").with_context("user", "alice");
        let formatter = LineFormatter::new("%level%: %message% (%user%)");

        assert_eq!(formatter.format(&record), "WARNING: literal %user% and %level% (alice)");
    }

    #[test]
    fn context_values_are_not_interpolated() {
        let record = LogRecord::new(Level::Info, "login").with_context("user", "%message%");
        let formatter = LineFormatter::new("%user% 100% done");

        assert_eq!(formatter.format(&record), "%message% 100% done");
    }
}
