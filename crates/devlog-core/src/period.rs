use serde::{Deserialize, Serialize};
use time::{Date, Duration};

use crate::signal::{TOOL_DAILY_SUMMARY, TOOL_MONTHLY_SUMMARY, TOOL_WEEKLY_SUMMARY};

/// Rollup granularity, ordered finest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "day" | "daily" => Some(Self::Day),
            "week" | "weekly" => Some(Self::Week),
            "month" | "monthly" => Some(Self::Month),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Directory name under `summaries/`.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Day => "daily",
            Self::Week => "weekly",
            Self::Month => "monthly",
        }
    }

    /// Tool emitted when a rollup of this granularity is due.
    pub fn rollup_tool(self) -> &'static str {
        match self {
            Self::Day => TOOL_DAILY_SUMMARY,
            Self::Week => TOOL_WEEKLY_SUMMARY,
            Self::Month => TOOL_MONTHLY_SUMMARY,
        }
    }

    /// The period of this granularity containing `date`.
    pub fn period_of(self, date: Date) -> Period {
        let start = match self {
            Self::Day => date,
            Self::Week => date - Duration::days(i64::from(date.weekday().number_days_from_monday())),
            Self::Month => date - Duration::days(i64::from(date.day()) - 1),
        };
        Period {
            granularity: self,
            start,
        }
    }
}

/// A calendar period (day, ISO week, or month) identified by its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    granularity: Granularity,
    start: Date,
}

impl Period {
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn start(&self) -> Date {
        self.start
    }

    pub fn contains(&self, date: Date) -> bool {
        self.granularity.period_of(date) == *self
    }

    /// `2026-10-13`, `2026-W42`, or `2026-10`.
    pub fn key(&self) -> String {
        match self.granularity {
            Granularity::Day => format_date(self.start),
            Granularity::Week => {
                let (year, week, _) = self.start.to_iso_week_date();
                format!("{year:04}-W{week:02}")
            }
            Granularity::Month => {
                format!("{:04}-{:02}", self.start.year(), u8::from(self.start.month()))
            }
        }
    }
}

/// `YYYY-MM-DD`
pub fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Parse `YYYY-MM-DD`.
pub fn parse_date(s: &str) -> Option<Date> {
    Date::parse(s, time::macros::format_description!("[year]-[month]-[day]")).ok()
}
