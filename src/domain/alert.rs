//! Alert types and severity policy.
//!
//! Severity thresholds and the display cap are named constants so tests
//! and callers assert against the same source of truth.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::record::RecordCategory;

/// Items due in `days_remaining <= OVERDUE_DAYS_MAX` are overdue: High.
pub const OVERDUE_DAYS_MAX: i64 = 0;

/// Items due within `OVERDUE_DAYS_MAX < days <= DUE_SOON_DAYS_MAX`: Medium.
pub const DUE_SOON_DAYS_MAX: i64 = 7;

/// Default number of alerts shown on the owner dashboard.
pub const DEFAULT_ALERT_CAP: usize = 5;

/// Severity tier of a due or overdue health item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Overdue or medically urgent
    High,
    /// Due within the week
    Medium,
    /// Due later
    Low,
}

impl Severity {
    /// Classify from a signed day count and the medically-urgent flag.
    ///
    /// Pure: identical inputs yield identical tiers.
    #[must_use]
    pub const fn classify(days_remaining: i64, urgent: bool) -> Self {
        if urgent || days_remaining <= OVERDUE_DAYS_MAX {
            Self::High
        } else if days_remaining <= DUE_SOON_DAYS_MAX {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Get a human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::High => "Overdue or urgent - act now",
            Self::Medium => "Due soon - schedule this week",
            Self::Low => "Upcoming - no action needed yet",
        }
    }

    /// Get the associated display color (RGB).
    #[must_use]
    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            Self::High => (244, 63, 94),    // Rose (#F43F5E)
            Self::Medium => (251, 191, 36), // Amber (#FBBF24)
            Self::Low => (16, 185, 129),    // Emerald (#10B981)
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "HIGH"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

/// A derived alert. Never persisted; `id` is the source record id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertItem {
    pub id: String,
    pub category: RecordCategory,
    pub title: String,
    pub description: String,
    pub due_date: NaiveDate,
    /// Signed whole days until due; negative means overdue.
    pub days_remaining: i64,
    pub severity: Severity,
    pub action_label: String,
    pub action_target: String,
}

/// Per-tier alert counts for dashboard badges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

/// The full prioritized alert list plus severity counts.
///
/// The display cap is applied by `top`; the full sorted list stays
/// queryable so callers can show counts beyond the cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedAlerts {
    /// All alerts, sorted most-overdue / soonest first.
    pub items: Vec<AlertItem>,
    pub counts: SeverityCounts,
}

impl RankedAlerts {
    /// The top `n` alerts for display.
    #[must_use]
    pub fn top(&self, n: usize) -> &[AlertItem] {
        &self.items[..self.items.len().min(n)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_against_policy_constants() {
        assert_eq!(Severity::classify(-2, false), Severity::High);
        assert_eq!(Severity::classify(OVERDUE_DAYS_MAX, false), Severity::High);
        assert_eq!(
            Severity::classify(OVERDUE_DAYS_MAX + 1, false),
            Severity::Medium
        );
        assert_eq!(Severity::classify(DUE_SOON_DAYS_MAX, false), Severity::Medium);
        assert_eq!(
            Severity::classify(DUE_SOON_DAYS_MAX + 1, false),
            Severity::Low
        );
    }

    #[test]
    fn test_urgent_overrides_day_count() {
        assert_eq!(Severity::classify(60, true), Severity::High);
    }

    #[test]
    fn test_top_caps_without_losing_items() {
        let alert = |id: &str| AlertItem {
            id: id.to_string(),
            category: RecordCategory::Vaccination,
            title: "Rabies booster".to_string(),
            description: String::new(),
            due_date: NaiveDate::from_ymd_opt(2026, 3, 1).expect("Should build date"),
            days_remaining: 3,
            severity: Severity::Medium,
            action_label: "Book booster".to_string(),
            action_target: "/records/vaccinations/a".to_string(),
        };
        let ranked = RankedAlerts {
            items: vec![alert("a"), alert("b"), alert("c")],
            counts: SeverityCounts {
                medium: 3,
                ..SeverityCounts::default()
            },
        };
        assert_eq!(ranked.top(2).len(), 2);
        assert_eq!(ranked.items.len(), 3);
        assert_eq!(ranked.top(10).len(), 3);
        assert_eq!(ranked.counts.total(), 3);
    }
}
