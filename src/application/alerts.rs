//! Alert prioritizer: classifies normalized timeline items into
//! severity tiers and orders them deterministically.
//!
//! "Now" is injected by the caller, never read from a global clock, so
//! two calls with identical inputs produce identical output.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::{AlertItem, RankedAlerts, Severity, SeverityCounts, TimelineItem};
use crate::ports::RecordStore;
use crate::Result;

use super::timeline::TimelineService;

/// Rank alert-eligible items: filter to dated items, compute signed
/// whole-day counts, classify, and sort most-overdue / soonest first.
///
/// Ties break by category triage rank, then record id, for determinism.
/// Malformed items (missing id or label) are logged and skipped; this
/// function never panics on bad records.
#[must_use]
pub fn prioritize(items: &[TimelineItem], now: NaiveDate) -> RankedAlerts {
    let mut alerts: Vec<AlertItem> = items
        .iter()
        .filter_map(|item| {
            let due_date = item.due_date?;
            if item.record_id.is_empty() || item.label.is_empty() {
                tracing::warn!(
                    "Skipping malformed {} record '{}' during prioritization",
                    item.category,
                    item.record_id
                );
                return None;
            }

            let days_remaining = (due_date - now).num_days();
            let severity = Severity::classify(days_remaining, item.urgent);

            Some(AlertItem {
                id: item.record_id.clone(),
                category: item.category,
                title: item.label.clone(),
                description: describe(days_remaining),
                due_date,
                days_remaining,
                severity,
                action_label: item.action_label.clone(),
                action_target: item.action_target.clone(),
            })
        })
        .collect();

    alerts.sort_by(|a, b| {
        a.days_remaining
            .cmp(&b.days_remaining)
            .then_with(|| a.category.triage_rank().cmp(&b.category.triage_rank()))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut counts = SeverityCounts::default();
    for alert in &alerts {
        match alert.severity {
            Severity::High => counts.high += 1,
            Severity::Medium => counts.medium += 1,
            Severity::Low => counts.low += 1,
        }
    }

    RankedAlerts {
        items: alerts,
        counts,
    }
}

fn describe(days_remaining: i64) -> String {
    match days_remaining {
        d if d < 0 => format!("Overdue by {} days", -d),
        0 => "Due today".to_string(),
        1 => "Due tomorrow".to_string(),
        d => format!("Due in {d} days"),
    }
}

/// Service powering the owner dashboard's priority alerts.
pub struct AlertService<R: RecordStore> {
    timeline: TimelineService<R>,
}

impl<R: RecordStore> AlertService<R> {
    /// Create a new alert service.
    pub fn new(records: Arc<R>) -> Self {
        Self {
            timeline: TimelineService::new(records),
        }
    }

    /// Aggregate the entity's records and rank the resulting alerts.
    ///
    /// # Errors
    /// Returns [`crate::PawvaultError::Aggregation`] if any source
    /// fetch fails.
    pub async fn alerts(&self, entity_id: &str, now: NaiveDate) -> Result<RankedAlerts> {
        let timeline = self.timeline.aggregate(entity_id).await?;
        Ok(prioritize(&timeline.items, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RecordCategory;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("Should build date")
    }

    fn item(id: &str, category: RecordCategory, due: Option<NaiveDate>) -> TimelineItem {
        TimelineItem {
            record_id: id.to_string(),
            entity_id: "pet-1".to_string(),
            category,
            label: format!("Item {id}"),
            due_date: due,
            occurred_on: None,
            urgent: false,
            action_label: "Act".to_string(),
            action_target: format!("/records/{id}"),
        }
    }

    #[test]
    fn test_ordering_and_classification() {
        let now = date(2026, 3, 10);
        // days_remaining: -2, 0, 3, 10
        let items = vec![
            item("d", RecordCategory::Medication, Some(date(2026, 3, 20))),
            item("b", RecordCategory::Vaccination, Some(date(2026, 3, 10))),
            item("c", RecordCategory::Vaccination, Some(date(2026, 3, 13))),
            item("a", RecordCategory::Vaccination, Some(date(2026, 3, 8))),
        ];

        let ranked = prioritize(&items, now);
        let days: Vec<i64> = ranked.items.iter().map(|a| a.days_remaining).collect();
        assert_eq!(days, vec![-2, 0, 3, 10]);

        assert_eq!(ranked.items[0].severity, Severity::High);
        assert_eq!(ranked.items[1].severity, Severity::High);
        assert_eq!(ranked.items[2].severity, Severity::Medium);
        assert_eq!(ranked.items[3].severity, Severity::Low);
        assert_eq!(
            ranked.counts,
            SeverityCounts {
                high: 2,
                medium: 1,
                low: 1
            }
        );
    }

    #[test]
    fn test_ties_break_by_category_then_id() {
        let now = date(2026, 3, 10);
        let due = Some(date(2026, 3, 12));
        let items = vec![
            item("z", RecordCategory::Medication, due),
            item("m", RecordCategory::Visit, due),
            item("b", RecordCategory::Vaccination, due),
            item("a", RecordCategory::Medication, due),
        ];

        let ranked = prioritize(&items, now);
        let ids: Vec<&str> = ranked.items.iter().map(|a| a.id.as_str()).collect();
        // Visit > vaccination > medication, then id.
        assert_eq!(ids, vec!["m", "b", "a", "z"]);
    }

    #[test]
    fn test_undated_items_are_filtered() {
        let now = date(2026, 3, 10);
        let items = vec![
            item("weight", RecordCategory::Weight, None),
            item("vax", RecordCategory::Vaccination, Some(date(2026, 3, 11))),
        ];

        let ranked = prioritize(&items, now);
        assert_eq!(ranked.items.len(), 1);
        assert_eq!(ranked.items[0].id, "vax");
    }

    #[test]
    fn test_malformed_items_are_skipped_not_fatal() {
        let now = date(2026, 3, 10);
        let mut bad = item("", RecordCategory::Vaccination, Some(date(2026, 3, 11)));
        bad.label = String::new();
        let items = vec![bad, item("ok", RecordCategory::Vaccination, Some(now))];

        let ranked = prioritize(&items, now);
        assert_eq!(ranked.items.len(), 1);
        assert_eq!(ranked.items[0].id, "ok");
    }

    #[test]
    fn test_determinism() {
        let now = date(2026, 3, 10);
        let items = vec![
            item("a", RecordCategory::Vaccination, Some(date(2026, 3, 15))),
            item("b", RecordCategory::Medication, Some(date(2026, 3, 9))),
        ];

        let first = prioritize(&items, now);
        let second = prioritize(&items, now);
        let ids = |r: &RankedAlerts| {
            r.items
                .iter()
                .map(|a| (a.id.clone(), a.severity, a.days_remaining))
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&first), ids(&second));
    }
}
