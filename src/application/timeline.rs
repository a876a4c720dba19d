//! Temporal aggregator: fan-out fetch of the four record categories,
//! normalized into one timeline with resolved due dates.
//!
//! Aggregation is all-or-nothing: if any source fetch fails, the whole
//! aggregation fails with a typed error naming the source. This is a
//! deliberate trade-off; a best-effort partial aggregation with
//! per-source error flags was considered and not taken, so callers can
//! trust that a timeline is always complete.

use std::future::Future;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::{
    rules, EntityProfile, MedicationRecord, RecordCategory, TimelineItem, VaccinationRecord,
    VisitRecord, WeightRecord,
};
use crate::ports::RecordStore;
use crate::{PawvaultError, Result};

/// An entity's aggregated record: the normalized timeline plus the
/// typed per-category lists it was derived from.
#[derive(Debug, Clone)]
pub struct Timeline {
    pub entity_id: String,
    /// Normalized items, most recent activity first.
    pub items: Vec<TimelineItem>,
    pub vaccinations: Vec<VaccinationRecord>,
    pub medications: Vec<MedicationRecord>,
    pub visits: Vec<VisitRecord>,
    pub weights: Vec<WeightRecord>,
}

/// Service aggregating an entity's health records into one timeline.
pub struct TimelineService<R: RecordStore> {
    records: Arc<R>,
}

impl<R: RecordStore> Clone for TimelineService<R> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

/// Await one source fetch, tagging any failure with its source name.
async fn fetch<T, E, F>(source_name: &'static str, future: F) -> Result<T>
where
    E: std::error::Error,
    F: Future<Output = std::result::Result<T, E>>,
{
    future.await.map_err(|e| {
        tracing::warn!("Source '{source_name}' failed during aggregation: {e}");
        PawvaultError::Aggregation {
            source_name,
            detail: e.to_string(),
        }
    })
}

impl<R: RecordStore> TimelineService<R> {
    /// Create a new timeline service.
    pub fn new(records: Arc<R>) -> Self {
        Self { records }
    }

    /// Fetch all four categories concurrently and normalize them.
    ///
    /// # Errors
    /// Returns [`PawvaultError::Aggregation`] if any source fetch fails.
    pub async fn aggregate(&self, entity_id: &str) -> Result<Timeline> {
        let (vaccinations, medications, visits, weights) = tokio::try_join!(
            fetch("vaccination", self.records.list_vaccinations(entity_id)),
            fetch("medication", self.records.list_medications(entity_id)),
            fetch("visit", self.records.list_visits(entity_id)),
            fetch("weight", self.records.list_weights(entity_id)),
        )?;

        let mut items: Vec<TimelineItem> = vaccinations
            .iter()
            .map(normalize_vaccination)
            .chain(medications.iter().map(normalize_medication))
            .chain(visits.iter().map(normalize_visit))
            .chain(weights.iter().map(normalize_weight))
            .collect();

        // Most recent activity first; undated items sink to the end.
        items.sort_by_key(|item| std::cmp::Reverse(item.occurred_on.or(item.due_date)));

        tracing::debug!(
            "Aggregated {} timeline items for entity {entity_id}",
            items.len()
        );

        Ok(Timeline {
            entity_id: entity_id.to_string(),
            items,
            vaccinations,
            medications,
            visits,
            weights,
        })
    }

    /// Fetch the entity's non-temporal profile.
    ///
    /// # Errors
    /// Returns error if the fetch fails.
    pub async fn profile(&self, entity_id: &str) -> Result<Option<EntityProfile>> {
        fetch("profile", self.records.profile(entity_id)).await
    }
}

fn normalize_vaccination(record: &VaccinationRecord) -> TimelineItem {
    TimelineItem {
        record_id: record.record_id.clone(),
        entity_id: record.entity_id.clone(),
        category: RecordCategory::Vaccination,
        label: record.vaccine.clone(),
        due_date: record.next_due_date,
        occurred_on: record.administered_on,
        urgent: false,
        action_label: "Book booster".to_string(),
        action_target: format!("/records/vaccinations/{}", record.record_id),
    }
}

/// Derive the refill due date. A course whose `end_date` precedes the
/// next refill is finished and never alerts; a malformed interval is
/// logged and treated as non-alerting rather than failing aggregation.
fn medication_due_date(record: &MedicationRecord) -> Option<NaiveDate> {
    let start = record.start_date?;
    let every_n_days = record.refill_every_days?;

    let refill = match rules::next_refill_date(start, every_n_days) {
        Ok(refill) => refill,
        Err(e) => {
            tracing::warn!(
                "Medication {} has malformed refill interval: {e}",
                record.record_id
            );
            return None;
        }
    };

    match record.end_date {
        Some(end) if end < refill => None,
        _ => Some(refill),
    }
}

fn normalize_medication(record: &MedicationRecord) -> TimelineItem {
    TimelineItem {
        record_id: record.record_id.clone(),
        entity_id: record.entity_id.clone(),
        category: RecordCategory::Medication,
        label: record.name.clone(),
        due_date: medication_due_date(record),
        occurred_on: record.start_date,
        urgent: false,
        action_label: "Refill medication".to_string(),
        action_target: format!("/records/medications/{}", record.record_id),
    }
}

fn normalize_visit(record: &VisitRecord) -> TimelineItem {
    let follow_up = record.follow_up_date;
    TimelineItem {
        record_id: record.record_id.clone(),
        entity_id: record.entity_id.clone(),
        category: RecordCategory::Visit,
        label: record.reason.clone(),
        due_date: follow_up,
        occurred_on: Some(record.visit_date),
        // Vet-ordered follow-ups are medically urgent by policy.
        urgent: follow_up.is_some(),
        action_label: if follow_up.is_some() {
            "Schedule follow-up".to_string()
        } else {
            "View visit".to_string()
        },
        action_target: format!("/records/visits/{}", record.record_id),
    }
}

fn normalize_weight(record: &WeightRecord) -> TimelineItem {
    TimelineItem {
        record_id: record.record_id.clone(),
        entity_id: record.entity_id.clone(),
        category: RecordCategory::Weight,
        label: format!("Weight {} {}", record.value, record.unit.as_str()),
        // Weight readings never alert by themselves.
        due_date: None,
        occurred_on: Some(record.recorded_on),
        urgent: false,
        action_label: "View weight".to_string(),
        action_target: format!("/records/weights/{}", record.record_id),
    }
}
