//! Disclosure token service: issue, resolve, list, and revoke scoped
//! share tokens, and build the permission-filtered disclosed view.
//!
//! `resolve` deliberately collapses unknown, revoked, and expired
//! tokens into one `NotFound` so the public surface never leaks which
//! failure occurred.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::adapters::StorageError;
use crate::domain::{
    rules, DisclosedView, EntityProfile, IdentificationSection, MedicalSection, PhysicalSection,
    SharePermissions, ShareToken, TimelineSection, TOKEN_MINT_RETRIES,
};
use crate::ports::{RecordStore, ShareStore, ShareTokenPatch};
use crate::{PawvaultError, Result};

use super::alerts::prioritize;
use super::timeline::{Timeline, TimelineService};

/// Service managing the disclosure token lifecycle.
///
/// The caller is responsible for owner authorization: `generate`,
/// `list_active`, and `revoke` must only be invoked with an entity the
/// requesting owner is already known to own.
pub struct ShareService<R, S>
where
    R: RecordStore,
    S: ShareStore,
{
    timeline: TimelineService<R>,
    shares: Arc<S>,
}

impl<R, S> ShareService<R, S>
where
    R: RecordStore,
    S: ShareStore,
    S::Error: Into<StorageError>,
{
    /// Create a new share service.
    pub fn new(records: Arc<R>, shares: Arc<S>) -> Self {
        Self {
            timeline: TimelineService::new(records),
            shares,
        }
    }

    /// Mint and persist a new share token for an entity.
    ///
    /// Insertion is all-or-nothing: a failed insert leaves nothing
    /// resolvable. A token-uniqueness collision is retried with a fresh
    /// token up to [`TOKEN_MINT_RETRIES`] times before surfacing.
    ///
    /// # Errors
    /// Returns [`PawvaultError::Conflict`] when retries are exhausted,
    /// or a storage error for any other failure.
    pub async fn generate(
        &self,
        entity_id: &str,
        permissions: SharePermissions,
    ) -> Result<ShareToken> {
        if !permissions.any() {
            tracing::warn!("Generating a share for {entity_id} that discloses nothing");
        }

        for attempt in 1..=TOKEN_MINT_RETRIES {
            let token = ShareToken::mint(entity_id, permissions, Utc::now());

            match self.shares.insert(&token).await {
                Ok(()) => {
                    tracing::info!(
                        "Generated share {} for entity {entity_id} (expires {})",
                        token.id,
                        token.expires_at
                    );
                    return Ok(token);
                }
                Err(e) => {
                    let storage_error: StorageError = e.into();
                    if matches!(storage_error, StorageError::Conflict(_)) {
                        tracing::warn!(
                            "Token collision on attempt {attempt} for entity {entity_id}, re-minting"
                        );
                        continue;
                    }
                    return Err(storage_error.into());
                }
            }
        }

        Err(PawvaultError::Conflict(TOKEN_MINT_RETRIES))
    }

    /// Redeem a bearer token into a disclosed view.
    ///
    /// Unknown, revoked, and expired tokens all return the same
    /// [`PawvaultError::NotFound`] with no distinguishing detail. On
    /// success the access counter is bumped best-effort: a lost
    /// increment is logged, a lost disclosure is not acceptable.
    ///
    /// # Errors
    /// `NotFound` for any unredeemable token; aggregation or storage
    /// errors if assembling the view fails.
    pub async fn resolve(&self, token: &str, now: DateTime<Utc>) -> Result<DisclosedView> {
        let stored = self
            .shares
            .find_by_token(token)
            .await
            .map_err(|e| PawvaultError::Storage(e.into()))?
            .ok_or(PawvaultError::NotFound)?;

        if !stored.is_resolvable(now) {
            return Err(PawvaultError::NotFound);
        }

        let patch = ShareTokenPatch {
            active: None,
            increment_access: true,
        };
        if let Err(e) = self.shares.update(&stored.id, patch).await {
            let storage_error: StorageError = e.into();
            tracing::warn!(
                "Failed to bump access count for share {}: {storage_error}",
                stored.id
            );
        }

        let profile = self
            .timeline
            .profile(&stored.entity_id)
            .await?
            .ok_or(PawvaultError::NotFound)?;
        let timeline = self.timeline.aggregate(&stored.entity_id).await?;

        tracing::info!(
            "Resolved share {} for entity {} (access #{})",
            stored.id,
            stored.entity_id,
            stored.accessed_count + 1
        );

        Ok(build_view(
            &profile,
            &timeline,
            stored.permissions,
            now.date_naive(),
        ))
    }

    /// Revoke a share by id. Permanent, and idempotent: revoking an
    /// already-revoked or unknown id is a no-op success.
    ///
    /// # Errors
    /// Returns error only if the write itself fails.
    pub async fn revoke(&self, token_id: &str) -> Result<()> {
        let patch = ShareTokenPatch {
            active: Some(false),
            increment_access: false,
        };
        self.shares
            .update(token_id, patch)
            .await
            .map_err(|e| PawvaultError::Storage(e.into()))?;

        tracing::info!("Revoked share {token_id}");
        Ok(())
    }

    /// List an entity's non-revoked shares, newest first. Expired but
    /// unrevoked shares are included so owners can see their history.
    ///
    /// # Errors
    /// Returns error if the lookup fails.
    pub async fn list_active(&self, entity_id: &str) -> Result<Vec<ShareToken>> {
        self.shares
            .find_active_by_entity(entity_id)
            .await
            .map_err(|e| PawvaultError::Storage(e.into()))
    }
}

/// Project the aggregated record through the permission flags. Each
/// section is populated only when its flag is true.
fn build_view(
    profile: &EntityProfile,
    timeline: &Timeline,
    permissions: SharePermissions,
    today: chrono::NaiveDate,
) -> DisclosedView {
    let mut view = DisclosedView::default();

    if permissions.identification {
        view.identification = Some(IdentificationSection {
            name: profile.name.clone(),
            species: profile.species.clone(),
            breed: profile.breed.clone(),
            sex: profile.sex.clone(),
            birth_date: profile.birth_date,
            microchip: profile.microchip.clone(),
        });
    }

    if permissions.physical {
        // Weights arrive newest-first from the store.
        let latest = timeline.weights.first();
        let previous = timeline.weights.get(1);
        let trend = match (latest, previous) {
            (Some(current), Some(prior)) => {
                rules::weight_trend(current.value, prior.value, current.unit, prior.unit).ok()
            }
            _ => None,
        };

        view.physical = Some(PhysicalSection {
            latest_weight: latest.map(|w| w.value),
            latest_weight_unit: latest.map(|w| w.unit.as_str().to_string()),
            weight_recorded_on: latest.map(|w| w.recorded_on),
            weight_trend: trend,
            body_condition: profile
                .body_condition_score
                .map(|score| rules::body_condition_label(score).label.to_string()),
            color: profile.color.clone(),
            markings: profile.markings.clone(),
        });
    }

    if permissions.medical {
        view.medical = Some(MedicalSection {
            medications: timeline.medications.clone(),
            visits: timeline.visits.clone(),
            warnings: medical_warnings(&timeline.medications, &profile.allergies),
        });
    }

    if permissions.vaccinations {
        view.vaccinations = Some(timeline.vaccinations.clone());
    }

    if permissions.emergency {
        view.emergency = Some(profile.emergency_contact.clone());
    }

    if permissions.allergies {
        view.allergies = Some(profile.allergies.clone());
    }

    if permissions.notes {
        view.notes = profile.notes.clone();
    }

    if permissions.timeline {
        view.timeline = Some(TimelineSection {
            items: timeline.items.clone(),
            alerts: prioritize(&timeline.items, today).items,
        });
    }

    if permissions.documents {
        view.documents = Some(profile.documents.clone());
    }

    view
}

/// Interaction and allergy warnings across the medication list. Each
/// medication pair is checked once; the conflict table carries both
/// directions.
fn medical_warnings(
    medications: &[crate::domain::MedicationRecord],
    allergies: &[String],
) -> Vec<String> {
    let mut warnings = Vec::new();

    for (index, medication) in medications.iter().enumerate() {
        let rest: Vec<String> = medications[index + 1..]
            .iter()
            .map(|m| m.name.clone())
            .collect();
        warnings.extend(rules::medication_interactions(&medication.name, &rest));

        for allergen in allergies {
            if rules::allergy_match(&medication.name, allergen) {
                warnings.push(format!(
                    "{} is flagged against the recorded allergy '{allergen}'",
                    medication.name
                ));
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SqliteStorage;
    use crate::domain::{
        EmergencyContact, VaccinationRecord, VisitRecord, WeightRecord, WeightUnit,
    };
    use chrono::{Duration, NaiveDate};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("Should build date")
    }

    fn seed_entity(storage: &SqliteStorage, entity_id: &str) {
        storage
            .upsert_profile(&EntityProfile {
                entity_id: entity_id.to_string(),
                name: "Maple".to_string(),
                species: "dog".to_string(),
                breed: Some("Border Collie".to_string()),
                sex: Some("female".to_string()),
                birth_date: Some(date(2021, 4, 12)),
                microchip: Some("985112004562738".to_string()),
                color: Some("black and white".to_string()),
                markings: None,
                body_condition_score: Some(5),
                emergency_contact: EmergencyContact {
                    owner_name: Some("Sam Ortiz".to_string()),
                    owner_phone: Some("+1 555 0100".to_string()),
                    vet_name: Some("Northside Veterinary".to_string()),
                    vet_phone: Some("+1 555 0101".to_string()),
                },
                allergies: vec!["penicillin".to_string()],
                notes: Some("Anxious around loud noises".to_string()),
                documents: Vec::new(),
            })
            .expect("Should upsert");
        storage
            .insert_vaccination(&VaccinationRecord {
                record_id: "vax-1".to_string(),
                entity_id: entity_id.to_string(),
                vaccine: "Rabies".to_string(),
                administered_on: Some(date(2025, 8, 1)),
                next_due_date: Some(date(2026, 8, 1)),
            })
            .expect("Should insert");
        for (record_id, name) in [
            ("med-1", "Carprofen"),
            ("med-2", "Prednisone"),
            ("med-3", "Amoxicillin"),
        ] {
            storage
                .insert_medication(&crate::domain::MedicationRecord {
                    record_id: record_id.to_string(),
                    entity_id: entity_id.to_string(),
                    name: name.to_string(),
                    dose: None,
                    start_date: Some(date(2026, 1, 1)),
                    end_date: None,
                    refill_every_days: None,
                })
                .expect("Should insert");
        }
        storage
            .insert_visit(&VisitRecord {
                record_id: "visit-1".to_string(),
                entity_id: entity_id.to_string(),
                reason: "Annual checkup".to_string(),
                visit_date: date(2026, 1, 10),
                follow_up_date: None,
            })
            .expect("Should insert");
        storage
            .insert_weight(&WeightRecord {
                record_id: "wt-1".to_string(),
                entity_id: entity_id.to_string(),
                value: 21.4,
                unit: WeightUnit::Kg,
                recorded_on: date(2026, 2, 20),
            })
            .expect("Should insert");
        storage
            .insert_weight(&WeightRecord {
                record_id: "wt-0".to_string(),
                entity_id: entity_id.to_string(),
                value: 20.0,
                unit: WeightUnit::Kg,
                recorded_on: date(2026, 1, 20),
            })
            .expect("Should insert");
    }

    fn service() -> (Arc<SqliteStorage>, ShareService<SqliteStorage, SqliteStorage>) {
        let storage = Arc::new(SqliteStorage::in_memory().expect("Should create db"));
        seed_entity(&storage, "pet-1");
        let service = ShareService::new(Arc::clone(&storage), Arc::clone(&storage));
        (storage, service)
    }

    #[tokio::test]
    async fn test_generate_then_resolve_honors_permissions_exactly() {
        let (_storage, service) = service();
        let permissions = SharePermissions {
            identification: true,
            vaccinations: true,
            ..SharePermissions::none()
        };

        let token = service
            .generate("pet-1", permissions)
            .await
            .expect("Should generate");
        let view = service
            .resolve(&token.token, Utc::now())
            .await
            .expect("Should resolve");

        let identification = view.identification.expect("Should disclose identification");
        assert_eq!(identification.name, "Maple");
        let vaccinations = view.vaccinations.expect("Should disclose vaccinations");
        assert_eq!(vaccinations.len(), 1);

        // Nothing else leaks.
        assert!(view.physical.is_none());
        assert!(view.medical.is_none());
        assert!(view.emergency.is_none());
        assert!(view.allergies.is_none());
        assert!(view.notes.is_none());
        assert!(view.timeline.is_none());
        assert!(view.documents.is_none());
    }

    #[tokio::test]
    async fn test_full_permissions_populate_every_section() {
        let (_storage, service) = service();
        let token = service
            .generate("pet-1", SharePermissions::all())
            .await
            .expect("Should generate");
        let view = service
            .resolve(&token.token, Utc::now())
            .await
            .expect("Should resolve");

        assert!(view.identification.is_some());
        let physical = view.physical.expect("Should disclose physical");
        assert_eq!(physical.latest_weight, Some(21.4));
        let trend = physical.weight_trend.expect("Should compute trend");
        assert_eq!(trend.direction, rules::TrendDirection::Up);
        assert_eq!(physical.body_condition.as_deref(), Some("ideal"));

        let medical = view.medical.expect("Should disclose medical");
        assert_eq!(medical.medications.len(), 3);
        // Carprofen x Prednisone is a known conflicting pair, and
        // Amoxicillin trips the recorded penicillin allergy.
        assert!(medical
            .warnings
            .iter()
            .any(|w| w.contains("Carprofen") && w.contains("Prednisone")));
        assert!(medical
            .warnings
            .iter()
            .any(|w| w.contains("Amoxicillin") && w.contains("penicillin")));
        assert!(view.vaccinations.is_some());
        assert!(view.emergency.is_some());
        assert_eq!(view.allergies, Some(vec!["penicillin".to_string()]));
        assert!(view.notes.is_some());
        let timeline = view.timeline.expect("Should disclose timeline");
        assert!(!timeline.items.is_empty());
        assert!(view.documents.is_some());
    }

    #[tokio::test]
    async fn test_resolve_unknown_token_is_not_found() {
        let (_storage, service) = service();
        let err = service.resolve("definitely-not-a-token", Utc::now()).await;
        assert!(matches!(err, Err(PawvaultError::NotFound)));
    }

    #[tokio::test]
    async fn test_revoke_is_permanent_and_idempotent() {
        let (_storage, service) = service();
        let token = service
            .generate("pet-1", SharePermissions::all())
            .await
            .expect("Should generate");

        service.revoke(&token.id).await.expect("Should revoke");
        let err = service.resolve(&token.token, Utc::now()).await;
        assert!(matches!(err, Err(PawvaultError::NotFound)));

        // Second revoke is a no-op success.
        service.revoke(&token.id).await.expect("Should be a no-op");
    }

    #[tokio::test]
    async fn test_expired_token_matches_unknown_shape() {
        let (storage, service) = service();
        // Insert a token whose expiry is already in the past, never revoked.
        let token = ShareToken::mint(
            "pet-1",
            SharePermissions::all(),
            Utc::now() - Duration::days(40),
        );
        crate::ports::ShareStore::insert(storage.as_ref(), &token)
            .await
            .expect("Should insert");

        let expired = service.resolve(&token.token, Utc::now()).await;
        let unknown = service.resolve("no-such-token", Utc::now()).await;
        assert!(matches!(expired, Err(PawvaultError::NotFound)));
        assert!(matches!(unknown, Err(PawvaultError::NotFound)));
    }

    #[tokio::test]
    async fn test_access_count_increments_per_resolve() {
        let (storage, service) = service();
        let token = service
            .generate("pet-1", SharePermissions::all())
            .await
            .expect("Should generate");

        for _ in 0..3 {
            service
                .resolve(&token.token, Utc::now())
                .await
                .expect("Should resolve");
        }

        let stored = crate::ports::ShareStore::find_by_token(storage.as_ref(), &token.token)
            .await
            .expect("Should query")
            .expect("Should exist");
        assert_eq!(stored.accessed_count, 3);
    }

    #[tokio::test]
    async fn test_multiple_active_tokens_per_entity() {
        let (_storage, service) = service();
        let first = service
            .generate("pet-1", SharePermissions::all())
            .await
            .expect("Should generate");
        let second = service
            .generate("pet-1", SharePermissions::none())
            .await
            .expect("Should generate");
        assert_ne!(first.token, second.token);

        let active = service.list_active("pet-1").await.expect("Should list");
        assert_eq!(active.len(), 2);
    }
}
