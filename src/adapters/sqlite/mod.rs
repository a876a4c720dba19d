//! SQLite adapter: Implementation of `RecordStore` and `ShareStore`.
//!
//! Provides local persistence for health records, entity profiles, and
//! disclosure tokens. Record rows are written by the owner-facing CRUD
//! flows of the surrounding application; the write helpers here exist
//! for those flows and for tests.
//!
//! # Mutex Behavior
//!
//! Database connection is protected by `Mutex`. A poisoned mutex (from
//! panic in another thread) will cause panic. This fail-fast behavior is
//! intentional for data integrity in health record applications.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::{
    DocumentRef, EmergencyContact, EntityProfile, MedicationRecord, SharePermissions, ShareToken,
    VaccinationRecord, VisitRecord, WeightRecord, WeightUnit,
};
use crate::ports::{RecordStore, ShareStore, ShareTokenPatch};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unique constraint conflict: {0}")]
    Conflict(String),
}

/// SQLite storage adapter backing both ports.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Create a new SQLite storage with the given database path.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Create an in-memory SQLite database (for testing).
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("Lock failed");

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS entities (
                entity_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                species TEXT NOT NULL,
                breed TEXT,
                sex TEXT,
                birth_date TEXT,
                microchip TEXT,
                color TEXT,
                markings TEXT,
                body_condition_score INTEGER,
                owner_name TEXT,
                owner_phone TEXT,
                vet_name TEXT,
                vet_phone TEXT,
                allergies TEXT NOT NULL DEFAULT '[]',
                notes TEXT
            );

            CREATE TABLE IF NOT EXISTS documents (
                document_id TEXT PRIMARY KEY,
                entity_id TEXT NOT NULL,
                title TEXT NOT NULL,
                uploaded_on TEXT
            );

            CREATE TABLE IF NOT EXISTS vaccinations (
                record_id TEXT PRIMARY KEY,
                entity_id TEXT NOT NULL,
                vaccine TEXT NOT NULL,
                administered_on TEXT,
                next_due_date TEXT
            );

            CREATE TABLE IF NOT EXISTS medications (
                record_id TEXT PRIMARY KEY,
                entity_id TEXT NOT NULL,
                name TEXT NOT NULL,
                dose TEXT,
                start_date TEXT,
                end_date TEXT,
                refill_every_days INTEGER
            );

            CREATE TABLE IF NOT EXISTS visits (
                record_id TEXT PRIMARY KEY,
                entity_id TEXT NOT NULL,
                reason TEXT NOT NULL,
                visit_date TEXT NOT NULL,
                follow_up_date TEXT
            );

            CREATE TABLE IF NOT EXISTS weights (
                record_id TEXT PRIMARY KEY,
                entity_id TEXT NOT NULL,
                value REAL NOT NULL,
                unit TEXT NOT NULL,
                recorded_on TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS share_tokens (
                id TEXT PRIMARY KEY,
                entity_id TEXT NOT NULL,
                token TEXT NOT NULL UNIQUE,
                permissions TEXT NOT NULL,
                active INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                accessed_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_vaccinations_entity
                ON vaccinations(entity_id, next_due_date DESC);
            CREATE INDEX IF NOT EXISTS idx_medications_entity
                ON medications(entity_id, start_date DESC);
            CREATE INDEX IF NOT EXISTS idx_visits_entity
                ON visits(entity_id, visit_date DESC);
            CREATE INDEX IF NOT EXISTS idx_weights_entity
                ON weights(entity_id, recorded_on DESC);
            CREATE INDEX IF NOT EXISTS idx_share_tokens_entity
                ON share_tokens(entity_id, created_at DESC);
            ",
        )?;

        Ok(())
    }

    /// Upsert an entity profile (identification, contacts, allergies,
    /// notes). Documents are stored separately.
    ///
    /// # Errors
    /// Returns error if the write fails.
    pub fn upsert_profile(&self, profile: &EntityProfile) -> Result<(), StorageError> {
        let allergies = serde_json::to_string(&profile.allergies)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let conn = self.conn.lock().expect("Lock failed");

        conn.execute(
            r"
            INSERT OR REPLACE INTO entities (
                entity_id, name, species, breed, sex, birth_date, microchip,
                color, markings, body_condition_score, owner_name, owner_phone,
                vet_name, vet_phone, allergies, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            ",
            params![
                profile.entity_id,
                profile.name,
                profile.species,
                profile.breed,
                profile.sex,
                date_to_sql(profile.birth_date),
                profile.microchip,
                profile.color,
                profile.markings,
                profile.body_condition_score,
                profile.emergency_contact.owner_name,
                profile.emergency_contact.owner_phone,
                profile.emergency_contact.vet_name,
                profile.emergency_contact.vet_phone,
                allergies,
                profile.notes,
            ],
        )?;

        tracing::debug!("Upserted profile for entity {}", profile.entity_id);
        Ok(())
    }

    /// Insert a document reference for an entity.
    ///
    /// # Errors
    /// Returns error if the write fails.
    pub fn insert_document(
        &self,
        entity_id: &str,
        document: &DocumentRef,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("Lock failed");
        conn.execute(
            "INSERT INTO documents (document_id, entity_id, title, uploaded_on)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                document.document_id,
                entity_id,
                document.title,
                date_to_sql(document.uploaded_on),
            ],
        )?;
        Ok(())
    }

    /// Insert a vaccination record.
    ///
    /// # Errors
    /// Returns error if the write fails.
    pub fn insert_vaccination(&self, record: &VaccinationRecord) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("Lock failed");
        conn.execute(
            "INSERT INTO vaccinations (record_id, entity_id, vaccine, administered_on, next_due_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.record_id,
                record.entity_id,
                record.vaccine,
                date_to_sql(record.administered_on),
                date_to_sql(record.next_due_date),
            ],
        )?;
        Ok(())
    }

    /// Insert a medication record.
    ///
    /// # Errors
    /// Returns error if the write fails.
    pub fn insert_medication(&self, record: &MedicationRecord) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("Lock failed");
        conn.execute(
            "INSERT INTO medications (record_id, entity_id, name, dose, start_date, end_date, refill_every_days)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.record_id,
                record.entity_id,
                record.name,
                record.dose,
                date_to_sql(record.start_date),
                date_to_sql(record.end_date),
                record.refill_every_days,
            ],
        )?;
        Ok(())
    }

    /// Insert a visit record.
    ///
    /// # Errors
    /// Returns error if the write fails.
    pub fn insert_visit(&self, record: &VisitRecord) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("Lock failed");
        conn.execute(
            "INSERT INTO visits (record_id, entity_id, reason, visit_date, follow_up_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.record_id,
                record.entity_id,
                record.reason,
                record.visit_date.to_string(),
                date_to_sql(record.follow_up_date),
            ],
        )?;
        Ok(())
    }

    /// Insert a weight record.
    ///
    /// # Errors
    /// Returns error if the write fails.
    pub fn insert_weight(&self, record: &WeightRecord) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("Lock failed");
        conn.execute(
            "INSERT INTO weights (record_id, entity_id, value, unit, recorded_on)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.record_id,
                record.entity_id,
                record.value,
                record.unit.as_str(),
                record.recorded_on.to_string(),
            ],
        )?;
        Ok(())
    }

    fn row_to_share_token(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawShareToken> {
        Ok(RawShareToken {
            id: row.get(0)?,
            entity_id: row.get(1)?,
            token: row.get(2)?,
            permissions: row.get(3)?,
            active: row.get::<_, i64>(4)? != 0,
            created_at: row.get(5)?,
            expires_at: row.get(6)?,
            accessed_count: row.get::<_, i64>(7)?,
        })
    }
}

/// Share token row before JSON/timestamp decoding.
struct RawShareToken {
    id: String,
    entity_id: String,
    token: String,
    permissions: String,
    active: bool,
    created_at: String,
    expires_at: String,
    accessed_count: i64,
}

impl RawShareToken {
    fn decode(self) -> Result<ShareToken, StorageError> {
        let permissions: SharePermissions = serde_json::from_str(&self.permissions)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let created_at = parse_timestamp(&self.created_at)?;
        let expires_at = parse_timestamp(&self.expires_at)?;

        Ok(ShareToken {
            id: self.id,
            entity_id: self.entity_id,
            token: self.token,
            permissions,
            active: self.active,
            created_at,
            expires_at,
            accessed_count: self.accessed_count.max(0) as u64,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<chrono::DateTime<chrono::Utc>, StorageError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| StorageError::Serialization(format!("bad timestamp '{s}': {e}")))
}

fn date_to_sql(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.to_string())
}

fn sql_to_date(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|s| s.parse().ok())
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl RecordStore for SqliteStorage {
    type Error = StorageError;

    async fn list_vaccinations(
        &self,
        entity_id: &str,
    ) -> Result<Vec<VaccinationRecord>, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");
        let mut stmt = conn.prepare(
            "SELECT record_id, entity_id, vaccine, administered_on, next_due_date
             FROM vaccinations WHERE entity_id = ?1
             ORDER BY next_due_date DESC",
        )?;

        let records = stmt
            .query_map(params![entity_id], |row| {
                Ok(VaccinationRecord {
                    record_id: row.get(0)?,
                    entity_id: row.get(1)?,
                    vaccine: row.get(2)?,
                    administered_on: sql_to_date(row.get(3)?),
                    next_due_date: sql_to_date(row.get(4)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    async fn list_medications(
        &self,
        entity_id: &str,
    ) -> Result<Vec<MedicationRecord>, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");
        let mut stmt = conn.prepare(
            "SELECT record_id, entity_id, name, dose, start_date, end_date, refill_every_days
             FROM medications WHERE entity_id = ?1
             ORDER BY start_date DESC",
        )?;

        let records = stmt
            .query_map(params![entity_id], |row| {
                Ok(MedicationRecord {
                    record_id: row.get(0)?,
                    entity_id: row.get(1)?,
                    name: row.get(2)?,
                    dose: row.get(3)?,
                    start_date: sql_to_date(row.get(4)?),
                    end_date: sql_to_date(row.get(5)?),
                    refill_every_days: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    async fn list_visits(&self, entity_id: &str) -> Result<Vec<VisitRecord>, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");
        let mut stmt = conn.prepare(
            "SELECT record_id, entity_id, reason, visit_date, follow_up_date
             FROM visits WHERE entity_id = ?1
             ORDER BY visit_date DESC",
        )?;

        let records = stmt
            .query_map(params![entity_id], |row| {
                let visit_date: String = row.get(3)?;
                Ok((
                    VisitRecord {
                        record_id: row.get(0)?,
                        entity_id: row.get(1)?,
                        reason: row.get(2)?,
                        visit_date: NaiveDate::default(),
                        follow_up_date: sql_to_date(row.get(4)?),
                    },
                    visit_date,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter_map(|(mut record, raw_date)| match raw_date.parse() {
                Ok(date) => {
                    record.visit_date = date;
                    Some(record)
                }
                Err(_) => {
                    tracing::warn!("Skipping visit {} with bad date '{raw_date}'", record.record_id);
                    None
                }
            })
            .collect();

        Ok(records)
    }

    async fn list_weights(&self, entity_id: &str) -> Result<Vec<WeightRecord>, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");
        let mut stmt = conn.prepare(
            "SELECT record_id, entity_id, value, unit, recorded_on
             FROM weights WHERE entity_id = ?1
             ORDER BY recorded_on DESC",
        )?;

        let records = stmt
            .query_map(params![entity_id], |row| {
                let unit: String = row.get(3)?;
                let recorded_on: String = row.get(4)?;
                Ok((
                    WeightRecord {
                        record_id: row.get(0)?,
                        entity_id: row.get(1)?,
                        value: row.get(2)?,
                        unit: WeightUnit::parse_lossy(&unit),
                        recorded_on: NaiveDate::default(),
                    },
                    recorded_on,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter_map(|(mut record, raw_date)| match raw_date.parse() {
                Ok(date) => {
                    record.recorded_on = date;
                    Some(record)
                }
                Err(_) => {
                    tracing::warn!(
                        "Skipping weight {} with bad date '{raw_date}'",
                        record.record_id
                    );
                    None
                }
            })
            .collect();

        Ok(records)
    }

    async fn profile(&self, entity_id: &str) -> Result<Option<EntityProfile>, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        let row = conn
            .query_row(
                r"
                SELECT entity_id, name, species, breed, sex, birth_date, microchip,
                       color, markings, body_condition_score, owner_name, owner_phone,
                       vet_name, vet_phone, allergies, notes
                FROM entities WHERE entity_id = ?1
                ",
                params![entity_id],
                |row| {
                    Ok((
                        EntityProfile {
                            entity_id: row.get(0)?,
                            name: row.get(1)?,
                            species: row.get(2)?,
                            breed: row.get(3)?,
                            sex: row.get(4)?,
                            birth_date: sql_to_date(row.get(5)?),
                            microchip: row.get(6)?,
                            color: row.get(7)?,
                            markings: row.get(8)?,
                            body_condition_score: row.get(9)?,
                            emergency_contact: EmergencyContact {
                                owner_name: row.get(10)?,
                                owner_phone: row.get(11)?,
                                vet_name: row.get(12)?,
                                vet_phone: row.get(13)?,
                            },
                            allergies: Vec::new(),
                            notes: row.get(15)?,
                            documents: Vec::new(),
                        },
                        row.get::<_, String>(14)?,
                    ))
                },
            )
            .optional()?;

        let Some((mut profile, allergies_json)) = row else {
            return Ok(None);
        };

        profile.allergies = serde_json::from_str(&allergies_json)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT document_id, title, uploaded_on FROM documents
             WHERE entity_id = ?1 ORDER BY uploaded_on DESC",
        )?;
        profile.documents = stmt
            .query_map(params![entity_id], |row| {
                Ok(DocumentRef {
                    document_id: row.get(0)?,
                    title: row.get(1)?,
                    uploaded_on: sql_to_date(row.get(2)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(profile))
    }
}

#[async_trait]
impl ShareStore for SqliteStorage {
    type Error = StorageError;

    async fn insert(&self, token: &ShareToken) -> Result<(), Self::Error> {
        let permissions = serde_json::to_string(&token.permissions)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let conn = self.conn.lock().expect("Lock failed");

        let result = conn.execute(
            r"
            INSERT INTO share_tokens (
                id, entity_id, token, permissions, active,
                created_at, expires_at, accessed_count
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                token.id,
                token.entity_id,
                token.token,
                permissions,
                token.active as i64,
                token.created_at.to_rfc3339(),
                token.expires_at.to_rfc3339(),
                token.accessed_count as i64,
            ],
        );

        match result {
            Ok(_) => {
                tracing::info!("Stored share token {} for entity {}", token.id, token.entity_id);
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => {
                Err(StorageError::Conflict(format!("share token {}", token.id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<ShareToken>, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        let raw = conn
            .query_row(
                r"
                SELECT id, entity_id, token, permissions, active,
                       created_at, expires_at, accessed_count
                FROM share_tokens WHERE token = ?1
                ",
                params![token],
                Self::row_to_share_token,
            )
            .optional()?;

        raw.map(RawShareToken::decode).transpose()
    }

    async fn find_active_by_entity(
        &self,
        entity_id: &str,
    ) -> Result<Vec<ShareToken>, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        let mut stmt = conn.prepare(
            r"
            SELECT id, entity_id, token, permissions, active,
                   created_at, expires_at, accessed_count
            FROM share_tokens
            WHERE entity_id = ?1 AND active = 1
            ORDER BY created_at DESC
            ",
        )?;

        let raw_rows = stmt
            .query_map(params![entity_id], Self::row_to_share_token)?
            .collect::<Result<Vec<_>, _>>()?;

        raw_rows.into_iter().map(RawShareToken::decode).collect()
    }

    async fn update(&self, token_id: &str, patch: ShareTokenPatch) -> Result<(), Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        if let Some(active) = patch.active {
            conn.execute(
                "UPDATE share_tokens SET active = ?2 WHERE id = ?1",
                params![token_id, active as i64],
            )?;
        }
        if patch.increment_access {
            // Single-statement increment: atomic at the store, monotonic
            // under concurrent resolves.
            conn.execute(
                "UPDATE share_tokens SET accessed_count = accessed_count + 1 WHERE id = ?1",
                params![token_id],
            )?;
        }

        Ok(())
    }
}
