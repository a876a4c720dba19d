//! Pure health rules: weight trends, medication interactions, allergy
//! matching, dosage bounds, refill arithmetic, body condition scores.
//!
//! Everything here is side-effect free and independently testable. The
//! interaction and allergen tables are data, not logic: extending them
//! never touches the matching algorithms.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::record::WeightUnit;

/// Pounds per kilogram.
pub const LB_PER_KG: f64 = 2.20462;

/// A weight change smaller than this (percent, absolute) is stable.
pub const STABLE_BAND_PERCENT: f64 = 2.0;

/// Upper bound accepted for a dosage value.
pub const DOSAGE_MAX: f64 = 10_000.0;

/// Error type for rule evaluation.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("previous weight must be non-zero to compute a trend")]
    ZeroPreviousWeight,

    #[error("weight readings must be finite numbers")]
    NonFiniteWeight,

    #[error("dosage '{0}' is not a number")]
    DosageNotNumeric(String),

    #[error("dosage must be greater than zero")]
    DosageNotPositive,

    #[error("dosage exceeds the maximum of {DOSAGE_MAX}")]
    DosageTooLarge,

    #[error("refill interval must be at least one day")]
    NonPositiveRefillInterval,
}

/// Direction of a weight trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

/// Percentage change between two weight readings, unit-normalized.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeightTrend {
    /// Signed percent change relative to the previous reading.
    pub change_percent: f64,
    pub direction: TrendDirection,
}

fn to_kg(value: f64, unit: WeightUnit) -> f64 {
    match unit {
        WeightUnit::Kg => value,
        WeightUnit::Lb => value / LB_PER_KG,
    }
}

/// Compute the trend between two readings, converting both to a common
/// unit first.
///
/// # Errors
/// Rejects a zero previous reading (the percentage is undefined) and
/// non-finite inputs; never divides by zero silently.
pub fn weight_trend(
    current: f64,
    previous: f64,
    current_unit: WeightUnit,
    previous_unit: WeightUnit,
) -> Result<WeightTrend, RuleError> {
    if !current.is_finite() || !previous.is_finite() {
        return Err(RuleError::NonFiniteWeight);
    }
    let current_kg = to_kg(current, current_unit);
    let previous_kg = to_kg(previous, previous_unit);
    if previous_kg == 0.0 {
        return Err(RuleError::ZeroPreviousWeight);
    }

    let change_percent = (current_kg - previous_kg) / previous_kg * 100.0;
    let direction = if change_percent.abs() < STABLE_BAND_PERCENT {
        TrendDirection::Stable
    } else if change_percent > 0.0 {
        TrendDirection::Up
    } else {
        TrendDirection::Down
    };

    Ok(WeightTrend {
        change_percent,
        direction,
    })
}

// ── Interaction table ──
//
// Drug classes and their member name fragments. A medication belongs to
// a class when its name contains one of the fragments (case-insensitive).
const DRUG_CLASSES: &[(&str, &[&str])] = &[
    (
        "NSAID",
        &[
            "carprofen",
            "meloxicam",
            "deracoxib",
            "firocoxib",
            "grapiprant",
            "aspirin",
            "ibuprofen",
        ],
    ),
    (
        "corticosteroid",
        &[
            "prednisone",
            "prednisolone",
            "dexamethasone",
            "cortisone",
            "triamcinolone",
        ],
    ),
    ("ACE inhibitor", &["enalapril", "benazepril", "lisinopril"]),
    ("loop diuretic", &["furosemide", "torsemide"]),
    ("anticoagulant", &["warfarin", "heparin", "clopidogrel"]),
    ("MAO inhibitor", &["selegiline", "amitraz"]),
    ("SSRI", &["fluoxetine", "sertraline", "trazodone"]),
];

// Known conflicting class pairs. Symmetric pairs are listed once per
// direction the candidate may arrive from.
const CLASS_CONFLICTS: &[(&str, &[&str])] = &[
    ("NSAID", &["corticosteroid", "NSAID", "anticoagulant", "ACE inhibitor"]),
    ("corticosteroid", &["NSAID"]),
    ("ACE inhibitor", &["NSAID", "loop diuretic"]),
    ("loop diuretic", &["ACE inhibitor"]),
    ("anticoagulant", &["NSAID"]),
    ("MAO inhibitor", &["SSRI"]),
    ("SSRI", &["MAO inhibitor"]),
];

/// Classes whose member fragments substring-match `name`.
fn classes_of(name: &str) -> Vec<&'static str> {
    let lowered = name.to_lowercase();
    DRUG_CLASSES
        .iter()
        .filter(|(_, members)| members.iter().any(|m| lowered.contains(m)))
        .map(|(class, _)| *class)
        .collect()
}

/// Check a candidate medication against the animal's active medications.
///
/// One warning string per (candidate class, conflicting active
/// medication) pair. A known-pairs lookup, not an interaction graph.
#[must_use]
pub fn medication_interactions(candidate: &str, active: &[String]) -> Vec<String> {
    let mut warnings = Vec::new();

    for candidate_class in classes_of(candidate) {
        let Some((_, conflicting)) = CLASS_CONFLICTS
            .iter()
            .find(|(class, _)| *class == candidate_class)
        else {
            continue;
        };

        for medication in active {
            for active_class in classes_of(medication) {
                if conflicting.contains(&active_class) {
                    warnings.push(format!(
                        "{candidate} ({candidate_class}) may interact with {medication} ({active_class})"
                    ));
                }
            }
        }
    }

    warnings
}

// Allergen name → drug family member fragments. Lets "penicillin" on the
// allergy list flag "Amoxicillin" even though neither is a substring of
// the other.
const ALLERGEN_FAMILIES: &[(&str, &[&str])] = &[
    (
        "penicillin",
        &["amoxicillin", "ampicillin", "penicillin", "clavamox"],
    ),
    (
        "sulfa",
        &["sulfamethoxazole", "sulfadiazine", "sulfasalazine", "trimethoprim"],
    ),
    ("nsaid", &["carprofen", "meloxicam", "aspirin", "ibuprofen"]),
    ("cephalosporin", &["cephalexin", "cefpodoxime", "cefovecin"]),
];

/// True when a medication may trigger a recorded allergy: substring
/// match in either direction, or via the allergen's drug family.
#[must_use]
pub fn allergy_match(medication: &str, allergen: &str) -> bool {
    let medication = medication.to_lowercase();
    let allergen = allergen.to_lowercase();

    if medication.contains(&allergen) || allergen.contains(&medication) {
        return true;
    }

    ALLERGEN_FAMILIES
        .iter()
        .filter(|(family, _)| allergen.contains(family))
        .any(|(_, members)| members.iter().any(|m| medication.contains(m)))
}

/// Validate a dosage value as entered.
///
/// # Errors
/// Fails with a specific reason: not numeric, not positive, or above
/// [`DOSAGE_MAX`].
pub fn dosage_valid(raw: &str) -> Result<f64, RuleError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| RuleError::DosageNotNumeric(raw.to_string()))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(RuleError::DosageNotPositive);
    }
    if value > DOSAGE_MAX {
        return Err(RuleError::DosageTooLarge);
    }
    Ok(value)
}

/// Next refill date: plain calendar-day arithmetic on a timezone-less
/// date.
///
/// # Errors
/// Rejects a non-positive interval.
pub fn next_refill_date(start: NaiveDate, every_n_days: i64) -> Result<NaiveDate, RuleError> {
    if every_n_days <= 0 {
        return Err(RuleError::NonPositiveRefillInterval);
    }
    Ok(start + Duration::days(every_n_days))
}

/// Label and display color for a body condition score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BodyCondition {
    pub label: &'static str,
    pub color: (u8, u8, u8),
}

/// Sentinel for out-of-range scores.
pub const BODY_CONDITION_UNKNOWN: BodyCondition = BodyCondition {
    label: "unknown",
    color: (148, 163, 184), // Slate (#94A3B8)
};

/// Fixed 1..=9 body condition lookup. Out-of-range scores return the
/// unknown sentinel, never a panic.
#[must_use]
pub fn body_condition_label(score: i32) -> BodyCondition {
    match score {
        1..=2 => BodyCondition {
            label: "emaciated",
            color: (244, 63, 94),
        },
        3 => BodyCondition {
            label: "underweight",
            color: (251, 191, 36),
        },
        4..=5 => BodyCondition {
            label: "ideal",
            color: (16, 185, 129),
        },
        6..=7 => BodyCondition {
            label: "overweight",
            color: (251, 191, 36),
        },
        8..=9 => BodyCondition {
            label: "obese",
            color: (244, 63, 94),
        },
        _ => BODY_CONDITION_UNKNOWN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_weight_trend_directions() {
        let up = weight_trend(10.5, 10.0, WeightUnit::Kg, WeightUnit::Kg).expect("Should compute");
        assert_eq!(up.direction, TrendDirection::Up);
        assert!((up.change_percent - 5.0).abs() < 1e-9);

        let down = weight_trend(9.0, 10.0, WeightUnit::Kg, WeightUnit::Kg).expect("Should compute");
        assert_eq!(down.direction, TrendDirection::Down);

        let stable =
            weight_trend(10.1, 10.0, WeightUnit::Kg, WeightUnit::Kg).expect("Should compute");
        assert_eq!(stable.direction, TrendDirection::Stable);
    }

    #[test]
    fn test_weight_trend_mixed_units() {
        // 22.0462 lb == 10 kg, so this is a 10% gain.
        let trend =
            weight_trend(11.0, 22.0462, WeightUnit::Kg, WeightUnit::Lb).expect("Should compute");
        assert_eq!(trend.direction, TrendDirection::Up);
        assert!((trend.change_percent - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_weight_trend_rejects_zero_previous() {
        let err = weight_trend(5.0, 0.0, WeightUnit::Kg, WeightUnit::Kg);
        assert!(matches!(err, Err(RuleError::ZeroPreviousWeight)));
    }

    #[test]
    fn test_weight_trend_rejects_non_finite() {
        let err = weight_trend(f64::NAN, 10.0, WeightUnit::Kg, WeightUnit::Kg);
        assert!(matches!(err, Err(RuleError::NonFiniteWeight)));
    }

    #[test]
    fn test_carprofen_prednisone_interaction() {
        let warnings = medication_interactions("Carprofen", &["Prednisone".to_string()]);
        assert!(!warnings.is_empty());
        assert!(warnings[0].contains("Carprofen"));
        assert!(warnings[0].contains("Prednisone"));
    }

    #[test]
    fn test_unrelated_medications_do_not_warn() {
        let warnings = medication_interactions("Amoxicillin", &["Water".to_string()]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_interaction_matching_is_case_insensitive() {
        let warnings = medication_interactions("CARPROFEN 75mg", &["prednisolone".to_string()]);
        assert!(!warnings.is_empty());
    }

    #[test]
    fn test_allergy_substring_both_directions() {
        assert!(allergy_match("Amoxicillin 250mg", "amoxicillin"));
        assert!(allergy_match("aspirin", "Baby Aspirin"));
        assert!(!allergy_match("Gabapentin", "chicken"));
    }

    #[test]
    fn test_allergy_family_mapping() {
        assert!(allergy_match("Amoxicillin", "Penicillin"));
        assert!(allergy_match("Cephalexin", "cephalosporin allergy"));
        assert!(!allergy_match("Fluoxetine", "penicillin"));
    }

    #[test]
    fn test_dosage_bounds() {
        assert!((dosage_valid("75").expect("Should accept") - 75.0).abs() < f64::EPSILON);
        assert!(matches!(
            dosage_valid("0"),
            Err(RuleError::DosageNotPositive)
        ));
        assert!(matches!(
            dosage_valid("-3"),
            Err(RuleError::DosageNotPositive)
        ));
        assert!(matches!(
            dosage_valid("10001"),
            Err(RuleError::DosageTooLarge)
        ));
        assert!(matches!(
            dosage_valid("abc"),
            Err(RuleError::DosageNotNumeric(_))
        ));
    }

    #[test]
    fn test_next_refill_date() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 31).expect("Should build date");
        let refill = next_refill_date(start, 30).expect("Should compute");
        assert_eq!(
            refill,
            NaiveDate::from_ymd_opt(2026, 3, 2).expect("Should build date")
        );
        assert!(matches!(
            next_refill_date(start, 0),
            Err(RuleError::NonPositiveRefillInterval)
        ));
    }

    #[test]
    fn test_body_condition_table() {
        assert_eq!(body_condition_label(4).label, "ideal");
        assert_eq!(body_condition_label(9).label, "obese");
        assert_eq!(body_condition_label(0), BODY_CONDITION_UNKNOWN);
        assert_eq!(body_condition_label(10), BODY_CONDITION_UNKNOWN);
    }

    proptest! {
        /// Converting both readings to kg or both to lb must agree on
        /// direction, and on percent within rounding tolerance.
        #[test]
        fn prop_weight_trend_unit_order_invariant(
            current in 0.5f64..500.0,
            previous in 0.5f64..500.0,
        ) {
            let in_kg = weight_trend(current, previous, WeightUnit::Kg, WeightUnit::Kg)
                .expect("Should compute");
            let in_lb = weight_trend(
                current * LB_PER_KG,
                previous * LB_PER_KG,
                WeightUnit::Lb,
                WeightUnit::Lb,
            )
            .expect("Should compute");

            prop_assert_eq!(in_kg.direction, in_lb.direction);
            prop_assert!((in_kg.change_percent - in_lb.change_percent).abs() < 1e-6);
        }

        /// Out-of-range scores always return the sentinel, never panic.
        #[test]
        fn prop_body_condition_never_panics(score in i32::MIN..i32::MAX) {
            let condition = body_condition_label(score);
            if !(1..=9).contains(&score) {
                prop_assert_eq!(condition, BODY_CONDITION_UNKNOWN);
            }
        }
    }
}
