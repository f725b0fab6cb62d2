//! # Identity Arithmetic
//!
//! The pure half of identifier allocation: gap-filling sequence indices and
//! printed number formats. The store-backed half (collision probing inside a
//! transaction) lives in `packline-db`.
//!
//! ## Gap-Filling Law
//! ```text
//! live indices of order: {1, 2, 4, 5}
//!                               ▲
//!                               └── next index = 3 (smallest free positive)
//!
//! delete #1  → {2, 4, 5}  → next = 1
//! create     → {1, 2, 4, 5} → next = 3
//! ```
//! Operators read these as "package N of M", so they must stay dense after
//! deletions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write;

use crate::error::ValidationError;

/// Returns the smallest positive integer not present in `used`.
///
/// ## Example
/// ```rust
/// use packline_core::identity::smallest_free_index;
///
/// assert_eq!(smallest_free_index(Vec::new()), 1);
/// assert_eq!(smallest_free_index([1, 2, 4]), 3);
/// assert_eq!(smallest_free_index([2, 3]), 1);
/// ```
pub fn smallest_free_index<I>(used: I) -> i64
where
    I: IntoIterator<Item = i64>,
{
    let used: BTreeSet<i64> = used.into_iter().filter(|i| *i > 0).collect();
    let mut candidate = 1;
    for index in used {
        if index != candidate {
            break;
        }
        candidate += 1;
    }
    candidate
}

// =============================================================================
// Number Format
// =============================================================================

/// Templates for printed package and pallet numbers.
///
/// ```text
/// package:          {package_prefix}{date}-{seq:0package_width}   20261016-0007
/// physical pallet:  {physical_prefix}{date}-{seq:0pallet_width}   T20261016-002
/// virtual pallet:   {virtual_prefix}{date}-{seq:0pallet_width}    VT20261016-001
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberFormat {
    pub package_prefix: String,
    pub physical_pallet_prefix: String,
    pub virtual_pallet_prefix: String,
    /// strftime pattern for the date part.
    pub date_format: String,
    pub package_width: usize,
    pub pallet_width: usize,
}

impl Default for NumberFormat {
    fn default() -> Self {
        NumberFormat {
            package_prefix: String::new(),
            physical_pallet_prefix: "T".to_string(),
            virtual_pallet_prefix: "VT".to_string(),
            date_format: "%Y%m%d".to_string(),
            package_width: 4,
            pallet_width: 3,
        }
    }
}

impl NumberFormat {
    /// Everything before the counter for packages numbered on `date`.
    pub fn package_day_prefix(&self, date: NaiveDate) -> String {
        format!("{}{}-", self.package_prefix, date.format(&self.date_format))
    }

    pub fn package_number(&self, date: NaiveDate, seq: u32) -> String {
        format!(
            "{}{:0width$}",
            self.package_day_prefix(date),
            seq,
            width = self.package_width
        )
    }

    pub fn pallet_prefix(&self, is_virtual: bool) -> &str {
        if is_virtual {
            &self.virtual_pallet_prefix
        } else {
            &self.physical_pallet_prefix
        }
    }

    /// Everything before the counter for pallets of one kind numbered on `date`.
    pub fn pallet_day_prefix(&self, is_virtual: bool, date: NaiveDate) -> String {
        format!(
            "{}{}-",
            self.pallet_prefix(is_virtual),
            date.format(&self.date_format)
        )
    }

    pub fn pallet_number(&self, is_virtual: bool, date: NaiveDate, seq: u32) -> String {
        format!(
            "{}{:0width$}",
            self.pallet_day_prefix(is_virtual, date),
            seq,
            width = self.pallet_width
        )
    }

    /// Rejects templates that would panic while formatting or make the two
    /// pallet kinds indistinguishable.
    ///
    /// The date pattern is trial-rendered on a fixed date: unknown specifiers
    /// and time-of-day or offset fields (`%H`, `%M`, `%z`) cannot be rendered
    /// from a `NaiveDate`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut rendered = String::new();
        let sample = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default();
        if write!(rendered, "{}", sample.format(&self.date_format)).is_err() {
            return Err(ValidationError::InvalidFormat {
                field: "numbering.date_format".to_string(),
                reason: format!("'{}' is not a valid date pattern", self.date_format),
            });
        }
        if self.physical_pallet_prefix == self.virtual_pallet_prefix {
            return Err(ValidationError::InvalidFormat {
                field: "numbering.virtual_pallet_prefix".to_string(),
                reason: "must differ from the physical pallet prefix".to_string(),
            });
        }
        if self.package_width == 0 || self.pallet_width == 0 {
            return Err(ValidationError::MustBePositive {
                field: "numbering width".to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn test_smallest_free_index_fills_gaps() {
        assert_eq!(smallest_free_index(Vec::new()), 1);
        assert_eq!(smallest_free_index(vec![1, 2, 3]), 4);
        assert_eq!(smallest_free_index(vec![3, 1, 5, 2]), 4);
        assert_eq!(smallest_free_index(vec![2, 2, 3]), 1);
        assert_eq!(smallest_free_index(vec![-1, 0, 1]), 2);
    }

    #[test]
    fn test_repeated_allocation_is_dense() {
        let mut live = vec![1, 2, 3, 4, 5];
        live.retain(|i| *i != 2 && *i != 4);

        let mut allocated = Vec::new();
        for _ in 0..3 {
            let next = smallest_free_index(live.iter().copied());
            live.push(next);
            allocated.push(next);
        }
        assert_eq!(allocated, vec![2, 4, 6]);
    }

    #[test]
    fn test_default_number_formats() {
        let format = NumberFormat::default();
        assert_eq!(format.package_number(date(), 7), "20261016-0007");
        assert_eq!(format.pallet_number(false, date(), 2), "T20261016-002");
        assert_eq!(format.pallet_number(true, date(), 1), "VT20261016-001");
        assert_eq!(format.pallet_day_prefix(true, date()), "VT20261016-");
    }

    #[test]
    fn test_counter_overflows_width_without_truncation() {
        let format = NumberFormat::default();
        assert_eq!(format.package_number(date(), 12345), "20261016-12345");
    }

    #[test]
    fn test_validate_number_format() {
        assert!(NumberFormat::default().validate().is_ok());

        let bad_date = NumberFormat {
            date_format: "%Y%Q".to_string(),
            ..Default::default()
        };
        assert!(bad_date.validate().is_err());

        for pattern in ["%Y%m%d%H", "%Y-%m-%dT%M", "%Y%m%d%z"] {
            let time_of_day = NumberFormat {
                date_format: pattern.to_string(),
                ..Default::default()
            };
            let err = time_of_day.validate().unwrap_err();
            assert!(matches!(err, ValidationError::InvalidFormat { .. }), "{pattern}");
        }

        let dashed = NumberFormat {
            date_format: "%y-%m-%d".to_string(),
            ..Default::default()
        };
        assert!(dashed.validate().is_ok());
        assert_eq!(dashed.package_number(date(), 3), "26-10-16-0003");

        let same_prefix = NumberFormat {
            virtual_pallet_prefix: "T".to_string(),
            ..Default::default()
        };
        assert!(same_prefix.validate().is_err());
    }
}
