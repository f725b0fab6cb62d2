//! # Scan Transformations
//!
//! Turns raw barcode-scanner text into a component code.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Scan Text Resolution                               │
//! │                                                                         │
//! │  raw "  AB1234\r\n"                                                    │
//! │       │  trim whitespace / control chars                               │
//! │       ▼                                                                 │
//! │  "AB1234"                                                              │
//! │       │  ScanTransform (from the active ScanConfig)                    │
//! │       ▼                                                                 │
//! │  ┌───────────────────────────────────────────────────────────────┐    │
//! │  │ None | StripPrefix | StripSuffix | Extract | Insert |          │    │
//! │  │ Composite: strip-prefix → strip-suffix → insert → extract      │    │
//! │  └───────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  "1234"  ── equals finish code? ──► complete the active package        │
//! │          └─ otherwise ───────────► look up component by code           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All offsets count characters, not bytes. Out-of-range offsets clamp
//! instead of failing: a scan is either resolved or rejected by lookup, never
//! by arithmetic.
//!
//! ## Stored Format
//! Profiles are stored as JSON in the settings table:
//! ```json
//! { "name": "cnc-line", "finish_code": "FINISH",
//!   "transform": { "kind": "composite", "strip_prefix": 2,
//!                  "extract": { "start": 0, "len": 6 } } }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Result type for scan profile validation.
pub type ScanResult<T> = Result<T, ValidationError>;

// =============================================================================
// Transform Steps
// =============================================================================

/// Text to splice into the scanned code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insertion {
    pub pos: usize,
    pub text: String,
}

/// Window of the scanned code to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub start: usize,
    pub len: usize,
}

/// Every step of a composite transform is optional; enabled steps always run
/// in the order strip-prefix → strip-suffix → insert → extract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeTransform {
    pub strip_prefix: Option<usize>,
    pub strip_suffix: Option<usize>,
    pub insert: Option<Insertion>,
    pub extract: Option<Extraction>,
}

/// A scan text transformation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanTransform {
    /// Use the scanned text as-is.
    #[default]
    None,
    /// Drop the first `n` characters.
    StripPrefix { n: usize },
    /// Drop the last `n` characters.
    StripSuffix { n: usize },
    /// Keep `len` characters starting at `start`.
    Extract { start: usize, len: usize },
    /// Insert `text` before character `pos`.
    Insert { pos: usize, text: String },
    /// Fixed-order combination of the above.
    Composite(CompositeTransform),
}

fn strip_prefix(code: &str, n: usize) -> String {
    code.chars().skip(n).collect()
}

fn strip_suffix(code: &str, n: usize) -> String {
    let keep = code.chars().count().saturating_sub(n);
    code.chars().take(keep).collect()
}

fn extract(code: &str, start: usize, len: usize) -> String {
    code.chars().skip(start).take(len).collect()
}

fn insert(code: &str, pos: usize, text: &str) -> String {
    let head: String = code.chars().take(pos).collect();
    let tail: String = code.chars().skip(pos).collect();
    format!("{head}{text}{tail}")
}

fn positive(field: &str, value: usize) -> ScanResult<()> {
    if value == 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

impl ScanTransform {
    /// Applies the transformation to already-trimmed scanner text.
    pub fn apply(&self, code: &str) -> String {
        match self {
            ScanTransform::None => code.to_string(),
            ScanTransform::StripPrefix { n } => strip_prefix(code, *n),
            ScanTransform::StripSuffix { n } => strip_suffix(code, *n),
            ScanTransform::Extract { start, len } => extract(code, *start, *len),
            ScanTransform::Insert { pos, text } => insert(code, *pos, text),
            ScanTransform::Composite(steps) => {
                let mut out = code.to_string();
                if let Some(n) = steps.strip_prefix {
                    out = strip_prefix(&out, n);
                }
                if let Some(n) = steps.strip_suffix {
                    out = strip_suffix(&out, n);
                }
                if let Some(ins) = &steps.insert {
                    out = insert(&out, ins.pos, &ins.text);
                }
                if let Some(ext) = steps.extract {
                    out = extract(&out, ext.start, ext.len);
                }
                out
            }
        }
    }

    /// Rejects parameters that would make a step meaningless.
    pub fn validate(&self) -> ScanResult<()> {
        match self {
            ScanTransform::None => Ok(()),
            ScanTransform::StripPrefix { n } => positive("strip_prefix.n", *n),
            ScanTransform::StripSuffix { n } => positive("strip_suffix.n", *n),
            ScanTransform::Extract { len, .. } => positive("extract.len", *len),
            ScanTransform::Insert { text, .. } => {
                if text.is_empty() {
                    return Err(ValidationError::Required {
                        field: "insert.text".to_string(),
                    });
                }
                Ok(())
            }
            ScanTransform::Composite(steps) => {
                if let Some(n) = steps.strip_prefix {
                    positive("composite.strip_prefix", n)?;
                }
                if let Some(n) = steps.strip_suffix {
                    positive("composite.strip_suffix", n)?;
                }
                if let Some(ins) = &steps.insert {
                    if ins.text.is_empty() {
                        return Err(ValidationError::Required {
                            field: "composite.insert.text".to_string(),
                        });
                    }
                }
                if let Some(ext) = steps.extract {
                    positive("composite.extract.len", ext.len)?;
                }
                Ok(())
            }
        }
    }
}

// =============================================================================
// Scan Config
// =============================================================================

/// A named scan profile: the transformation plus the universal finish code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub name: String,
    #[serde(default)]
    pub transform: ScanTransform,
    /// Scanning this code completes the active package instead of resolving
    /// a component.
    #[serde(default)]
    pub finish_code: Option<String>,
}

impl ScanConfig {
    /// Profile that passes scanner text through untouched.
    pub fn passthrough(name: impl Into<String>) -> Self {
        ScanConfig {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parses and validates a stored profile.
    pub fn from_json(json: &str) -> ScanResult<Self> {
        let config: ScanConfig =
            serde_json::from_str(json).map_err(|e| ValidationError::InvalidFormat {
                field: "scan profile".to_string(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ScanResult<()> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "scan profile name".to_string(),
            });
        }
        if let Some(code) = &self.finish_code {
            if clean_raw(code).is_empty() {
                return Err(ValidationError::Required {
                    field: "finish_code".to_string(),
                });
            }
        }
        self.transform.validate()
    }

    /// Trims the raw scanner text and applies the transformation.
    pub fn resolve(&self, raw: &str) -> String {
        self.transform.apply(clean_raw(raw))
    }

    /// True when the resolved code is the configured finish code.
    pub fn is_finish_code(&self, resolved: &str) -> bool {
        self.finish_code
            .as_deref()
            .is_some_and(|finish| clean_raw(finish) == resolved)
    }
}

/// Strips the whitespace and control characters scanners wrap codes in.
pub fn clean_raw(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || c.is_control())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_prefix_scenario() {
        let transform = ScanTransform::StripPrefix { n: 2 };
        assert_eq!(transform.apply("AB1234"), "1234");
    }

    #[test]
    fn test_out_of_range_offsets_clamp() {
        assert_eq!(ScanTransform::StripPrefix { n: 10 }.apply("AB12"), "");
        assert_eq!(ScanTransform::StripSuffix { n: 10 }.apply("AB12"), "");
        assert_eq!(ScanTransform::Extract { start: 2, len: 10 }.apply("AB12"), "12");
        assert_eq!(ScanTransform::Extract { start: 9, len: 2 }.apply("AB12"), "");
        let insert = ScanTransform::Insert {
            pos: 99,
            text: "-X".to_string(),
        };
        assert_eq!(insert.apply("AB12"), "AB12-X");
    }

    #[test]
    fn test_offsets_count_characters() {
        assert_eq!(ScanTransform::StripPrefix { n: 1 }.apply("Ü123"), "123");
        assert_eq!(ScanTransform::StripSuffix { n: 1 }.apply("123é"), "123");
    }

    #[test]
    fn test_composite_runs_in_fixed_order() {
        // prefix "XX", suffix "#", then insert "0" at 0, then keep 5 chars.
        let transform = ScanTransform::Composite(CompositeTransform {
            strip_prefix: Some(2),
            strip_suffix: Some(1),
            insert: Some(Insertion {
                pos: 0,
                text: "0".to_string(),
            }),
            extract: Some(Extraction { start: 0, len: 5 }),
        });
        assert_eq!(transform.apply("XX123456#"), "01234");
    }

    #[test]
    fn test_composite_steps_toggle_independently() {
        let transform = ScanTransform::Composite(CompositeTransform {
            strip_suffix: Some(2),
            ..Default::default()
        });
        assert_eq!(transform.apply("1234ZZ"), "1234");
        assert_eq!(ScanTransform::Composite(CompositeTransform::default()).apply("abc"), "abc");
    }

    #[test]
    fn test_resolve_trims_scanner_noise() {
        let config = ScanConfig {
            name: "line-1".to_string(),
            transform: ScanTransform::StripPrefix { n: 2 },
            finish_code: Some("END".to_string()),
        };
        assert_eq!(config.resolve("  AB1234\r\n"), "1234");
        assert!(config.is_finish_code(&config.resolve("\tXXEND\n")));
        assert!(!config.is_finish_code("1234"));
    }

    #[test]
    fn test_validation_rejects_degenerate_steps() {
        assert!(ScanTransform::StripPrefix { n: 0 }.validate().is_err());
        assert!(ScanTransform::Extract { start: 0, len: 0 }.validate().is_err());
        assert!(ScanTransform::Insert {
            pos: 0,
            text: String::new()
        }
        .validate()
        .is_err());
        let composite = ScanTransform::Composite(CompositeTransform {
            strip_prefix: Some(0),
            ..Default::default()
        });
        assert!(composite.validate().is_err());
        assert!(ScanTransform::None.validate().is_ok());
    }

    #[test]
    fn test_from_json_parses_tagged_profile() {
        let json = r#"{
            "name": "cnc-line",
            "finish_code": "FINISH",
            "transform": { "kind": "composite", "strip_prefix": 2,
                           "extract": { "start": 0, "len": 4 } }
        }"#;
        let config = ScanConfig::from_json(json).unwrap();
        assert_eq!(config.resolve("AB123456"), "1234");
        assert_eq!(config.finish_code.as_deref(), Some("FINISH"));
    }

    #[test]
    fn test_from_json_validates_once_at_load() {
        let json = r#"{ "name": "bad", "transform": { "kind": "strip_prefix", "n": 0 } }"#;
        assert!(matches!(
            ScanConfig::from_json(json),
            Err(ValidationError::MustBePositive { .. })
        ));

        let json = r#"{ "name": "bad", "transform": { "kind": "rot13" } }"#;
        assert!(matches!(
            ScanConfig::from_json(json),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }
}
