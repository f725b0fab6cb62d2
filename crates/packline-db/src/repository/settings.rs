//! # Settings Repository
//!
//! Key/value settings shared with the configuration UI.
//!
//! ## Keys Read by the Core
//! ```text
//! numbering.package_prefix           ""        package number prefix
//! numbering.physical_pallet_prefix   "T"
//! numbering.virtual_pallet_prefix    "VT"
//! numbering.date_format              "%Y%m%d"
//! numbering.package_width            "4"       counter digits
//! numbering.pallet_width             "3"
//! scan.profile.<name>                JSON      ScanConfig
//! scan.active_profile                name
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use packline_core::identity::NumberFormat;
use packline_core::ScanConfig;

pub const ACTIVE_PROFILE_KEY: &str = "scan.active_profile";
pub const PROFILE_KEY_PREFIX: &str = "scan.profile.";

pub(crate) async fn get_in(conn: &mut SqliteConnection, key: &str) -> DbResult<Option<String>> {
    let value = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?1")
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(value)
}

fn parse_width(key: &'static str, raw: &str) -> DbResult<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| DbError::corrupt("settings", key, raw))
}

/// Reads the numbering templates, filling unset keys with defaults.
pub(crate) async fn number_format(conn: &mut SqliteConnection) -> DbResult<NumberFormat> {
    let mut format = NumberFormat::default();

    if let Some(v) = get_in(conn, "numbering.package_prefix").await? {
        format.package_prefix = v;
    }
    if let Some(v) = get_in(conn, "numbering.physical_pallet_prefix").await? {
        format.physical_pallet_prefix = v;
    }
    if let Some(v) = get_in(conn, "numbering.virtual_pallet_prefix").await? {
        format.virtual_pallet_prefix = v;
    }
    if let Some(v) = get_in(conn, "numbering.date_format").await? {
        format.date_format = v;
    }
    if let Some(v) = get_in(conn, "numbering.package_width").await? {
        format.package_width = parse_width("numbering.package_width", &v)?;
    }
    if let Some(v) = get_in(conn, "numbering.pallet_width").await? {
        format.pallet_width = parse_width("numbering.pallet_width", &v)?;
    }

    format
        .validate()
        .map_err(|e| DbError::corrupt("settings", "numbering", e.to_string()))?;
    Ok(format)
}

/// Key/value access to the `settings` table.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let mut conn = self.pool.acquire().await?;
        get_in(&mut conn, key).await
    }

    /// Inserts or replaces a value.
    pub async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        debug!(key = %key, "Writing setting");

        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn number_format(&self) -> DbResult<NumberFormat> {
        let mut conn = self.pool.acquire().await?;
        number_format(&mut conn).await
    }

    /// Name of the profile the scan station uses by default.
    pub async fn active_profile_name(&self) -> DbResult<Option<String>> {
        self.get(ACTIVE_PROFILE_KEY).await
    }

    pub async fn set_active_profile(&self, name: &str) -> DbResult<()> {
        self.set(ACTIVE_PROFILE_KEY, name).await
    }

    /// Validates and stores a scan profile under `scan.profile.<name>`.
    pub async fn save_scan_profile(&self, profile: &ScanConfig) -> DbResult<()> {
        profile.validate()?;
        let json = serde_json::to_string(profile).map_err(|e| DbError::Internal(e.to_string()))?;
        self.set(&format!("{PROFILE_KEY_PREFIX}{}", profile.name), &json)
            .await
    }

    /// Loads a scan profile by name.
    ///
    /// A missing profile yields a passthrough profile with no finish code.
    /// A stored profile that fails to parse or validate is logged and also
    /// replaced by passthrough, so a bad setting never stops the station.
    pub async fn load_scan_profile(&self, name: &str) -> DbResult<ScanConfig> {
        let key = format!("{PROFILE_KEY_PREFIX}{name}");
        match self.get(&key).await? {
            None => {
                debug!(profile = %name, "Scan profile not found, using passthrough");
                Ok(ScanConfig::passthrough(name))
            }
            Some(json) => match ScanConfig::from_json(&json) {
                Ok(profile) => Ok(profile),
                Err(e) => {
                    warn!(profile = %name, error = %e, "Invalid stored scan profile, using passthrough");
                    Ok(ScanConfig::passthrough(name))
                }
            },
        }
    }

    /// Names of all stored scan profiles.
    pub async fn scan_profile_names(&self) -> DbResult<Vec<String>> {
        let keys: Vec<String> =
            sqlx::query_scalar("SELECT key FROM settings WHERE key LIKE 'scan.profile.%' ORDER BY key")
                .fetch_all(&self.pool)
                .await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(PROFILE_KEY_PREFIX).map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use packline_core::ScanTransform;

    #[tokio::test]
    async fn test_default_number_format_from_migration() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let format = db.settings().number_format().await.unwrap();
        assert_eq!(format, NumberFormat::default());
    }

    #[tokio::test]
    async fn test_bad_width_is_corrupt() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.settings().set("numbering.package_width", "four").await.unwrap();
        let err = db.settings().number_format().await.unwrap_err();
        assert!(matches!(err, DbError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_time_of_day_date_format_is_corrupt() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.settings().set("numbering.date_format", "%Y%m%d%H").await.unwrap();
        let err = db.settings().number_format().await.unwrap_err();
        assert!(matches!(err, DbError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_profile_round_trip_and_fallback() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let profile = ScanConfig {
            name: "cnc".to_string(),
            transform: ScanTransform::StripPrefix { n: 2 },
            finish_code: Some("FINISH".to_string()),
        };
        db.settings().save_scan_profile(&profile).await.unwrap();
        assert_eq!(db.settings().load_scan_profile("cnc").await.unwrap(), profile);

        let missing = db.settings().load_scan_profile("nope").await.unwrap();
        assert_eq!(missing, ScanConfig::passthrough("nope"));

        db.settings()
            .set("scan.profile.broken", r#"{"name":"broken","transform":{"kind":"strip_prefix","n":0}}"#)
            .await
            .unwrap();
        let broken = db.settings().load_scan_profile("broken").await.unwrap();
        assert_eq!(broken.transform, ScanTransform::None);

        let rejected = ScanConfig {
            name: "zero".to_string(),
            transform: ScanTransform::StripPrefix { n: 0 },
            finish_code: None,
        };
        let err = db.settings().save_scan_profile(&rejected).await.unwrap_err();
        assert!(matches!(err, DbError::Invalid(_)));
        assert!(db.settings().get("scan.profile.zero").await.unwrap().is_none());

        let names = db.settings().scan_profile_names().await.unwrap();
        assert!(names.contains(&"cnc".to_string()));
        assert!(names.contains(&"default".to_string()));
    }
}
