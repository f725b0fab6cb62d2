//! # Scan Pipeline
//!
//! Turns raw scanner text into a lifecycle action against the active package.
//!
//! ## Resolution Order
//! ```text
//! raw "  AB1234\r\n"
//!      │ trim whitespace / control chars
//!      ▼
//! "AB1234" ──profile transform──► "1234"
//!      │
//!      ├── == finish code ?           ──► complete active package
//!      ├── empty / unknown in order ? ──► InvalidScan("1234")
//!      ├── already in a package ?     ──► DuplicateScan{code, package}
//!      └── attach (method checked)    ──► ComponentScanned
//! ```
//! Every branch runs in one transaction. A rejected scan leaves the store
//! untouched and pushes nothing onto the undo stack.

use chrono::Utc;
use tracing::{debug, info};

use crate::error::EngineResult;
use crate::lifecycle::{attach_in, complete_in, load_package, Journal, LifecycleEngine};
use crate::repository::settings::SettingsRepository;
use crate::repository::{component, package as package_repo};
use crate::undo::UndoManager;
use packline_core::{Component, CoreError, LifecycleEvent, Operation, Package, ScanConfig};

/// Profile used when neither the caller nor the settings name one.
pub const DEFAULT_PROFILE: &str = "default";

/// What a successful scan did.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// The component went into the package.
    Attached {
        package: Package,
        component: Component,
    },
    /// The finish code completed the package.
    Completed(Package),
}

/// A scan station bound to one scan profile.
#[derive(Debug, Clone)]
pub struct ScanPipeline {
    engine: LifecycleEngine,
    config: ScanConfig,
}

impl ScanPipeline {
    /// Builds a pipeline from an explicit profile, validating it first.
    pub fn new(engine: LifecycleEngine, config: ScanConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(ScanPipeline { engine, config })
    }

    /// Builds a pipeline from a stored profile.
    ///
    /// `name` wins over the `scan.active_profile` setting, which wins over
    /// [`DEFAULT_PROFILE`].
    pub async fn load(
        engine: LifecycleEngine,
        settings: &SettingsRepository,
        name: Option<&str>,
    ) -> EngineResult<Self> {
        let name = match name {
            Some(n) => n.to_string(),
            None => settings
                .active_profile_name()
                .await?
                .unwrap_or_else(|| DEFAULT_PROFILE.to_string()),
        };
        let config = settings.load_scan_profile(&name).await?;
        info!(profile = %config.name, transform = ?config.transform, "Scan profile loaded");
        Ok(ScanPipeline { engine, config })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Processes one scanner read against `package_id`.
    pub async fn scan(
        &self,
        undo: &mut UndoManager,
        package_id: &str,
        raw: &str,
    ) -> EngineResult<ScanOutcome> {
        let code = self.config.resolve(raw);
        debug!(raw = %raw.escape_debug(), code = %code, "Scan received");

        let mut tx = self.engine.begin().await?;
        let package = load_package(&mut tx, package_id).await?;
        let mut journal = Journal::default();

        if self.config.is_finish_code(&code) {
            let package = complete_in(&mut tx, &package.id).await?;
            journal.log(
                Operation::CompletePackage {
                    package_id: package.id.clone(),
                },
                format!("Completed package {} by finish code", package.package_number),
            );
            journal.emit(LifecycleEvent::PackageCompleted {
                order_id: package.order_id.clone(),
                package_id: package.id.clone(),
            });
            self.engine.commit(tx, undo, journal).await?;

            info!(package = %package.package_number, count = package.component_count, "Package completed by scan");
            return Ok(ScanOutcome::Completed(package));
        }

        if code.is_empty() {
            return Err(CoreError::InvalidScan(code).into());
        }
        let Some(found) = component::fetch_by_code_in_order(&mut tx, &package.order_id, &code).await?
        else {
            return Err(CoreError::InvalidScan(code).into());
        };

        if let Some(owner_id) = &found.package_id {
            let package_number = package_repo::fetch(&mut tx, owner_id)
                .await?
                .map(|p| p.package_number)
                .unwrap_or_else(|| owner_id.clone());
            return Err(CoreError::DuplicateScan {
                code,
                package_number,
            }
            .into());
        }

        let (package, component) = attach_in(&mut tx, package, found, Some(Utc::now())).await?;

        journal.log(
            Operation::ScanComponent {
                component_id: component.id.clone(),
                package_id: package.id.clone(),
            },
            format!("Scanned {} into package {}", component.code, package.package_number),
        );
        journal.emit(LifecycleEvent::ComponentScanned {
            order_id: package.order_id.clone(),
            package_id: package.id.clone(),
            component_id: component.id.clone(),
        });
        self.engine.commit(tx, undo, journal).await?;

        info!(code = %component.code, package = %package.package_number, count = package.component_count, "Component scanned");
        Ok(ScanOutcome::Attached { package, component })
    }
}
