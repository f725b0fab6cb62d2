//! Fixtures shared by the unit tests.

use chrono::Utc;
use uuid::Uuid;

use crate::pool::Database;
use packline_core::{Component, ComponentStatus};

/// Imports one pending component into `order_id`.
pub(crate) async fn component(
    db: &Database,
    order_id: &str,
    code: &str,
    room: Option<&str>,
    cabinet: Option<&str>,
) -> Component {
    let c = Component {
        id: Uuid::new_v4().to_string(),
        order_id: order_id.to_string(),
        code: code.to_string(),
        name: format!("Part {code}"),
        material: Some("MDF 18".to_string()),
        length_mm: 720.0,
        width_mm: 560.0,
        thickness_mm: 18.0,
        room: room.map(str::to_string),
        cabinet: cabinet.map(str::to_string),
        package_id: None,
        status: ComponentStatus::Pending,
        scanned_at: None,
        created_at: Utc::now(),
    };
    db.components().insert(&c).await.unwrap();
    c
}
