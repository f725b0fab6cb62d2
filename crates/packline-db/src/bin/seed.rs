//! # Seed Data Generator
//!
//! Creates a demo order with cut parts spread over rooms and cabinets, plus
//! a few scan profiles, so the scan console has something to work on.
//!
//! ## Usage
//! ```bash
//! # Seed the database named in packline.toml
//! cargo run -p packline-db --bin seed
//!
//! # Specify database path and order name
//! cargo run -p packline-db --bin seed -- --db ./data/line2.db --order "Kitchen Smith"
//! ```
//!
//! ## Generated Parts
//! Codes are `{ROOM}{CABINET}-{PART}`, e.g. `KIT01-03`. Every room has a few
//! cabinets, every cabinet the usual carcass parts (sides, top, bottom,
//! back, shelves, doors).

use chrono::Utc;
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use packline_core::{Component, ComponentStatus, ScanConfig, ScanTransform};
use packline_db::{Database, PacklineConfig};

/// Rooms and the cabinets in them.
const ROOMS: &[(&str, &str, &[&str])] = &[
    ("KIT", "Kitchen", &["01", "02", "03", "04"]),
    ("BTH", "Bathroom", &["01", "02"]),
    ("WRD", "Wardrobe", &["01", "02", "03"]),
];

/// Carcass parts: name and (length, width) in mm.
const PARTS: &[(&str, f64, f64)] = &[
    ("Side left", 720.0, 560.0),
    ("Side right", 720.0, 560.0),
    ("Top", 564.0, 560.0),
    ("Bottom", 564.0, 560.0),
    ("Back", 716.0, 596.0),
    ("Shelf", 562.0, 520.0),
    ("Door", 716.0, 596.0),
];

const MATERIALS: &[&str] = &["MDF 18 white", "Chipboard 18 oak", "HDF 3 white"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut order_name = String::from("Demo Kitchen");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--order" | "-o" => {
                if i + 1 < args.len() {
                    order_name = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Packline Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: from packline.toml)");
                println!("  -o, --order <NAME>   Name of the demo order (default: Demo Kitchen)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = PacklineConfig::load(None)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }
    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    println!("Packline Seed Data Generator");
    println!("============================");
    println!("Database: {}", config.database.path.display());
    println!("Order:    {}", order_name);
    println!();

    let db = Database::new(config.db_config()).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Scan profiles
    let profiles = [
        ScanConfig {
            name: "default".to_string(),
            transform: ScanTransform::None,
            finish_code: Some("FINISH".to_string()),
        },
        ScanConfig {
            name: "cnc-prefixed".to_string(),
            transform: ScanTransform::StripPrefix { n: 2 },
            finish_code: Some("FINISH".to_string()),
        },
    ];
    for profile in &profiles {
        db.settings().save_scan_profile(profile).await?;
    }
    println!("✓ Saved {} scan profiles", profiles.len());

    // Order and components
    let order = db.orders().create(&order_name).await?;
    let start = std::time::Instant::now();
    let mut generated = 0usize;

    for (room_code, room_name, cabinets) in ROOMS {
        for cabinet in cabinets.iter() {
            for (part_idx, (part, length, width)) in PARTS.iter().enumerate() {
                let component = Component {
                    id: Uuid::new_v4().to_string(),
                    order_id: order.id.clone(),
                    code: format!("{room_code}{cabinet}-{:02}", part_idx + 1),
                    name: format!("{room_name} {cabinet} {part}"),
                    material: Some(MATERIALS[(generated + part_idx) % MATERIALS.len()].to_string()),
                    length_mm: *length,
                    width_mm: *width,
                    thickness_mm: if *part == "Back" { 3.0 } else { 18.0 },
                    room: Some(room_name.to_string()),
                    cabinet: Some(format!("{room_code}{cabinet}")),
                    package_id: None,
                    status: ComponentStatus::Pending,
                    scanned_at: None,
                    created_at: Utc::now(),
                };

                if let Err(e) = db.components().insert(&component).await {
                    eprintln!("Failed to insert {}: {}", component.code, e);
                    continue;
                }
                generated += 1;
            }
        }
    }

    info!(order_id = %order.id, components = generated, "Demo order seeded");

    println!();
    println!("✓ Generated {} components in {:?}", generated, start.elapsed());
    println!("  Order id: {}", order.id);
    println!();
    println!("Try: scan-console --order {}", order.id);

    Ok(())
}
