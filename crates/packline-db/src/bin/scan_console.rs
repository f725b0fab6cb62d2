//! # Scan Console
//!
//! Emulates a scan station on stdin: one scanner read per line, fed through
//! the scan pipeline against the active package.
//!
//! ## Usage
//! ```bash
//! cargo run -p packline-db --bin scan-console -- --order <ORDER_ID>
//! printf ':new by_room\nKIT01-01\nKIT01-02\nFINISH\n' | scan-console --db line2.db
//! ```
//!
//! ## Commands
//! ```text
//! :new [method]   open a new package (by_room | by_cabinet | mixed)
//! :finish         complete the active package
//! :undo           revert the last operation
//! :history        show the last ten log entries
//! :quit           leave
//! anything else   treated as scanner input
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use packline_core::{LifecycleEvent, LifecycleObserver, Package, PackingMethod};
use packline_db::{Database, EngineError, PacklineConfig, ScanOutcome, ScanPipeline};

/// Prints lifecycle events the way a packing screen would react to them.
struct ConsoleObserver;

impl LifecycleObserver for ConsoleObserver {
    fn on_event(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::ComponentScanned { component_id, .. } => {
                println!("  ↳ event: component {component_id} scanned")
            }
            LifecycleEvent::PackageCompleted { package_id, .. } => {
                println!("  ↳ event: package {package_id} completed (print label)")
            }
            LifecycleEvent::ComponentsDetached { component_ids, .. } => {
                println!("  ↳ event: {} component(s) back to pending", component_ids.len())
            }
        }
    }
}

fn report(err: &EngineError) {
    if err.is_recoverable() {
        println!("✗ {err}");
    } else {
        eprintln!("✗ store error: {err}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut order_id: Option<String> = None;
    let mut profile: Option<String> = None;

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
                    order_id = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--profile" | "-p" => {
                if i + 1 < args.len() {
                    profile = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Packline Scan Console");
                println!();
                println!("Usage: scan-console [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: from packline.toml)");
                println!("  -o, --order <ID>       Order to pack (default: newest order)");
                println!("  -p, --profile <NAME>   Scan profile (default: scan.active_profile)");
                println!("  -h, --help             Show this help message");
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
    if profile.is_some() {
        config.scan.profile = profile;
    }

    let db = Database::new(config.db_config()).await?;
    let order = match order_id {
        Some(id) => db.orders().get(&id).await?,
        None => db.orders().list().await?.into_iter().next(),
    };
    let Some(order) = order else {
        eprintln!("No order found. Run `seed` first or pass --order.");
        return Ok(());
    };

    let engine = db.engine().with_observer(Arc::new(ConsoleObserver));
    let mut undo = engine.undo_manager(config.undo.capacity);
    let pipeline = ScanPipeline::load(engine.clone(), &db.settings(), config.scan.profile.as_deref()).await?;

    info!(order = %order.name, profile = %pipeline.config().name, "Scan console ready");
    println!("Order {} ({} pending parts)", order.name, db.components().count_pending(&order.id).await?);
    println!("Profile '{}'. Type :new to open a package.", pipeline.config().name);

    let mut active: Option<Package> = None;
    let mut lines = BufReader::new(io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut words = input.split_whitespace();
        match words.next().unwrap_or_default() {
            ":quit" | ":q" => break,

            ":new" => {
                let method = match words.next().map(str::parse::<PackingMethod>) {
                    None => PackingMethod::Mixed,
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        println!("✗ {e}");
                        continue;
                    }
                };
                match engine.create_package(&mut undo, &order.id, method, false).await {
                    Ok(pkg) => {
                        println!("✓ Package {} (#{}, {})", pkg.package_number, pkg.sequence_index, method);
                        active = Some(pkg);
                    }
                    Err(e) => report(&e),
                }
            }

            ":finish" => {
                let Some(pkg) = &active else {
                    println!("✗ No active package");
                    continue;
                };
                match engine.complete_package(&mut undo, &pkg.id).await {
                    Ok(done) => {
                        println!("✓ Package {} completed with {} parts", done.package_number, done.component_count);
                        active = None;
                    }
                    Err(e) => report(&e),
                }
            }

            ":undo" => match undo.undo().await {
                Ok(Some(entry)) => println!("↶ Undone: {}", entry.entry.description),
                Ok(None) => println!("Nothing to undo"),
                Err(e) => report(&e),
            },

            ":history" => match undo.history(10).await {
                Ok(entries) => {
                    for e in entries {
                        println!("  {} {:<28} {}", e.created_at.format("%H:%M:%S"), e.op_type, e.description);
                    }
                }
                Err(e) => report(&e),
            },

            _ => {
                let Some(pkg) = &active else {
                    println!("✗ No active package; type :new first");
                    continue;
                };
                match pipeline.scan(&mut undo, &pkg.id, &line).await {
                    Ok(ScanOutcome::Attached { package, component }) => {
                        println!("✓ {} → {} ({} parts)", component.code, package.package_number, package.component_count);
                        active = Some(package);
                    }
                    Ok(ScanOutcome::Completed(package)) => {
                        println!("✓ Package {} completed with {} parts", package.package_number, package.component_count);
                        active = None;
                    }
                    Err(e) => report(&e),
                }
            }
        }
    }

    db.close().await;
    Ok(())
}
