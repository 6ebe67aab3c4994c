//! # Seed Data Generator
//!
//! Populates a database with a sample store catalog for development.
//!
//! ## Usage
//! ```bash
//! # Generate the full catalog (default)
//! cargo run -p till-db --bin seed
//!
//! # Generate a smaller catalog
//! cargo run -p till-db --bin seed -- --count 50
//!
//! # Specify database path
//! cargo run -p till-db --bin seed -- --db ./data/till.db
//! ```
//!
//! ## Generated Products
//! - Code: `780` + zero-padded sequence (13 digits, EAN-shaped)
//! - Name: base product + package size
//! - Price: $490 - $8.990 (whole pesos)
//! - Stock: 0 - 60, so some rows show up as low stock
//! - Perishable categories get an expiry 3 - 90 days out

use std::env;

use chrono::{Duration, Utc};
use till_core::{Money, Product};
use till_db::{Database, DbConfig, ProductCatalog};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (category, perishable, base products)
const CATEGORIES: &[(&str, bool, &[&str])] = &[
    (
        "Bebidas",
        false,
        &["Bebida Cola", "Agua Mineral", "Jugo Naranja", "Néctar Durazno", "Té Helado"],
    ),
    (
        "Lácteos",
        true,
        &["Leche Entera", "Leche Descremada", "Yogurt Frutilla", "Queso Gauda", "Mantequilla"],
    ),
    (
        "Panadería",
        true,
        &["Pan Molde", "Hallulla", "Marraqueta", "Queque Vainilla", "Tortillas"],
    ),
    (
        "Almacén",
        false,
        &["Arroz Grado 1", "Fideos Spaghetti", "Aceite Maravilla", "Azúcar", "Harina"],
    ),
    (
        "Limpieza",
        false,
        &["Detergente", "Lavalozas", "Cloro", "Papel Higiénico", "Esponja"],
    ),
];

const SIZES: &[(&str, i64)] = &[("Chico", 0), ("Mediano", 600), ("Grande", 1400), ("Pack", 3200)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = usize::MAX;
    let mut db_path = String::from("./till_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(count);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Till POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: all)");
                println!("  -d, --db <PATH>    Database file path (default: ./till_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, "Seeding catalog");

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let catalog = db.products();

    let existing = catalog.list().await?.len();
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut generated = 0usize;
    let mut seq = 0usize;

    'outer: for (category, perishable, names) in CATEGORIES {
        for name in names.iter() {
            for (size, price_addon) in SIZES {
                if generated >= count {
                    break 'outer;
                }
                seq += 1;

                let product = generate_product(category, *perishable, name, size, *price_addon, seq);
                if let Err(e) = catalog.insert(&product).await {
                    warn!(code = %product.code, error = %e, "Failed to insert product");
                    continue;
                }
                generated += 1;
            }
        }
    }

    let low = catalog.low_stock(5).await?.len();
    info!(
        generated,
        low_stock = low,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Seed complete"
    );

    Ok(())
}

/// Generates a single product with deterministic, realistic data.
fn generate_product(
    category: &str,
    perishable: bool,
    name: &str,
    size: &str,
    price_addon: i64,
    seq: usize,
) -> Product {
    // $490 - $5.790 base, rounded to $10
    let base_price = 490 + ((seq * 170) % 5300) as i64;
    let unit_price = Money::from_units((base_price + price_addon) / 10 * 10);

    let expiry = perishable.then(|| {
        let days = 3 + (seq * 7 % 88) as i64;
        (Utc::now() + Duration::days(days)).date_naive()
    });

    Product {
        code: format!("780{:010}", seq),
        name: format!("{} {}", name, size),
        category: category.to_string(),
        unit_price,
        stock: (seq * 13 % 61) as i64,
        expiry,
    }
}
