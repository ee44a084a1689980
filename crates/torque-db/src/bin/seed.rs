//! # Seed Data Generator
//!
//! Populates a database with an auto-parts catalog for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./torque_dev.db
//! cargo run -p torque-db --bin seed
//!
//! # Specify database path
//! cargo run -p torque-db --bin seed -- --db ./data/torque.db
//! ```
//!
//! ## Generated Data
//! - Categories: brakes, filters, ignition, suspension, lighting
//! - Two stores, three suppliers, three customers
//! - Parts with SKU, price, cost and reorder level
//!
//! Opening stock is booked through completed purchase invoices, never by
//! writing stock rows directly, so every quantity has a journal behind it
//! and every supplier balance equals its entries.

use std::env;

use torque_core::{
    CounterpartyDetails, CounterpartyKind, InvoiceHeader, InvoiceLine, InvoiceStatus, NewProduct,
    PaymentMethod, PaymentType, ReportFilter,
};
use torque_db::{Database, DbConfig};

/// (category, [(sku, name, price_cents, cost_cents, reorder_level)])
const CATALOG: &[(&str, &[(&str, &str, i64, i64, i64)])] = &[
    (
        "Brakes",
        &[
            ("BRK-PAD-0412", "Front Brake Pad Set", 4_599, 2_750, 6),
            ("BRK-PAD-0518", "Rear Brake Pad Set", 3_899, 2_300, 6),
            ("BRK-ROT-2204", "Vented Brake Rotor 280mm", 6_950, 4_100, 4),
            ("BRK-FLD-0001", "DOT 4 Brake Fluid 1L", 1_299, 650, 10),
        ],
    ),
    (
        "Filters",
        &[
            ("FLT-OIL-0130", "Oil Filter", 899, 420, 20),
            ("FLT-AIR-0877", "Engine Air Filter", 1_850, 900, 10),
            ("FLT-CAB-0311", "Cabin Pollen Filter", 1_499, 700, 8),
            ("FLT-FUE-0092", "Inline Fuel Filter", 2_199, 1_150, 5),
        ],
    ),
    (
        "Ignition",
        &[
            ("IGN-SPK-7090", "Iridium Spark Plug", 1_099, 520, 24),
            ("IGN-COL-3321", "Ignition Coil Pack", 5_499, 3_200, 4),
            ("IGN-LDS-0450", "Spark Plug Lead Set", 3_250, 1_800, 3),
        ],
    ),
    (
        "Suspension",
        &[
            ("SUS-SHK-5510", "Gas Shock Absorber", 8_990, 5_400, 4),
            ("SUS-STR-1202", "Front Strut Assembly", 14_500, 9_100, 2),
            ("SUS-BSH-0076", "Sway Bar Bushing Kit", 1_790, 850, 6),
        ],
    ),
    (
        "Lighting",
        &[
            ("LGT-H7B-0055", "H7 Halogen Bulb Pair", 1_599, 780, 12),
            ("LGT-LED-0901", "LED Tail Light Unit", 7_400, 4_350, 2),
        ],
    ),
];

const STORES: &[&str] = &["Main Street", "Westside Depot"];

const SUPPLIERS: &[(&str, &str)] = &[
    ("Bosch Distribution", "+1-555-0140"),
    ("Denso Parts Supply", "+1-555-0177"),
    ("Monroe Wholesale", "+1-555-0193"),
];

const CUSTOMERS: &[(&str, &str)] = &[
    ("Joe's Garage", "+1-555-0101"),
    ("Fleet Motors", "+1-555-0112"),
    ("Walk-in Customer", ""),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./torque_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Torque Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./torque_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Torque Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();

    // Stores and counterparties
    let mut stores = Vec::new();
    for name in STORES {
        stores.push(db.catalog().create_store(name).await?);
    }

    let mut suppliers = Vec::new();
    for (name, phone) in SUPPLIERS {
        suppliers.push(
            db.counterparties()
                .insert(CounterpartyKind::Supplier, &details(name, phone))
                .await?,
        );
    }

    let mut customers = Vec::new();
    for (name, phone) in CUSTOMERS {
        customers.push(
            db.counterparties()
                .insert(CounterpartyKind::Customer, &details(name, phone))
                .await?,
        );
    }
    println!(
        "✓ {} stores, {} suppliers, {} customers",
        stores.len(),
        suppliers.len(),
        customers.len()
    );

    // Catalog
    let mut parts = Vec::new();
    for (category_name, items) in CATALOG {
        let category = db.catalog().create_category(category_name).await?;
        for (sku, name, price_cents, cost_cents, reorder_level) in items.iter() {
            let product = db
                .products()
                .insert(&NewProduct {
                    sku: sku.to_string(),
                    name: name.to_string(),
                    category_id: Some(category.id.clone()),
                    price_cents: *price_cents,
                    cost_cents: Some(*cost_cents),
                    reorder_level: *reorder_level,
                    allow_backorder: false,
                })
                .await?;
            parts.push(product);
        }
    }
    println!("✓ {} parts in {} categories", parts.len(), CATALOG.len());

    // Opening stock: one completed purchase per store and supplier. Parts
    // are spread round-robin over suppliers; quantities vary so the report
    // shows every stock level.
    let mut purchases = 0;
    for (store_idx, store) in stores.iter().enumerate() {
        for (supplier_idx, supplier) in suppliers.iter().enumerate() {
            let lines: Vec<InvoiceLine> = parts
                .iter()
                .enumerate()
                .filter(|(idx, _)| idx % suppliers.len() == supplier_idx)
                .filter_map(|(idx, part)| {
                    let quantity = ((idx * 7 + store_idx * 3) % 30) as i64;
                    (quantity > 0).then(|| {
                        InvoiceLine::new(&part.id, quantity, part.cost_cents.unwrap_or(0))
                    })
                })
                .collect();
            if lines.is_empty() {
                continue;
            }

            let payment_type = if supplier_idx == 0 {
                PaymentType::Credit
            } else {
                PaymentType::Cash
            };
            db.purchases()
                .create(
                    InvoiceHeader {
                        code: None,
                        counterparty_id: supplier.id.clone(),
                        store_id: store.id.clone(),
                        sale_type: None,
                        payment_type,
                        payment_method: PaymentMethod::Bank,
                        notes: Some("Opening stock".to_string()),
                    },
                    lines,
                    InvoiceStatus::Completed,
                )
                .await?;
            purchases += 1;
        }
    }
    println!("✓ {} opening-stock purchases", purchases);

    // A couple of sales at the main store: one completed on credit, one
    // still pending.
    let main_store = &stores[0];
    let sale_lines: Vec<InvoiceLine> = parts
        .iter()
        .skip(1)
        .take(3)
        .map(|p| InvoiceLine::new(&p.id, 1, p.price_cents))
        .collect();
    let completed = db
        .sales()
        .create(
            InvoiceHeader {
                code: None,
                counterparty_id: customers[0].id.clone(),
                store_id: main_store.id.clone(),
                sale_type: None,
                payment_type: PaymentType::Credit,
                payment_method: PaymentMethod::Cash,
                notes: None,
            },
            sale_lines.clone(),
            InvoiceStatus::Completed,
        )
        .await;
    match completed {
        Ok(invoice) => println!(
            "✓ Sale {} completed ({} cents on account)",
            invoice.code,
            invoice.computed_total().cents()
        ),
        Err(e) => eprintln!("Failed to complete demo sale: {}", e),
    }

    db.sales()
        .create(
            InvoiceHeader {
                code: None,
                counterparty_id: customers[1].id.clone(),
                store_id: main_store.id.clone(),
                sale_type: None,
                payment_type: PaymentType::Cash,
                payment_method: PaymentMethod::Cash,
                notes: Some("Awaiting pickup".to_string()),
            },
            sale_lines,
            InvoiceStatus::Pending,
        )
        .await?;
    println!("✓ Pending sale created");

    let elapsed = start.elapsed();
    let report = db.inventory_reports().report(&ReportFilter::default()).await?;

    println!();
    println!("Inventory summary:");
    println!("{}", serde_json::to_string_pretty(&report.summary)?);
    println!();
    println!("✓ Seed complete in {:?}", elapsed);

    Ok(())
}

fn details(name: &str, phone: &str) -> CounterpartyDetails {
    CounterpartyDetails {
        name: name.to_string(),
        phone: (!phone.is_empty()).then(|| phone.to_string()),
        email: None,
    }
}
