//! # Seed Data Generator
//!
//! Creates a platform database with a superadmin and, optionally, a demo
//! vendor whose shop database is stocked with stationery and books.
//!
//! ## Usage
//! ```bash
//! # Superadmin only
//! cargo run -p kirana-db --bin seed
//!
//! # Superadmin plus a demo vendor "demo" (owner demo@kirana.local)
//! cargo run -p kirana-db --bin seed -- --demo
//!
//! # Custom locations and password
//! cargo run -p kirana-db --bin seed -- --db ./data/platform.sqlite3 \
//!     --tenant-dir ./data/tenant_dbs --password s3cret
//! ```

use kirana_core::{AccessFlags, CategoryType, Role};
use kirana_db::{
    CategoryInput, DbConfig, NewTenant, NewUser, PlatformDb, ProductInput, TenantRegistry,
};
use std::env;

/// Demo catalogue: (category, type, [(sku, name, price in paisa, stock)]).
const CATALOGUE: &[(&str, CategoryType, &[(&str, &str, i64, i64)])] = &[
    (
        "Pens & Pencils",
        CategoryType::Stationery,
        &[
            ("PEN-BL", "Ball Pen Blue", 1_500, 200),
            ("PEN-BK", "Ball Pen Black", 1_500, 150),
            ("PEN-GEL", "Gel Pen", 3_000, 80),
            ("PCL-HB", "Pencil HB", 1_000, 300),
            ("ERS-01", "Eraser", 500, 8),
        ],
    ),
    (
        "Notebooks",
        CategoryType::Stationery,
        &[
            ("NB-A4-200", "A4 Notebook 200 pages", 12_000, 60),
            ("NB-A5-100", "A5 Notebook 100 pages", 6_000, 90),
            ("NB-DRAW", "Drawing Copy", 8_000, 5),
        ],
    ),
    (
        "Textbooks",
        CategoryType::Books,
        &[
            ("TXT-MATH-10", "Mathematics Grade 10", 45_000, 20),
            ("TXT-SCI-10", "Science Grade 10", 42_000, 15),
            ("TXT-NEP-10", "Nepali Grade 10", 30_000, 3),
        ],
    ),
    (
        "Novels",
        CategoryType::Books,
        &[
            ("NOV-MUNA", "Muna Madan", 25_000, 12),
            ("NOV-PALPASA", "Palpasa Cafe", 55_000, 7),
        ],
    ),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = "./platform.sqlite3".to_string();
    let mut tenant_dir = "./tenant_dbs".to_string();
    let mut username = "superadmin".to_string();
    let mut password = "admin123".to_string();
    let mut demo = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--tenant-dir" | "-t" => {
                if i + 1 < args.len() {
                    tenant_dir = args[i + 1].clone();
                    i += 1;
                }
            }
            "--username" | "-u" => {
                if i + 1 < args.len() {
                    username = args[i + 1].clone();
                    i += 1;
                }
            }
            "--password" | "-p" => {
                if i + 1 < args.len() {
                    password = args[i + 1].clone();
                    i += 1;
                }
            }
            "--demo" => demo = true,
            "--help" | "-h" => {
                println!("Kirana POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>          Platform database (default: ./platform.sqlite3)");
                println!("  -t, --tenant-dir <DIR>   Tenant database directory (default: ./tenant_dbs)");
                println!("  -u, --username <NAME>    Superadmin username (default: superadmin)");
                println!("  -p, --password <PASS>    Password for seeded accounts (default: admin123)");
                println!("      --demo               Also create the demo vendor");
                println!("  -h, --help               Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Kirana POS Seed Data Generator");
    println!("=================================");
    println!("Platform database: {}", db_path);
    println!("Tenant directory:  {}", tenant_dir);
    println!();

    let platform = PlatformDb::open(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to platform database");
    println!("✓ Migrations applied");

    let users = platform.users();
    if users.login_taken(&username).await? {
        println!("⚠ User '{}' already exists, skipping superadmin", username);
    } else {
        users
            .create(&NewUser {
                username: username.clone(),
                email: format!("{}@kirana.local", username.to_lowercase()),
                password: password.clone(),
                role: Role::Superadmin,
                ..Default::default()
            })
            .await?;
        println!("✓ Superadmin '{}' created", username);
    }

    if demo {
        seed_demo_vendor(&platform, &TenantRegistry::new(&tenant_dir), &password).await?;
    }

    platform.database().close().await;
    println!();
    println!("✓ Seed complete!");
    Ok(())
}

/// Creates the vendor `demo` with its owner, tenant admin and catalogue.
async fn seed_demo_vendor(
    platform: &PlatformDb,
    registry: &TenantRegistry,
    password: &str,
) -> anyhow::Result<()> {
    const CODE: &str = "demo";
    const OWNER_EMAIL: &str = "demo@kirana.local";

    println!();
    if platform.tenants().code_exists(CODE).await? {
        println!("⚠ Vendor '{}' already exists, skipping demo data", CODE);
        return Ok(());
    }

    let tenant = platform
        .tenants()
        .create(&NewTenant {
            name: "Demo Stationery & Books".to_string(),
            code: CODE.to_string(),
            owner_email: OWNER_EMAIL.to_string(),
            db_name: None,
            access: AccessFlags::default(),
        })
        .await?;
    let owner = platform
        .users()
        .create(&NewUser {
            username: CODE.to_string(),
            email: OWNER_EMAIL.to_string(),
            password: password.to_string(),
            role: Role::TenantAdmin,
            tenant_id: Some(tenant.id),
            ..Default::default()
        })
        .await?;
    platform.tenants().set_admin_user(tenant.id, owner.id).await?;
    println!("✓ Vendor '{}' created (owner {})", CODE, OWNER_EMAIL);

    let path = registry.provision(&tenant).await?;
    let shop = registry.migrate(&tenant).await?;
    println!("✓ Shop database ready at {}", path.display());

    let admin = shop
        .users()
        .create(&NewUser {
            username: CODE.to_string(),
            email: OWNER_EMAIL.to_string(),
            password: password.to_string(),
            role: Role::TenantAdmin,
            ..Default::default()
        })
        .await?;

    let mut generated = 0;
    for (category_name, category_type, products) in CATALOGUE {
        let category = shop
            .categories()
            .create(&CategoryInput {
                name: category_name.to_string(),
                category_type: *category_type,
                description: None,
            })
            .await?;

        for (sku, name, price, stock) in products.iter() {
            let input = ProductInput {
                sku: sku.to_string(),
                name: name.to_string(),
                category_id: Some(category.id),
                cost_price_paisa: price * 70 / 100,
                selling_price_paisa: *price,
                ..Default::default()
            };
            if let Err(e) = shop.products().create(&input, *stock, Some(admin.id)).await {
                eprintln!("Failed to insert {}: {}", sku, e);
                continue;
            }
            generated += 1;
        }
    }
    println!("✓ Generated {} products", generated);

    let low = shop.inventory().low_stock_count().await?;
    println!("  Low stock items: {}", low);

    registry.close_all().await;
    Ok(())
}
