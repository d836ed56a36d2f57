//! Minimal trading cycle: opening stock, a purchase, a sale, and the
//! resulting ledger printed to stdout.
//!
//! Run with `cargo run --example quickstart`, or `RUST_LOG=debug` for the
//! coordinator's tracing output.

use anyhow::Result;
use costbook::{
    AccountDirectory, Coordinator, LedgerStore, MemoryDirectory, MemoryLedger, Movement, NaiveDate,
    Product, Settings,
};
use rust_decimal_macros::dec;

fn main() -> Result<()> {
    costbook::logging::init(false);

    let mut coord = Coordinator::new(
        Settings::default().perpetual(),
        MemoryLedger::new(),
        MemoryDirectory::with_default_chart(),
    );

    let opening = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let product_id = coord.add_product(
        Product::new("TORN-8", "Tornillo 8mm").with_opening(dec!(200), dec!(4.50), opening),
    );
    coord.materialize_opening(product_id)?;

    coord.create_movement(
        Movement::purchase(
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            product_id,
            dec!(500),
            dec!(5),
        )
        .with_tax(dec!(525))
        .with_counterparty("Ferretera Sur"),
    )?;

    let sale_id = coord.create_movement(
        Movement::sale(
            NaiveDate::from_ymd_opt(2024, 2, 3).unwrap(),
            product_id,
            dec!(300),
            dec!(9),
        )
        .with_tax(dec!(567))
        .with_counterparty("Corralón Mitre"),
    )?;

    let sale = coord
        .movement(sale_id)
        .ok_or_else(|| anyhow::anyhow!("sale vanished"))?;
    println!(
        "sold 300 units, cost assigned {} ({} per unit)",
        sale.cost.total_cost_assigned, sale.cost.unit_cost_assigned
    );
    println!("stock on hand: {}", coord.stock(product_id)?);
    println!("inventory value: {}", coord.valuation(product_id)?.value);

    println!("\nledger:");
    for entry in coord.ledger().entries() {
        println!("  {} {}", entry.date, entry.memo);
        for line in &entry.lines {
            let account = coord
                .directory()
                .account(line.account)
                .map(|a| a.name)
                .unwrap_or_default();
            println!("    {:<30} {:>10} {:>10}", account, line.debit, line.credit);
        }
    }
    Ok(())
}
