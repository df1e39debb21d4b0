//! # Receipt
//!
//! A printable receipt built from a sale and its lines, rendered as JSON
//! (via serde) or as fixed-width text for thermal printers.
//!
//! ## Layout
//! ```text
//!             Kopila Books & Stationery
//!                 Gaindakot, Nepal
//!                 Ph: 9845817460
//! Receipt No: REC2024031500042
//! Date: 2024-03-15 10:30
//! Customer: Ram Thapa
//! Address: Bharatpur
//! ----------------------------------------
//! Item               Qty      Rate   Amount
//! Notebook A4          2    150.00   300.00
//! ----------------------------------------
//!                       Subtotal:    300.00
//!                      VAT (13%):     39.00
//!                          TOTAL:    339.00
//!                   Payment: Cash    400.00
//!                         Change:     61.00
//! three hundred thirty-nine rupees
//!           Thank You! Visit Again
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use ts_rs::TS;

use crate::money::Money;
use crate::sale::change_due;
use crate::types::{PaymentStatus, Sale, SaleItem};
use crate::words::number_to_words;

const WIDTH: usize = 40;

/// Shop header printed on every receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShopInfo {
    pub name: String,
    pub address: String,
    pub phone: String,
}

/// Who the receipt is made out to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiptCustomer {
    pub name: String,
    pub address: Option<String>,
    /// One-off customer, printed with an `IR:` prefix.
    pub irregular: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiptLine {
    pub name: String,
    pub quantity: i64,
    pub rate: Money,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Receipt {
    pub shop: ShopInfo,
    pub receipt_number: String,
    pub sale_number: String,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub customer: Option<ReceiptCustomer>,
    pub lines: Vec<ReceiptLine>,
    pub subtotal: Money,
    pub discount: Money,
    pub vat_bps: u32,
    pub tax: Money,
    pub total: Money,
    pub payment_method: String,
    pub paid: Money,
    pub change_due: Money,
    /// Unpaid remainder; zero when fully paid.
    pub due: Money,
    pub amount_in_words: String,
}

impl Receipt {
    /// Builds a receipt for a recorded sale.
    pub fn build(
        shop: ShopInfo,
        sale: &Sale,
        items: &[SaleItem],
        customer: Option<ReceiptCustomer>,
        vat_bps: u32,
    ) -> Self {
        let receipt_number = if sale.receipt_number.is_empty() {
            sale.sale_number.clone()
        } else {
            sale.receipt_number.clone()
        };

        let due = if sale.payment_status == PaymentStatus::Paid {
            Money::zero()
        } else {
            sale.due().non_negative()
        };

        Receipt {
            shop,
            receipt_number,
            sale_number: sale.sale_number.clone(),
            date: sale.created_at,
            customer,
            lines: items
                .iter()
                .map(|item| ReceiptLine {
                    name: item.product_name.clone(),
                    quantity: item.quantity,
                    rate: Money::from_paisa(item.unit_price_paisa),
                    amount: item.line_total(),
                })
                .collect(),
            subtotal: Money::from_paisa(sale.subtotal_paisa),
            discount: Money::from_paisa(sale.discount_paisa),
            vat_bps,
            tax: Money::from_paisa(sale.tax_paisa),
            total: sale.total(),
            payment_method: sale.payment_method.label().to_string(),
            paid: sale.paid(),
            change_due: change_due(sale.total(), sale.paid()),
            due,
            amount_in_words: number_to_words(sale.total()),
        }
    }

    /// Renders the receipt as fixed-width text.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let rule = "-".repeat(WIDTH);

        for header in [&self.shop.name, &self.shop.address] {
            let _ = writeln!(out, "{:^WIDTH$}", header);
        }
        let _ = writeln!(out, "{:^WIDTH$}", format!("Ph: {}", self.shop.phone));
        let _ = writeln!(out, "Receipt No: {}", self.receipt_number);
        let _ = writeln!(out, "Date: {}", self.date.format("%Y-%m-%d %H:%M"));

        if let Some(customer) = &self.customer {
            let prefix = if customer.irregular { "IR: " } else { "" };
            let _ = writeln!(out, "Customer: {}{}", prefix, customer.name);
            let address = customer.address.as_deref().filter(|a| !a.is_empty());
            let _ = writeln!(out, "Address: {}", address.unwrap_or("-"));
        }

        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "{:<16} {:>5} {:>8} {:>8}", "Item", "Qty", "Rate", "Amount");
        for line in &self.lines {
            let name: String = line.name.chars().take(15).collect();
            let _ = writeln!(
                out,
                "{:<16} {:>5} {:>8} {:>8}",
                name,
                line.quantity,
                decimal(line.rate),
                decimal(line.amount)
            );
        }
        let _ = writeln!(out, "{}", rule);

        let mut total_row = |label: String, amount: Money| {
            let _ = writeln!(out, "{:>30} {:>9}", label, decimal(amount));
        };
        total_row("Subtotal:".to_string(), self.subtotal);
        if self.discount.is_positive() {
            total_row("Discount:".to_string(), self.discount);
        }
        total_row(format!("VAT ({}%):", self.vat_bps as f64 / 100.0), self.tax);
        total_row("TOTAL:".to_string(), self.total);
        total_row(format!("Payment: {}", self.payment_method), self.paid);
        if self.change_due.is_positive() {
            total_row("Change:".to_string(), self.change_due);
        }
        if self.due.is_positive() {
            total_row("Due:".to_string(), self.due);
        }

        let _ = writeln!(out, "{}", self.amount_in_words);
        let _ = writeln!(out, "{:^WIDTH$}", "Thank You! Visit Again");
        out
    }
}

/// Plain decimal rupees without the currency symbol, e.g. `1250.50`.
fn decimal(amount: Money) -> String {
    let sign = if amount.is_negative() { "-" } else { "" };
    format!("{}{}.{:02}", sign, amount.rupees().abs(), amount.paisa_part())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CustomerType, OrderStatus, PaymentMethod};

    fn shop() -> ShopInfo {
        ShopInfo {
            name: "Kopila Books & Stationery".to_string(),
            address: "Gaindakot, Nepal".to_string(),
            phone: "9845817460".to_string(),
        }
    }

    fn sale(paid: i64) -> (Sale, Vec<SaleItem>) {
        let now = Utc::now();
        let sale = Sale {
            id: 42,
            sale_number: "SAL2024031500042".to_string(),
            receipt_number: "REC2024031500042".to_string(),
            customer_id: Some(1),
            irregular_customer_id: None,
            customer_type: CustomerType::Regular,
            cashier_id: None,
            subtotal_paisa: 30_000,
            discount_bps: 0,
            discount_paisa: 0,
            tax_paisa: 3_900,
            total_paisa: 33_900,
            payment_method: PaymentMethod::Cash,
            paid_paisa: paid,
            payment_status: PaymentStatus::from_amounts(
                Money::from_paisa(33_900),
                Money::from_paisa(paid),
            ),
            order_status: OrderStatus::Completed,
            notes: None,
            is_printed: false,
            created_at: now,
            updated_at: now,
        };
        let items = vec![SaleItem {
            id: 1,
            sale_id: 42,
            product_id: 9,
            product_name: "Notebook A4 200 pages".to_string(),
            quantity: 2,
            unit_price_paisa: 15_000,
            discount_bps: 0,
            line_total_paisa: 30_000,
        }];
        (sale, items)
    }

    #[test]
    fn test_build_overpaid_receipt() {
        let (sale, items) = sale(40_000);
        let receipt = Receipt::build(shop(), &sale, &items, None, 1300);

        assert_eq!(receipt.change_due.paisa(), 6_100);
        assert_eq!(receipt.due, Money::zero());
        assert_eq!(receipt.amount_in_words, "three hundred thirty-nine rupees");
        assert_eq!(receipt.lines[0].amount.paisa(), 30_000);
    }

    #[test]
    fn test_build_partial_receipt_has_due() {
        let (sale, items) = sale(10_000);
        let receipt = Receipt::build(shop(), &sale, &items, None, 1300);

        assert_eq!(receipt.change_due, Money::zero());
        assert_eq!(receipt.due.paisa(), 23_900);
    }

    #[test]
    fn test_render_text() {
        let (sale, items) = sale(10_000);
        let customer = ReceiptCustomer {
            name: "Walk-in".to_string(),
            address: None,
            irregular: true,
        };
        let text = Receipt::build(shop(), &sale, &items, Some(customer), 1300).render_text();

        assert!(text.contains("Receipt No: REC2024031500042"));
        assert!(text.contains("Customer: IR: Walk-in"));
        assert!(text.contains("Address: -"));
        assert!(text.contains("Notebook A4 200 "));
        assert!(text.contains("VAT (13%):"));
        assert!(text.contains("339.00"));
        assert!(text.contains("Due:"));
        assert!(text.contains("Thank You! Visit Again"));
        assert!(!text.contains("Change:"));
    }

    #[test]
    fn test_decimal_formatting() {
        assert_eq!(decimal(Money::from_paisa(125_050)), "1250.50");
        assert_eq!(decimal(Money::from_paisa(-5)), "-0.05");
    }
}
