//! Shop inventory on top of a [`Store`].
//!
//! Products are records keyed by name with integer buy price, sell price and
//! stock columns. Selling decrements stock in the store and appends to a
//! separate [`SalesLog`].

mod sales;

pub use sales::{ProductSales, Sale, SalesLog, SalesReport};

use crate::error::{Result, StoreError};
use crate::schema::Schema;
use crate::store::{Store, StoreConfig};
use crate::types::{Record, RecordPatch};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::debug;

const BUY_PRICE: &str = "buy_price";
const SELL_PRICE: &str = "sell_price";
const STOCK: &str = "stock";

/// A product as stored in the inventory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Product {
    pub name: String,
    pub buy_price: u64,
    pub sell_price: u64,
    pub stock: u64,
}

impl Product {
    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            name: record.key.clone(),
            buy_price: numeric(record, BUY_PRICE)?,
            sell_price: numeric(record, SELL_PRICE)?,
            stock: numeric(record, STOCK)?,
        })
    }
}

fn numeric(record: &Record, field: &str) -> Result<u64> {
    let raw = record.field(field).unwrap_or_default();
    raw.trim().parse().map_err(|_| StoreError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

/// Result of [`Inventory::sell`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaleOutcome {
    /// Sale recorded; `remaining` units left.
    Sold { remaining: u64 },
    /// No product with that name.
    NotFound,
    /// Not enough stock; nothing changed.
    InsufficientStock { available: u64 },
}

/// Products plus their sales history.
pub struct Inventory {
    store: Store,
    sales: SalesLog,
}

impl Inventory {
    /// Open an inventory whose store uses [`Schema::inventory`].
    pub fn open(config: StoreConfig, sales_log: impl Into<PathBuf>) -> Result<Self> {
        if config.schema.fields() != Schema::inventory().fields() {
            return Err(StoreError::Schema(format!(
                "inventory needs fields {:?}, got {:?}",
                Schema::inventory().fields(),
                config.schema.fields()
            )));
        }

        Ok(Self {
            store: Store::open_or_create(config)?,
            sales: SalesLog::new(sales_log),
        })
    }

    /// `inventory.csv` and `sales.csv` inside `dir`.
    pub fn open_in(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        Self::open(
            StoreConfig::inventory(dir.join("inventory.csv")),
            dir.join("sales.csv"),
        )
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn sales_log(&self) -> &SalesLog {
        &self.sales
    }

    /// Add a product. Returns false if the name is taken.
    pub fn add_product(&self, name: &str, buy_price: u64, sell_price: u64, stock: u64) -> Result<bool> {
        self.store.add(
            name,
            [
                (BUY_PRICE, buy_price.to_string()),
                (SELL_PRICE, sell_price.to_string()),
                (STOCK, stock.to_string()),
            ],
        )
    }

    pub fn product(&self, name: &str) -> Result<Option<Product>> {
        self.store
            .get(name)?
            .map(|record| Product::from_record(&record))
            .transpose()
    }

    pub fn products(&self) -> Result<Vec<Product>> {
        self.store
            .list_all()?
            .iter()
            .map(Product::from_record)
            .collect()
    }

    /// Products whose name contains `query`, ignoring case.
    pub fn search(&self, query: &str) -> Result<Vec<Product>> {
        self.store
            .search(query)?
            .iter()
            .map(Product::from_record)
            .collect()
    }

    /// Add `amount` units to a product's stock. Returns false if the product
    /// does not exist.
    pub fn restock(&self, name: &str, amount: u64) -> Result<bool> {
        let restocked = self.store.modify(name, |record| {
            let product = Product::from_record(record)?;
            let stock = product
                .stock
                .checked_add(amount)
                .ok_or_else(|| StoreError::InvalidValue {
                    field: "amount".into(),
                    value: amount.to_string(),
                })?;
            Ok((Some(RecordPatch::new().set(STOCK, stock.to_string())), ()))
        })?;
        Ok(restocked.is_some())
    }

    /// Sell `quantity` units on `date` at the current sell price.
    ///
    /// The stock check and decrement happen under the store's write lock, so
    /// concurrent sellers cannot oversell. A sale the log cannot record is
    /// rejected before the stock changes.
    pub fn sell(&self, name: &str, quantity: u64, date: NaiveDate) -> Result<SaleOutcome> {
        if quantity == 0 {
            return Err(StoreError::InvalidValue {
                field: "quantity".into(),
                value: "0".into(),
            });
        }

        let decided = self.store.modify(name, |record| {
            let product = Product::from_record(record)?;
            if product.stock < quantity {
                debug!(product = %name, available = product.stock, quantity, "insufficient stock");
                let outcome = SaleOutcome::InsufficientStock {
                    available: product.stock,
                };
                return Ok((None, (outcome, None)));
            }

            let sale = Sale {
                date,
                product: product.name,
                price: product.sell_price,
                quantity,
            };
            sale.validate()?;

            let remaining = product.stock - quantity;
            let patch = RecordPatch::new().set(STOCK, remaining.to_string());
            Ok((Some(patch), (SaleOutcome::Sold { remaining }, Some(sale))))
        })?;

        let Some((outcome, sale)) = decided else {
            return Ok(SaleOutcome::NotFound);
        };
        if let Some(sale) = sale {
            self.sales.append(&sale)?;
        }
        Ok(outcome)
    }

    /// Sales report for `from..=to`.
    pub fn report(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<SalesReport> {
        self.sales.report(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rejects_foreign_schema() {
        let dir = TempDir::new().unwrap();
        let result = Inventory::open(
            StoreConfig::employees(dir.path().join("staff.csv")),
            dir.path().join("sales.csv"),
        );
        assert!(matches!(result, Err(StoreError::Schema(_))));
    }

    #[test]
    fn test_non_numeric_stock() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("inventory.csv"),
            "name,buy_price,sell_price,stock\npen,10,15,lots\n",
        )
        .unwrap();

        let inventory = Inventory::open_in(dir.path()).unwrap();
        let result = inventory.product("pen");
        assert!(matches!(result, Err(StoreError::InvalidValue { field, .. }) if field == "stock"));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let dir = TempDir::new().unwrap();
        let inventory = Inventory::open_in(dir.path()).unwrap();
        inventory.add_product("pen", 10, 15, 5).unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(inventory.sell("pen", 0, day).is_err());
    }
}
