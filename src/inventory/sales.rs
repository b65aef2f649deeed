//! Append-only sales log and period reports.
//!
//! Each sale is one `date,product,price,quantity` line. The log has no
//! header and is never rewritten.

use crate::error::{Result, StoreError};
use chrono::NaiveDate;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One recorded sale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sale {
    pub date: NaiveDate,
    pub product: String,
    /// Unit price at the time of sale.
    pub price: u64,
    pub quantity: u64,
}

impl Sale {
    pub fn revenue(&self) -> u64 {
        self.price.saturating_mul(self.quantity)
    }

    /// Whether the sale can be written as one log line.
    pub fn validate(&self) -> Result<()> {
        if self.product.contains([',', '\n', '\r']) {
            return Err(StoreError::UnencodableValue {
                field: "product".into(),
                value: self.product.clone(),
            });
        }
        Ok(())
    }

    fn to_line(&self) -> String {
        format!(
            "{},{},{},{}\n",
            self.date.format(DATE_FORMAT),
            self.product,
            self.price,
            self.quantity
        )
    }

    fn from_line(number: usize, line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split(',').collect();
        let [date, product, price, quantity] = parts.as_slice() else {
            return Err(StoreError::parse_line(
                number,
                format!("expected 4 fields, found {}", parts.len()),
            ));
        };

        let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
            .map_err(|_| StoreError::parse_line(number, format!("invalid date {date:?}")))?;
        let price = price
            .parse()
            .map_err(|_| StoreError::parse_line(number, format!("invalid price {price:?}")))?;
        let quantity = quantity
            .parse()
            .map_err(|_| StoreError::parse_line(number, format!("invalid quantity {quantity:?}")))?;

        Ok(Sale {
            date,
            product: product.to_string(),
            price,
            quantity,
        })
    }
}

/// Totals for one product in a report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductSales {
    pub product: String,
    pub quantity: u64,
    pub revenue: u64,
}

/// Sales aggregated over a period, products in order of first sale.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SalesReport {
    pub lines: Vec<ProductSales>,
    pub total_quantity: u64,
    pub total_revenue: u64,
}

impl SalesReport {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn add(&mut self, sale: &Sale) {
        let revenue = sale.revenue();
        match self.lines.iter_mut().find(|l| l.product == sale.product) {
            Some(line) => {
                line.quantity = line.quantity.saturating_add(sale.quantity);
                line.revenue = line.revenue.saturating_add(revenue);
            }
            None => self.lines.push(ProductSales {
                product: sale.product.clone(),
                quantity: sale.quantity,
                revenue,
            }),
        }
        self.total_quantity = self.total_quantity.saturating_add(sale.quantity);
        self.total_revenue = self.total_revenue.saturating_add(revenue);
    }
}

/// Sales log file.
pub struct SalesLog {
    path: PathBuf,
}

impl SalesLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one sale, creating the log if needed.
    pub fn append(&self, sale: &Sale) -> Result<()> {
        sale.validate()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(sale.to_line().as_bytes())?;
        file.sync_all()?;

        debug!(product = %sale.product, quantity = sale.quantity, "logged sale");
        Ok(())
    }

    /// Every logged sale, oldest first. A missing log has no sales.
    pub fn read_all(&self) -> Result<Vec<Sale>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        text.lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line.trim_end_matches('\r')))
            .filter(|(_, line)| !line.is_empty())
            .map(|(number, line)| Sale::from_line(number, line))
            .collect()
    }

    /// Aggregate sales dated within `from..=to`; either bound may be open.
    pub fn report(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<SalesReport> {
        let mut report = SalesReport::default();
        for sale in self.read_all()? {
            if from.is_some_and(|from| sale.date < from) || to.is_some_and(|to| sale.date > to) {
                continue;
            }
            report.add(&sale);
        }
        Ok(report)
    }
}
