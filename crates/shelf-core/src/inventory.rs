//! Inventory queries and local edit operations on a snapshot
//!
//! Edits stamp the touched entity through the [`VersionClock`]; bumping the
//! snapshot version is left to the caller, which owns persistence.

use crate::clock::VersionClock;
use crate::error::{Error, Result};
use crate::model::{validate_sku, Item, ItemDraft, Snapshot, Transaction, TxKind};

/// Items at or below this stock count are reported as low
pub const LOW_STOCK_THRESHOLD: f64 = 4.0;

/// An item whose stock is at or below the threshold
#[derive(Debug, Clone, PartialEq)]
pub struct LowStock {
    pub sku: String,
    pub name: String,
    pub stock: f64,
}

impl Snapshot {
    /// Current stock: initial count plus IN, minus OUT and BREAKAGE
    pub fn stock_of(&self, sku: &str) -> f64 {
        let Some(item) = self.item(sku) else {
            return 0.0;
        };

        self.transactions
            .iter()
            .filter(|t| t.sku == sku)
            .fold(item.stock_init, |stock, t| stock + t.kind.stock_sign() * t.qty)
    }

    /// Items whose stock is at or below `threshold`, in item order
    pub fn low_stock(&self, threshold: f64) -> Vec<LowStock> {
        self.items
            .iter()
            .filter_map(|item| {
                let stock = self.stock_of(&item.sku);
                (stock <= threshold).then(|| LowStock {
                    sku: item.sku.clone(),
                    name: item.name.clone(),
                    stock,
                })
            })
            .collect()
    }

    /// Look up an item by barcode alias, falling back to the SKU itself
    pub fn find_by_barcode(&self, code: &str) -> Option<&Item> {
        let code = code.trim();
        if code.is_empty() {
            return None;
        }

        self.items
            .iter()
            .find(|i| i.barcode() == Some(code))
            .or_else(|| self.item(code))
    }

    /// Create an item, or overwrite the editable fields of an existing one
    pub fn upsert_item(&mut self, draft: ItemDraft, clock: &VersionClock) -> Result<&Item> {
        draft.validate()?;
        let sku = draft.sku.trim().to_string();

        let at = match self.items.iter().position(|i| i.sku == sku) {
            Some(at) => {
                draft.apply_to(&mut self.items[at]);
                at
            }
            None => {
                self.items.push(draft.into_item());
                self.items.len() - 1
            }
        };

        clock.stamp(&mut self.items[at]);
        Ok(&self.items[at])
    }

    /// Point a barcode at a SKU, creating a placeholder item when needed
    pub fn assign_barcode(&mut self, code: &str, sku: &str, clock: &VersionClock) -> Result<&Item> {
        let code = code.trim();
        let sku = sku.trim();
        if code.is_empty() {
            return Err(Error::MissingField("barcode"));
        }
        validate_sku(sku)?;

        let at = match self.items.iter().position(|i| i.sku == sku) {
            Some(at) => at,
            None => {
                self.items.push(Item::placeholder(sku));
                self.items.len() - 1
            }
        };

        self.items[at].barcode = code.to_string();
        clock.stamp(&mut self.items[at]);
        Ok(&self.items[at])
    }

    /// Record a stock movement created now
    pub fn record_transaction(
        &mut self,
        sku: &str,
        kind: TxKind,
        qty: f64,
        price: f64,
        clock: &VersionClock,
    ) -> Result<&Transaction> {
        let tx = Transaction::new(sku.trim(), kind, qty, price, clock.now())?;
        let id = tx.id.clone();
        self.insert_transaction(tx);

        self.transaction(&id).ok_or(Error::TransactionNotFound(id))
    }

    /// Record a movement for whatever item a scanned code resolves to
    pub fn record_scan(
        &mut self,
        code: &str,
        kind: TxKind,
        qty: f64,
        price: f64,
        clock: &VersionClock,
    ) -> Result<&Transaction> {
        let sku = self
            .find_by_barcode(code)
            .map(|i| i.sku.clone())
            .ok_or_else(|| Error::UnknownBarcode(code.trim().to_string()))?;

        self.record_transaction(&sku, kind, qty, price, clock)
    }

    /// Confirm a movement; sales may have their price corrected on the way
    pub fn confirm_transaction(
        &mut self,
        id: &str,
        price: Option<f64>,
        clock: &VersionClock,
    ) -> Result<&Transaction> {
        let tx = self
            .transaction_mut(id)
            .ok_or_else(|| Error::TransactionNotFound(id.to_string()))?;

        if let (TxKind::Out, Some(price)) = (tx.kind, price) {
            tx.price = price;
        }
        tx.confirmed = true;
        clock.stamp(tx);

        Ok(tx)
    }

    pub fn set_company_name(&mut self, name: &str) {
        self.company_name = name.trim().to_string();
    }

    /// Set or clear the logo (a data URL)
    pub fn set_logo(&mut self, logo: Option<String>) {
        self.logo_data_url = logo.unwrap_or_default();
    }
}
