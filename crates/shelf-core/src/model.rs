//! Replica data model: items, transactions and the snapshot aggregate

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Maximum SKU length in bytes
pub const MAX_SKU_LEN: usize = 128;

/// Validate a SKU: non-empty after trimming, bounded length, no control chars
pub fn validate_sku(sku: &str) -> Result<()> {
    if sku.trim().is_empty() {
        return Err(Error::InvalidSku("SKU cannot be empty".into()));
    }

    if sku.len() > MAX_SKU_LEN {
        return Err(Error::InvalidSku(format!("SKU exceeds {} bytes", MAX_SKU_LEN)));
    }

    if sku.chars().any(|c| c.is_control()) {
        return Err(Error::InvalidSku("SKU contains control characters".into()));
    }

    Ok(())
}

/// Read a JSON `null` the same as a missing field. Older clients write
/// `null` for numbers that were NaN when saved.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// An inventory item, keyed by `sku`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub sku: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub position: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stock_init: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cost_price: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sell_price: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub barcode: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: u64,
}

impl Item {
    /// Placeholder item created when a barcode is assigned to an unknown SKU
    pub fn placeholder(sku: impl Into<String>) -> Self {
        let sku = sku.into();
        Self {
            name: sku.clone(),
            sku,
            position: String::new(),
            stock_init: 0.0,
            cost_price: 0.0,
            sell_price: 0.0,
            barcode: String::new(),
            updated_at: 0,
        }
    }

    pub fn barcode(&self) -> Option<&str> {
        if self.barcode.is_empty() {
            None
        } else {
            Some(&self.barcode)
        }
    }
}

/// Editable item fields, as submitted by an item form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemDraft {
    pub sku: String,
    pub name: String,
    pub position: String,
    pub stock_init: f64,
    pub cost_price: f64,
    pub sell_price: f64,
}

impl ItemDraft {
    pub fn new(sku: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn position(mut self, position: impl Into<String>) -> Self {
        self.position = position.into();
        self
    }

    pub fn stock_init(mut self, stock: f64) -> Self {
        self.stock_init = stock;
        self
    }

    pub fn prices(mut self, cost: f64, sell: f64) -> Self {
        self.cost_price = cost;
        self.sell_price = sell;
        self
    }

    /// Check required fields before the draft touches the replica
    pub fn validate(&self) -> Result<()> {
        validate_sku(self.sku.trim())?;
        if self.name.trim().is_empty() {
            return Err(Error::MissingField("name"));
        }
        Ok(())
    }

    /// Copy the draft's fields onto an existing item, keeping its barcode
    pub fn apply_to(&self, item: &mut Item) {
        item.name = self.name.trim().to_string();
        item.position = self.position.trim().to_string();
        item.stock_init = self.stock_init;
        item.cost_price = self.cost_price;
        item.sell_price = self.sell_price;
    }

    pub fn into_item(self) -> Item {
        let mut item = Item::placeholder(self.sku.trim());
        self.apply_to(&mut item);
        item
    }
}

/// Stock movement kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
    /// Breakage. Stored as `ROTTURA`, the spelling the web client counts
    #[serde(rename = "ROTTURA", alias = "BREAKAGE")]
    Breakage,
}

impl TxKind {
    /// Signed effect of one unit of this movement on the stock count
    pub fn stock_sign(&self) -> f64 {
        match self {
            TxKind::In => 1.0,
            TxKind::Out | TxKind::Breakage => -1.0,
        }
    }
}

impl std::fmt::Display for TxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxKind::In => write!(f, "IN"),
            TxKind::Out => write!(f, "OUT"),
            TxKind::Breakage => write!(f, "BREAKAGE"),
        }
    }
}

impl std::str::FromStr for TxKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "IN" => Ok(TxKind::In),
            "OUT" => Ok(TxKind::Out),
            "BREAKAGE" | "ROTTURA" | "BREAK" => Ok(TxKind::Breakage),
            _ => Err(Error::InvalidKind(s.to_string())),
        }
    }
}

/// A stock movement, keyed by `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    /// Creation time in ms; never changes after creation
    #[serde(default, deserialize_with = "null_as_default")]
    pub ts: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sku: String,
    #[serde(rename = "type")]
    pub kind: TxKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub qty: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<u64>,
}

impl Transaction {
    /// Build a new movement created at `ts`. Sales start unconfirmed.
    pub fn new(sku: impl Into<String>, kind: TxKind, qty: f64, price: f64, ts: u64) -> Result<Self> {
        let sku = sku.into();
        validate_sku(&sku)?;
        if !(qty > 0.0) || !qty.is_finite() {
            return Err(Error::InvalidQuantity(qty));
        }

        Ok(Self {
            id: format!("TX-{}", uuid::Uuid::new_v4().simple()),
            ts,
            sku,
            kind,
            qty,
            price,
            confirmed: kind != TxKind::Out,
            updated_at: Some(ts),
        })
    }

    /// Timestamp used for last-write-wins: `updatedAt`, else creation time
    pub fn effective_updated_at(&self) -> u64 {
        self.updated_at.unwrap_or(self.ts)
    }
}

/// Entities carrying an `updatedAt` stamp
pub trait Stamped {
    fn updated_at(&self) -> u64;
    fn set_updated_at(&mut self, ts: u64);
}

impl Stamped for Item {
    fn updated_at(&self) -> u64 {
        self.updated_at
    }

    fn set_updated_at(&mut self, ts: u64) {
        self.updated_at = ts;
    }
}

impl Stamped for Transaction {
    fn updated_at(&self) -> u64 {
        self.effective_updated_at()
    }

    fn set_updated_at(&mut self, ts: u64) {
        self.updated_at = Some(ts);
    }
}

/// The complete versioned state of one replica
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_write_ts: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<Item>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub transactions: Vec<Transaction>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub logo_data_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub company_name: String,
}

impl Snapshot {
    /// Empty snapshot, as created on first use
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item(&self, sku: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.sku == sku)
    }

    pub fn item_mut(&mut self, sku: &str) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| i.sku == sku)
    }

    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    pub fn transaction_mut(&mut self, id: &str) -> Option<&mut Transaction> {
        self.transactions.iter_mut().find(|t| t.id == id)
    }

    /// Append a transaction, keeping the sequence ordered by `ts`
    pub fn insert_transaction(&mut self, tx: Transaction) {
        let at = self.transactions.partition_point(|t| t.ts <= tx.ts);
        self.transactions.insert(at, tx);
    }

    /// Logo and company name travel together through merges
    pub fn branding(&self) -> (&str, &str) {
        (&self.logo_data_url, &self.company_name)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
