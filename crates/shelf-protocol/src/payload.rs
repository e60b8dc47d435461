//! Snapshot payload encoding and structural validation
//!
//! Remote payloads are validated before they are trusted: the body must be a
//! JSON object with an `items` array, each item must carry a non-empty
//! `sku`, each transaction a non-empty `id`. Only then is it decoded into a
//! [`Snapshot`]. Missing scalar fields fall back to their defaults.

use crate::error::{ProtocolError, ProtocolResult};
use serde_json::{Map, Value};
use shelf_core::Snapshot;
use tracing::debug;

/// Maximum accepted payload size (logos travel inline as data URLs)
pub const MAX_PAYLOAD_SIZE: usize = 32 * 1024 * 1024;

/// Serialize a snapshot for the wire
pub fn encode_snapshot(snapshot: &Snapshot) -> ProtocolResult<String> {
    serde_json::to_string(snapshot).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Validate and decode a snapshot payload received from the remote
pub fn decode_snapshot(body: &[u8]) -> ProtocolResult<Snapshot> {
    if body.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            size: body.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let value: Value =
        serde_json::from_slice(body).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;

    validate(&value).map_err(|e| {
        debug!(error = %e, "Rejected snapshot payload");
        e
    })?;

    serde_json::from_value(value).map_err(|e| ProtocolError::Schema(e.to_string()))
}

/// Check the structure of a decoded JSON payload
pub fn validate(value: &Value) -> ProtocolResult<()> {
    let root = value.as_object().ok_or(ProtocolError::NotAnObject)?;

    let items = match root.get("items") {
        Some(Value::Array(items)) => items,
        _ => return Err(ProtocolError::MissingItems),
    };
    for (i, item) in items.iter().enumerate() {
        require_key(item, "sku", &format!("items[{}]", i))?;
    }

    match root.get("transactions") {
        None | Some(Value::Null) => {}
        Some(Value::Array(txs)) => {
            for (i, tx) in txs.iter().enumerate() {
                require_key(tx, "id", &format!("transactions[{}]", i))?;
            }
        }
        Some(_) => {
            return Err(ProtocolError::invalid_field("transactions", "expected an array"));
        }
    }

    for field in ["version", "lastWriteTs"] {
        match root.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::Number(n)) if n.is_u64() => {}
            Some(_) => {
                return Err(ProtocolError::invalid_field(field, "expected a non-negative integer"));
            }
        }
    }

    // A merge produces max(local, remote) + 1
    if root.get("version").and_then(Value::as_u64) == Some(u64::MAX) {
        return Err(ProtocolError::invalid_field("version", "cannot be advanced"));
    }

    Ok(())
}

fn require_key(entity: &Value, key: &str, path: &str) -> ProtocolResult<()> {
    let object: &Map<String, Value> = entity
        .as_object()
        .ok_or_else(|| ProtocolError::invalid_field(path, "expected an object"))?;

    match object.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(()),
        _ => Err(ProtocolError::invalid_field(
            format!("{}.{}", path, key),
            "expected a non-empty string",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_core::{Item, TxKind};

    #[test]
    fn test_decode_valid_payload() {
        let body = br#"{
            "version": 7,
            "lastWriteTs": 1700000000000,
            "items": [{"sku": "A1", "updatedAt": 200}, {"sku": "B2", "updatedAt": 50}],
            "transactions": [{"id": "TX1", "ts": 10, "sku": "A1", "type": "OUT", "qty": 1, "price": 3}],
            "companyName": "Acme"
        }"#;

        let snap = decode_snapshot(body).unwrap();
        assert_eq!(snap.version, 7);
        assert_eq!(snap.items.len(), 2);
        assert_eq!(snap.transactions[0].kind, TxKind::Out);
        assert_eq!(snap.company_name, "Acme");
        assert_eq!(snap.logo_data_url, "");
    }

    #[test]
    fn test_missing_items_is_rejected() {
        assert_eq!(
            decode_snapshot(br#"{"version": 3, "transactions": []}"#),
            Err(ProtocolError::MissingItems)
        );
        assert_eq!(
            decode_snapshot(br#"{"items": null}"#),
            Err(ProtocolError::MissingItems)
        );
        assert_eq!(
            decode_snapshot(br#"{"items": {"A1": {}}}"#),
            Err(ProtocolError::MissingItems)
        );
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(decode_snapshot(b"[]"), Err(ProtocolError::NotAnObject));
        assert!(matches!(
            decode_snapshot(b"<html>Moved</html>"),
            Err(ProtocolError::InvalidJson(_))
        ));
        assert!(matches!(
            decode_snapshot(br#"{"items": [{"name": "no sku"}]}"#),
            Err(ProtocolError::InvalidField { field, .. }) if field == "items[0].sku"
        ));
        assert!(matches!(
            decode_snapshot(br#"{"items": [], "transactions": [{"id": ""}]}"#),
            Err(ProtocolError::InvalidField { field, .. }) if field == "transactions[0].id"
        ));
        assert!(matches!(
            decode_snapshot(br#"{"items": [], "transactions": "none"}"#),
            Err(ProtocolError::InvalidField { .. })
        ));
        assert!(matches!(
            decode_snapshot(br#"{"items": [], "version": -1}"#),
            Err(ProtocolError::InvalidField { .. })
        ));
        // Structurally fine, but the transaction type is unknown
        assert!(matches!(
            decode_snapshot(br#"{"items": [], "transactions": [{"id": "T", "type": "LOST"}]}"#),
            Err(ProtocolError::Schema(_))
        ));
    }

    #[test]
    fn test_version_must_be_advanceable() {
        let body = format!(r#"{{"items": [], "version": {}}}"#, u64::MAX);
        assert!(matches!(
            decode_snapshot(body.as_bytes()),
            Err(ProtocolError::InvalidField { field, .. }) if field == "version"
        ));

        let body = format!(r#"{{"items": [], "version": {}}}"#, u64::MAX - 1);
        assert_eq!(decode_snapshot(body.as_bytes()).unwrap().version, u64::MAX - 1);
    }

    #[test]
    fn test_null_fields_read_as_defaults() {
        // A price that was NaN on the saving client arrives as null
        let body = br#"{
            "version": null,
            "items": [{"sku": "A1", "name": null, "stockInit": null, "costPrice": null, "sellPrice": 2.5}],
            "transactions": [{"id": "TX1", "ts": 5, "sku": "A1", "type": "OUT", "qty": 1, "price": null, "confirmed": null}],
            "companyName": null
        }"#;

        let snap = decode_snapshot(body).unwrap();
        assert_eq!(snap.version, 0);
        assert_eq!(snap.items[0].name, "");
        assert_eq!(snap.items[0].stock_init, 0.0);
        assert_eq!(snap.items[0].sell_price, 2.5);
        assert_eq!(snap.transactions[0].price, 0.0);
        assert_eq!(snap.transactions[0].qty, 1.0);
        assert!(!snap.transactions[0].confirmed);
        assert_eq!(snap.company_name, "");
    }

    #[test]
    fn test_encode_then_validate() {
        let mut snap = Snapshot::new();
        snap.items.push(Item::placeholder("A1"));
        let encoded = encode_snapshot(&snap).unwrap();
        assert_eq!(decode_snapshot(encoded.as_bytes()).unwrap(), snap);
    }
}
