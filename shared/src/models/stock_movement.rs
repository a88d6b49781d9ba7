//! Stock movement history, read from `activity_logs`

use super::entity_key::EntityKey;
use super::product::UNKNOWN_PRODUCT_TEXT;
use super::serde_helpers::null_as_default;
use serde::{Deserialize, Serialize};

/// Number of most recent log rows pulled on refresh
pub const ACTIVITY_LOG_LIMIT: usize = 50;

/// `activity_logs` row
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityLogRow {
    pub id: EntityKey,
    pub user_id: Option<String>,
    pub product_id: Option<String>,
    pub rack_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub action: String,
    pub details: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: EntityKey,
    pub user_id: String,
    pub product_id: String,
    pub rack_id: Option<String>,
    /// `IN`, `OUT`, `MOVE` or any other action label
    #[serde(rename = "type")]
    pub kind: String,
    pub quantity: i64,
    pub moved_at: String,
    pub details: String,
}

/// First run of ASCII digits in `text`
fn first_number(text: &str) -> Option<i64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

impl From<ActivityLogRow> for StockMovement {
    fn from(row: ActivityLogRow) -> Self {
        let details = row.details.filter(|d| !d.is_empty());
        let quantity = details
            .as_deref()
            .and_then(first_number)
            .or_else(|| first_number(&row.action))
            .unwrap_or(0);

        Self {
            id: row.id,
            user_id: row.user_id.unwrap_or_default(),
            product_id: row
                .product_id
                .unwrap_or_else(|| UNKNOWN_PRODUCT_TEXT.to_string()),
            rack_id: row.rack_id,
            quantity,
            moved_at: row.created_at,
            details: details.unwrap_or_else(|| row.action.clone()),
            kind: row.action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(action: &str, details: Option<&str>) -> ActivityLogRow {
        ActivityLogRow {
            id: EntityKey::parse("log-1"),
            user_id: Some("u-1".into()),
            product_id: None,
            rack_id: Some("r-1".into()),
            action: action.into(),
            details: details.map(Into::into),
            created_at: "2024-03-01T10:00:00+00:00".into(),
        }
    }

    #[test]
    fn test_quantity_prefers_details() {
        let m = StockMovement::from(row("IN 3", Some("moved 12 boxes to A-1")));
        assert_eq!(m.quantity, 12);
        assert_eq!(m.kind, "IN 3");
        assert_eq!(m.details, "moved 12 boxes to A-1");
        assert_eq!(m.product_id, UNKNOWN_PRODUCT_TEXT);
    }

    #[test]
    fn test_quantity_falls_back_to_action() {
        let m = StockMovement::from(row("OUT 7", Some("no count here")));
        assert_eq!(m.quantity, 7);
        let m = StockMovement::from(row("OUT 7", None));
        assert_eq!(m.quantity, 7);
        assert_eq!(m.details, "OUT 7");
    }

    #[test]
    fn test_quantity_defaults_to_zero() {
        let m = StockMovement::from(row("MOVE", None));
        assert_eq!(m.quantity, 0);
        assert_eq!(m.moved_at, "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn test_serializes_kind_as_type() {
        let json = serde_json::to_value(StockMovement::from(row("IN", None))).unwrap();
        assert_eq!(json["type"], "IN");
    }
}
