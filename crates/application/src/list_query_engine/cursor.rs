use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use keystone_core::{AppError, AppResult};
use keystone_domain::{ResourceRecord, SortDirection};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decoded page boundary: sort value and tiebreak id of one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PageCursor {
    pub order_by: String,
    pub order: SortDirection,
    pub value: Value,
    pub id: String,
}

impl PageCursor {
    pub fn for_record(order_by: &str, order: SortDirection, record: &ResourceRecord) -> Self {
        Self {
            order_by: order_by.to_owned(),
            order,
            value: record.field_value(order_by).unwrap_or(Value::Null),
            id: record.id().to_owned(),
        }
    }

    pub fn encode(&self) -> AppResult<String> {
        let json = serde_json::to_vec(self)
            .map_err(|error| AppError::Internal(format!("failed to encode page cursor: {error}")))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    pub fn decode(token: &str) -> AppResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| AppError::InvalidQuery("page cursor is not valid base64url".to_owned()))?;
        serde_json::from_slice(&bytes)
            .map_err(|_| AppError::InvalidQuery("page cursor payload is malformed".to_owned()))
    }

    /// Rejects cursors issued for another ordering.
    pub fn ensure_matches(&self, order_by: &str, order: SortDirection) -> AppResult<()> {
        if self.order_by != order_by || self.order != order {
            return Err(AppError::InvalidQuery(format!(
                "page cursor was issued for '{} {}', not '{} {}'",
                self.order_by,
                self.order.as_str(),
                order_by,
                order.as_str()
            )));
        }

        Ok(())
    }
}
