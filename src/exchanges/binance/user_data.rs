use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::frame_text;
use crate::core::kernel::WsCodec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

pub const ACCOUNT_POSITION: &str = "outboundAccountPosition";
pub const BALANCE_UPDATE: &str = "balanceUpdate";
pub const EXECUTION_REPORT: &str = "executionReport";
pub const LIST_STATUS: &str = "listStatus";

// Field names on the wire are single letters and case matters: `t`/`T`,
// `i`/`I`, `m`/`M`, `c`/`C` are distinct fields.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    #[serde(rename = "a")]
    pub asset: String,
    #[serde(rename = "f")]
    pub free: String,
    #[serde(rename = "l")]
    pub locked: String,
}

/// `outboundAccountPosition`: balances changed by the last account update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPosition {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "u")]
    pub last_update_time: i64,
    #[serde(rename = "B")]
    pub balances: Vec<AccountBalance>,
}

/// `balanceUpdate`: deposit, withdrawal or transfer delta
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "a")]
    pub asset: String,
    #[serde(rename = "d")]
    pub balance_delta: String,
    #[serde(rename = "T")]
    pub clear_time: i64,
}

/// `executionReport`: one order update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c")]
    pub client_order_id: String,
    #[serde(rename = "S")]
    pub side: String,
    #[serde(rename = "o")]
    pub order_type: String,
    #[serde(rename = "f")]
    pub time_in_force: String,
    #[serde(rename = "q")]
    pub quantity: String,
    #[serde(rename = "p")]
    pub price: String,
    #[serde(rename = "P")]
    pub stop_price: String,
    #[serde(rename = "d", default, skip_serializing_if = "Option::is_none")]
    pub trailing_delta: Option<i64>,
    #[serde(rename = "F")]
    pub iceberg_quantity: String,
    #[serde(rename = "g")]
    pub order_list_id: i64,
    #[serde(rename = "C")]
    pub orig_client_order_id: String,
    #[serde(rename = "x")]
    pub execution_type: String,
    #[serde(rename = "X")]
    pub order_status: String,
    #[serde(rename = "r")]
    pub reject_reason: String,
    #[serde(rename = "i")]
    pub order_id: i64,
    #[serde(rename = "l")]
    pub last_executed_quantity: String,
    #[serde(rename = "z")]
    pub cumulative_filled_quantity: String,
    #[serde(rename = "L")]
    pub last_executed_price: String,
    #[serde(rename = "n")]
    pub commission_amount: String,
    /// Null until the order trades
    #[serde(rename = "N")]
    pub commission_asset: Option<String>,
    #[serde(rename = "T")]
    pub transaction_time: i64,
    #[serde(rename = "t")]
    pub trade_id: i64,
    #[serde(rename = "v", default, skip_serializing_if = "Option::is_none")]
    pub prevented_match_id: Option<i64>,
    #[serde(rename = "I")]
    pub execution_id: i64,
    #[serde(rename = "w")]
    pub is_on_book: bool,
    #[serde(rename = "m")]
    pub is_maker: bool,
    #[serde(rename = "M")]
    pub ignore: bool,
    #[serde(rename = "O")]
    pub creation_time: i64,
    #[serde(rename = "Z")]
    pub cumulative_quote_quantity: String,
    #[serde(rename = "Y")]
    pub last_quote_quantity: String,
    #[serde(rename = "Q")]
    pub quote_order_quantity: String,
    #[serde(rename = "W", default, skip_serializing_if = "Option::is_none")]
    pub working_time: Option<i64>,
    #[serde(rename = "V", default, skip_serializing_if = "Option::is_none")]
    pub self_trade_prevention_mode: Option<String>,
    #[serde(rename = "j", default, skip_serializing_if = "Option::is_none")]
    pub strategy_id: Option<i64>,
    #[serde(rename = "J", default, skip_serializing_if = "Option::is_none")]
    pub strategy_type: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOrder {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "i")]
    pub order_id: i64,
    #[serde(rename = "c")]
    pub client_order_id: String,
}

/// `listStatus`: OCO order list update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListStatus {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "g")]
    pub order_list_id: i64,
    #[serde(rename = "c")]
    pub contingency_type: String,
    #[serde(rename = "l")]
    pub list_status_type: String,
    #[serde(rename = "L")]
    pub list_order_status: String,
    #[serde(rename = "r")]
    pub list_reject_reason: String,
    #[serde(rename = "C")]
    pub list_client_order_id: String,
    #[serde(rename = "T")]
    pub transaction_time: i64,
    #[serde(rename = "O")]
    pub orders: Vec<ListOrder>,
}

/// A decoded user-data stream frame, tagged by its `e` field
#[derive(Debug, Clone, PartialEq)]
pub enum UserDataEvent {
    AccountPosition(AccountPosition),
    BalanceUpdate(BalanceUpdate),
    ExecutionReport(Box<ExecutionReport>),
    ListStatus(ListStatus),
    /// Any other event type, payload kept as received
    Unknown { event_type: String, payload: Value },
}

impl UserDataEvent {
    /// Decode one frame
    ///
    /// Frames that are not JSON objects with a string `e` are decoder errors.
    /// Unrecognised `e` values become [`UserDataEvent::Unknown`].
    pub fn decode(text: &str) -> Result<Self, ExchangeError> {
        let value: Value = serde_json::from_str(text).map_err(|e| {
            ExchangeError::DeserializationError(format!("Invalid user data frame: {}", e))
        })?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ExchangeError> {
        let event_type = value
            .get("e")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ExchangeError::DeserializationError(
                    "User data frame has no event type field 'e'".to_string(),
                )
            })?
            .to_string();

        let event = match event_type.as_str() {
            ACCOUNT_POSITION => Self::AccountPosition(payload(value, &event_type)?),
            BALANCE_UPDATE => Self::BalanceUpdate(payload(value, &event_type)?),
            EXECUTION_REPORT => Self::ExecutionReport(Box::new(payload(value, &event_type)?)),
            LIST_STATUS => Self::ListStatus(payload(value, &event_type)?),
            _ => Self::Unknown {
                event_type,
                payload: value,
            },
        };
        Ok(event)
    }

    /// The `e` discriminator of this event
    pub fn event_type(&self) -> &str {
        match self {
            Self::AccountPosition(_) => ACCOUNT_POSITION,
            Self::BalanceUpdate(_) => BALANCE_UPDATE,
            Self::ExecutionReport(_) => EXECUTION_REPORT,
            Self::ListStatus(_) => LIST_STATUS,
            Self::Unknown { event_type, .. } => event_type,
        }
    }
}

fn payload<T: serde::de::DeserializeOwned>(value: Value, event_type: &str) -> Result<T, ExchangeError> {
    serde_json::from_value(value).map_err(|e| {
        ExchangeError::DeserializationError(format!("Failed to parse {}: {}", event_type, e))
    })
}

/// Codec for the user-data stream
#[derive(Debug, Clone, Copy, Default)]
pub struct UserDataCodec;

impl WsCodec for UserDataCodec {
    type Message = UserDataEvent;

    fn decode_message(&self, message: Message) -> Result<Option<UserDataEvent>, ExchangeError> {
        match frame_text(&message)? {
            Some(text) => UserDataEvent::decode(text).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_event_is_kept_raw() {
        let frame = r#"{"e":"listenKeyExpired","E":1699596037418,"listenKey":"abc"}"#;
        let event = UserDataEvent::decode(frame).unwrap();
        match &event {
            UserDataEvent::Unknown {
                event_type,
                payload,
            } => {
                assert_eq!(event_type, "listenKeyExpired");
                assert_eq!(payload["listenKey"], "abc");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(event.event_type(), "listenKeyExpired");
    }

    #[test]
    fn test_missing_discriminator() {
        let err = UserDataEvent::decode(r#"{"result":null,"id":1}"#).unwrap_err();
        assert!(matches!(err, ExchangeError::DeserializationError(_)));
        assert!(UserDataEvent::decode("[1,2]").is_err());
    }

    #[test]
    fn test_known_type_with_bad_payload_is_an_error() {
        let err = UserDataEvent::decode(r#"{"e":"balanceUpdate","E":1}"#).unwrap_err();
        assert!(err.to_string().contains("balanceUpdate"));
    }

    #[test]
    fn test_balance_update() {
        let frame = r#"{"e":"balanceUpdate","E":1573200697110,"a":"BTC","d":"100.00000000","T":1573200697068}"#;
        let event = UserDataCodec
            .decode_message(Message::Text(frame.to_string()))
            .unwrap()
            .unwrap();
        match event {
            UserDataEvent::BalanceUpdate(update) => {
                assert_eq!(update.asset, "BTC");
                assert_eq!(update.balance_delta, "100.00000000");
                assert_eq!(update.clear_time, 1_573_200_697_068);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
