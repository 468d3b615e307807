//! Daraja wire types
//!
//! Request/response payloads for the Safaricom Daraja API. Field names
//! follow the gateway's PascalCase-with-ID convention exactly; the rest of
//! the engine only ever sees the neutral types from `haven_core::traits`.

use serde::{Deserialize, Serialize};

/// OAuth token response from `/oauth/v1/generate`
///
/// The gateway returns `expires_in` as a string.
#[derive(Debug, Deserialize)]
pub struct OAuthTokenResponse {
    pub access_token: String,
    pub expires_in: String,
}

/// STK push request for `/mpesa/stkpush/v1/processrequest`
#[derive(Debug, Serialize)]
pub struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Amount")]
    pub amount: u64,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub call_back_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

/// STK push acknowledgement
#[derive(Debug, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription")]
    pub response_description: Option<String>,
    #[serde(rename = "CustomerMessage")]
    pub customer_message: Option<String>,
}

/// STK push status query for `/mpesa/stkpushquery/v1/query`
#[derive(Debug, Serialize)]
pub struct StkQueryRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

/// STK push status verdict
#[derive(Debug, Deserialize)]
pub struct StkQueryResponse {
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription")]
    pub response_description: Option<String>,
    #[serde(rename = "ResultCode")]
    pub result_code: Option<String>,
    #[serde(rename = "ResultDesc")]
    pub result_desc: Option<String>,
    #[serde(rename = "MpesaReceiptNumber")]
    pub mpesa_receipt_number: Option<String>,
}

/// Callback envelope the gateway posts to the callback URL
#[derive(Debug, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

/// Callback body wrapper
#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

/// The actual push verdict inside a callback
///
/// Unlike the query response, the callback carries `ResultCode` as a
/// number.
#[derive(Debug, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: Option<String>,
    #[serde(rename = "CallbackMetadata")]
    pub callback_metadata: Option<CallbackMetadata>,
}

/// Metadata items attached to a successful callback
#[derive(Debug, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item")]
    pub item: Vec<CallbackItem>,
}

/// One name/value metadata pair
#[derive(Debug, Deserialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: Option<serde_json::Value>,
}

impl StkCallback {
    /// Extract a metadata value by name, stringified
    pub fn metadata_value(&self, name: &str) -> Option<String> {
        self.callback_metadata.as_ref().and_then(|meta| {
            meta.item
                .iter()
                .find(|item| item.name == name)
                .and_then(|item| item.value.as_ref())
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
        })
    }

    /// The receipt number, when present
    pub fn receipt(&self) -> Option<String> {
        self.metadata_value("MpesaReceiptNumber")
    }
}

/// Acknowledgement returned to the gateway for every callback
#[derive(Debug, Serialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i32,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl CallbackAck {
    /// The gateway retries anything that is not a zero ack, so every
    /// callback is acknowledged as processed.
    pub fn ok() -> Self {
        Self {
            result_code: 0,
            result_desc: "Callback processed successfully".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_request_field_names() {
        let req = StkPushRequest {
            business_short_code: "174379".to_string(),
            password: "cGFzcw==".to_string(),
            timestamp: "20240301120000".to_string(),
            transaction_type: "CustomerPayBillOnline".to_string(),
            amount: 406,
            party_a: "254712345678".to_string(),
            party_b: "174379".to_string(),
            phone_number: "254712345678".to_string(),
            call_back_url: "https://example.com/api/v1/payments/callback".to_string(),
            account_reference: "BOOKING-BK-1".to_string(),
            transaction_desc: "Payment for booking BK-1".to_string(),
        };

        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"BusinessShortCode\""));
        assert!(json.contains("\"CallBackURL\""));
        assert!(json.contains("\"Amount\":406"));
    }

    #[test]
    fn test_query_response_parsing() {
        let body = r#"{
            "ResponseCode": "0",
            "ResponseDescription": "The service request has been accepted successsfully",
            "MerchantRequestID": "22205-34066-1",
            "CheckoutRequestID": "ws_CO_13012021093521236557",
            "ResultCode": "0",
            "ResultDesc": "The service request is processed successfully.",
            "MpesaReceiptNumber": "R123"
        }"#;

        let parsed: StkQueryResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.response_code, "0");
        assert_eq!(parsed.result_code.as_deref(), Some("0"));
        assert_eq!(parsed.mpesa_receipt_number.as_deref(), Some("R123"));
    }

    #[test]
    fn test_callback_receipt_extraction() {
        let body = r#"{
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            { "Name": "Amount", "Value": 406.00 },
                            { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
                            { "Name": "TransactionDate", "Value": 20191219102115 },
                            { "Name": "PhoneNumber", "Value": 254712345678 }
                        ]
                    }
                }
            }
        }"#;

        let parsed: CallbackEnvelope = serde_json::from_str(body).unwrap();
        let callback = parsed.body.stk_callback;
        assert_eq!(callback.result_code, 0);
        assert_eq!(callback.receipt().as_deref(), Some("NLJ7RT61SV"));
        assert_eq!(
            callback.metadata_value("PhoneNumber").as_deref(),
            Some("254712345678")
        );
    }

    #[test]
    fn test_callback_without_metadata() {
        let body = r#"{
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 1032,
                    "ResultDesc": "Request cancelled by user"
                }
            }
        }"#;

        let parsed: CallbackEnvelope = serde_json::from_str(body).unwrap();
        let callback = parsed.body.stk_callback;
        assert_eq!(callback.result_code, 1032);
        assert!(callback.receipt().is_none());
    }
}
