use std::fmt;

use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{DomainError, Result};

pub const RUB_NUMERIC: &str = "643";
pub const RUB_ALPHA: &str = "RUB";

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// --- Платежи (sinap API) ---

// Целые значения f64, представимые без потерь
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

// Целая сумма уходит без дробной части: 10, а не 10.0
fn serialize_amount<S: Serializer>(
    amount: &f64,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    if amount.fract() == 0.0 && amount.abs() < MAX_EXACT_INTEGER {
        serializer.serialize_i64(*amount as i64)
    } else {
        serializer.serialize_f64(*amount)
    }
}

// Сумма
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Sum {
    #[serde(serialize_with = "serialize_amount")]
    pub amount: f64,
    pub currency: String, // Числовой код ISO 4217 ("643" - рубли)
}

impl Sum {
    pub fn rub(amount: f64) -> Self {
        Sum {
            amount,
            currency: RUB_NUMERIC.to_string(),
        }
    }
}

// Способ оплаты
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    #[serde(rename = "type")]
    pub method_type: String, // "Account" - списание с баланса кошелька
    pub account_id: String,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod {
            method_type: "Account".to_string(),
            account_id: RUB_NUMERIC.to_string(),
        }
    }
}

/// Параметры платежа. Каждое незаданное поле получает значение по умолчанию.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentParams {
    /// Ключ идемпотентности; по умолчанию новый UUID.
    pub id: Option<String>,
    /// Сумма; по умолчанию `amount` в рублях ("643").
    pub sum: Option<Sum>,
    /// Используется, только если не задана `sum`.
    pub amount: Option<f64>,
    /// По умолчанию списание с рублевого баланса.
    pub payment_method: Option<PaymentMethod>,
    /// Реквизиты получателя (account и т.п.).
    pub fields: Option<Map<String, Value>>,
    pub comment: Option<String>,
}

/// Данные для платежа на провайдера в QIWI Кошельке.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub sum: Sum,
    pub payment_method: PaymentMethod,
    pub fields: Option<Map<String, Value>>,
    pub comment: Option<String>,
}

impl Payment {
    /// Платеж на сумму в рублях со всеми значениями по умолчанию.
    pub fn new(amount: f64) -> Self {
        Payment::from_params(PaymentParams {
            amount: Some(amount),
            ..Default::default()
        })
    }

    pub fn from_params(params: PaymentParams) -> Self {
        let sum = params
            .sum
            .unwrap_or_else(|| Sum::rub(params.amount.unwrap_or_default()));
        Payment {
            id: params.id.unwrap_or_else(new_id),
            sum,
            payment_method: params.payment_method.unwrap_or_default(),
            fields: params.fields,
            comment: params.comment,
        }
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.fields
            .get_or_insert_with(Map::new)
            .insert("account".to_string(), Value::String(account.into()));
        self
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TransactionState {
    pub code: Option<String>, // "Accepted"
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaymentTransaction {
    pub id: Option<String>,
    pub state: Option<TransactionState>,
}

/// Данные платежной транзакции, возвращаемые платежным API.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct PaymentInfo {
    pub id: Option<String>,
    pub terms: Option<String>, // Идентификатор провайдера
    pub fields: Option<Map<String, Value>>,
    pub sum: Option<Value>,
    pub source: Option<String>, // "account_643"
    pub comment: Option<String>,
    pub transaction: Option<PaymentTransaction>,
    pub state: Option<Value>,
}

impl PaymentInfo {
    /// Проекция ответа; состав полей зависит от типа платежа, обязательных нет.
    pub fn from_response(body: &Value) -> Result<Self> {
        let payload = body.get("PaymentInfo").unwrap_or(body);
        Ok(serde_json::from_value(payload.clone())?)
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction.as_ref()?.id.as_deref()
    }
}

// --- Счета P2P ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InvoiceAmount {
    pub value: String, // Сумма с двумя знаками после точки, "100.00"
    pub currency: String, // "RUB"
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceStatus {
    pub value: String, // "WAITING", "PAID", "REJECTED", "EXPIRED"
    #[serde(default)]
    pub changed_date_time: Option<String>,
}

/// Параметры нового счета.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceRequest {
    /// Уникальный идентификатор счета в вашей системе; по умолчанию новый UUID.
    pub bill_id: Option<String>,
    pub amount: InvoiceAmount,
    /// По умолчанию через час от момента выставления.
    pub expiration: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub custom_fields: Option<Map<String, Value>>,
}

impl InvoiceRequest {
    pub fn new(value: f64) -> Self {
        InvoiceRequest {
            bill_id: None,
            amount: InvoiceAmount {
                value: format!("{value:.2}"),
                currency: RUB_ALPHA.to_string(),
            },
            expiration: None,
            comment: None,
            custom_fields: None,
        }
    }

    pub fn bill_id(mut self, bill_id: impl Into<String>) -> Self {
        self.bill_id = Some(bill_id.into());
        self
    }

    pub fn expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration = Some(expiration);
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Идентификатор счета и тело запроса на выставление.
    pub fn into_wire(self, now: DateTime<Utc>) -> (String, Value) {
        let bill_id = self.bill_id.unwrap_or_else(new_id);
        let expiration = self
            .expiration
            .unwrap_or_else(|| now + ChronoDuration::hours(1));

        let mut body = Map::new();
        body.insert("amount".to_string(), serde_json::json!(self.amount));
        body.insert(
            "expirationDateTime".to_string(),
            Value::String(expiration.to_rfc3339_opts(SecondsFormat::Secs, false)),
        );
        if let Some(comment) = self.comment {
            body.insert("comment".to_string(), Value::String(comment));
        }
        if let Some(custom_fields) = self.custom_fields {
            body.insert("customFields".to_string(), Value::Object(custom_fields));
        }
        (bill_id, Value::Object(body))
    }
}

/// Счет P2P в том виде, в котором его возвращает API.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[serde(default)]
    pub site_id: Option<String>,
    pub bill_id: String,
    #[serde(default)]
    pub amount: Option<InvoiceAmount>,
    #[serde(default)]
    pub status: Option<InvoiceStatus>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub creation_date_time: Option<String>,
    #[serde(default)]
    pub expiration_date_time: Option<String>,
    pub pay_url: String,
    #[serde(default)]
    pub custom_fields: Option<Map<String, Value>>,
}

impl Invoice {
    pub fn from_response(body: &Value) -> Result<Self> {
        for field in ["billId", "payUrl"] {
            if body.get(field).and_then(Value::as_str).is_none() {
                return Err(DomainError::MalformedResponse(format!(
                    "в счете отсутствует поле {field}"
                ))
                .into());
            }
        }
        serde_json::from_value(body.clone())
            .map_err(|err| DomainError::MalformedResponse(err.to_string()).into())
    }

    pub fn status_value(&self) -> Option<&str> {
        self.status.as_ref().map(|status| status.value.as_str())
    }
}

impl fmt::Display for Invoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pay_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QiwiError;
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn default_payment_scenario() {
        let payment = Payment::new(10.0);
        let wire = payment.to_json().unwrap();

        let id = wire["id"].as_str().unwrap();
        assert!(!id.is_empty());
        assert_eq!(
            wire,
            json!({
                "id": id,
                "sum": {"amount": 10, "currency": "643"},
                "paymentMethod": {"type": "Account", "accountId": "643"},
                "fields": null,
                "comment": null,
            })
        );
        assert_eq!(wire["sum"]["amount"], json!(10));
    }

    #[test]
    fn fractional_amounts_keep_their_fraction() {
        assert_eq!(serde_json::to_value(Sum::rub(1.5)).unwrap()["amount"], json!(1.5));
        assert_eq!(serde_json::to_value(Sum::rub(0.0)).unwrap()["amount"], json!(0));
        assert_eq!(serde_json::to_value(Sum::rub(-3.0)).unwrap()["amount"], json!(-3));
        // Ответы API с дробной суммой по-прежнему читаются
        let sum: Sum = serde_json::from_value(json!({"amount": 10, "currency": "643"})).unwrap();
        assert_eq!(sum.amount, 10.0);
    }

    #[test]
    fn generated_ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| Payment::new(1.0).id).collect();
        assert_eq!(ids.len(), 1000);
        assert!(ids.iter().all(|id| !id.is_empty()));
    }

    #[test]
    fn caller_values_are_honored_and_serialization_is_stable() {
        let mut fields = Map::new();
        fields.insert("account".into(), json!("79001234567"));
        let params = PaymentParams {
            id: Some("1600000000000".into()),
            sum: Some(Sum {
                amount: 1.5,
                currency: "840".into(),
            }),
            amount: Some(99.0),
            payment_method: None,
            fields: Some(fields.clone()),
            comment: Some("за обед".into()),
        };
        let payment = Payment::from_params(params.clone());

        let first = serde_json::to_string(&payment).unwrap();
        let second = serde_json::to_string(&payment).unwrap();
        assert_eq!(first, second);
        assert_eq!(payment.id, "1600000000000");
        assert_eq!(payment.sum.currency, "840");
        assert_eq!(payment.fields, Some(fields));
        // Параметры вызывающего кода не изменились
        assert_eq!(params.comment.as_deref(), Some("за обед"));
    }

    #[test]
    fn with_account_fills_fields() {
        let payment = Payment::new(5.0).with_account("4111111111111111");
        assert_eq!(
            payment.fields.unwrap()["account"],
            json!("4111111111111111")
        );
    }

    #[test]
    fn payment_info_projection_accepts_partial_bodies() {
        let body = json!({
            "id": "11111111111111",
            "sum": {"amount": 100, "currency": "643"},
            "fields": {"account": "+79121112233"},
            "source": "account_643",
            "transaction": {"id": "4969142201", "state": {"code": "Accepted"}}
        });
        let info = PaymentInfo::from_response(&body).unwrap();
        assert_eq!(info.id.as_deref(), Some("11111111111111"));
        assert_eq!(info.transaction_id(), Some("4969142201"));
        assert_eq!(
            info.transaction.unwrap().state.unwrap().code.as_deref(),
            Some("Accepted")
        );

        let wrapped = json!({"PaymentInfo": {"id": "1"}});
        assert_eq!(PaymentInfo::from_response(&wrapped).unwrap().id.as_deref(), Some("1"));

        assert_eq!(PaymentInfo::from_response(&json!({})).unwrap(), PaymentInfo::default());
    }

    fn bill_body() -> Value {
        json!({
            "siteId": "9hh4jb-00",
            "billId": "cc961e8d-d4d6-4f02-b737-2297e51fb48e",
            "amount": {"currency": "RUB", "value": "42.24"},
            "status": {"value": "WAITING", "changedDateTime": "2019-08-28T16:26:36.835+03:00"},
            "comment": "Text comment",
            "creationDateTime": "2019-08-28T16:26:36.835+03:00",
            "expirationDateTime": "2019-09-13T14:30:00+03:00",
            "payUrl": "https://oplata.qiwi.com/form/?invoice_uid=d875277b"
        })
    }

    #[test]
    fn invoice_displays_pay_url() {
        let invoice = Invoice::from_response(&bill_body()).unwrap();
        assert_eq!(invoice.to_string(), "https://oplata.qiwi.com/form/?invoice_uid=d875277b");
        assert_eq!(invoice.status_value(), Some("WAITING"));
        assert_eq!(invoice.amount.unwrap().value, "42.24");
    }

    #[test]
    fn invoice_requires_bill_id_and_pay_url() {
        for field in ["billId", "payUrl"] {
            let mut body = bill_body();
            body.as_object_mut().unwrap().remove(field);
            match Invoice::from_response(&body) {
                Err(QiwiError::Domain(DomainError::MalformedResponse(message))) => {
                    assert!(message.contains(field))
                }
                other => panic!("unexpected: {other:?}"),
            }
        }
    }

    #[test]
    fn invoice_request_defaults() {
        let now = Utc.with_ymd_and_hms(2020, 5, 1, 12, 0, 0).unwrap();
        let (bill_id, body) = InvoiceRequest::new(100.0).comment("заказ 1").into_wire(now);

        assert!(!bill_id.is_empty());
        assert_eq!(body["amount"], json!({"value": "100.00", "currency": "RUB"}));
        assert_eq!(body["expirationDateTime"], json!("2020-05-01T13:00:00+00:00"));
        assert_eq!(body["comment"], json!("заказ 1"));
        assert!(body.get("customFields").is_none());

        let (bill_id, _) = InvoiceRequest::new(1.0).bill_id("order-7").into_wire(now);
        assert_eq!(bill_id, "order-7");
    }
}
