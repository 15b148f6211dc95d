//! QIWI Wallet API: профиль, идентификация, история, балансы и платежи.
//!
//! Все методы требуют учетных данных кошелька (номер и токен API).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::client::{Wallet, query};
use crate::credential::{Credential, EndpointFamily};
use crate::error::{DomainError, QiwiError, Result};
use crate::models::{Payment, PaymentInfo, PaymentParams, RUB_NUMERIC, Sum};
use crate::transport::{HttpMethod, RequestBody};

/// Провайдер перевода на QIWI Кошелек.
pub const QIWI_WALLET_PROVIDER: &str = "99";
/// Провайдер конвертации между балансами кошелька.
pub const CONVERSION_PROVIDER: &str = "1099";
/// Валюты, в которые можно конвертировать рубли: тенге, доллар, евро.
pub const CONVERTIBLE_CURRENCIES: [&str; 3] = ["398", "840", "978"];

const MAX_HISTORY_ROWS: u32 = 50;
const MAX_BILL_ROWS: u32 = 50;
const BILL_READY_FOR_PAY: &str = "READY_FOR_PAY";

// Какие блоки профиля выгружать
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileOptions {
    pub auth_info: bool,
    pub contract_info: bool,
    pub user_info: bool,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        ProfileOptions {
            auth_info: true,
            contract_info: true,
            user_info: true,
        }
    }
}

/// Данные для упрощенной идентификации кошелька.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IdentificationRequest {
    pub birth_date: String, // ГГГГ-ММ-ДД
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub passport: String, // Серия и номер, только цифры
    pub inn: Option<String>,
    pub snils: Option<String>,
    pub oms: Option<String>,
}

/// Фильтр истории платежей.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    /// От 1 до 50.
    pub rows: u32,
    /// ALL, IN, OUT, QIWI_CARD.
    pub operation: String,
    /// QW_RUB, QW_USD, QW_EUR, CARD, MK.
    pub sources: Vec<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    // Продолжение предыдущей выборки
    pub next_txn_date: Option<String>,
    pub next_txn_id: Option<String>,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        HistoryQuery {
            rows: 10,
            operation: "ALL".to_string(),
            sources: Vec::new(),
            start_date: None,
            end_date: None,
            next_txn_date: None,
            next_txn_id: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHistory {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub next_txn_id: Option<Value>,
    #[serde(default)]
    pub next_txn_date: Option<String>,
}

/// Фильтр неоплаченных счетов кошелька. Границы передаются в Unix-time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BillsQuery {
    /// От 1 до 50; по умолчанию решает API.
    pub rows: Option<u32>,
    pub min_creation: Option<DateTime<Utc>>,
    pub max_creation: Option<DateTime<Utc>>,
    // Продолжение предыдущей выборки
    pub next_id: Option<String>,
    pub next_creation: Option<DateTime<Utc>>,
}

/// Пара ключей P2P.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct P2pKeyPair {
    pub public_key: String,
    pub secret_key: String,
}

impl P2pKeyPair {
    pub fn into_credential(self) -> Credential {
        Credential::invoicing(self.secret_key)
    }
}

impl fmt::Debug for P2pKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("P2pKeyPair")
            .field("public_key", &self.public_key)
            .field("secret_key", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptFormat {
    Pdf,
    Jpeg,
}

impl ReceiptFormat {
    fn as_str(self) -> &'static str {
        match self {
            ReceiptFormat::Pdf => "PDF",
            ReceiptFormat::Jpeg => "JPEG",
        }
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, false)
}

// Массивы в строке запроса передаются как name[0]=..&name[1]=..
fn indexed<'a>(
    name: &'a str,
    values: impl IntoIterator<Item = &'a String> + 'a,
) -> impl Iterator<Item = (String, Option<String>)> + 'a {
    values
        .into_iter()
        .enumerate()
        .map(move |(index, value)| (format!("{name}[{index}]"), Some(value.clone())))
}

impl Wallet {
    /// Профиль пользователя: настройки авторизации, данные кошелька, прочие данные.
    pub async fn profile(&self, options: ProfileOptions) -> Result<Value> {
        self.request_json(
            EndpointFamily::Wallet,
            HttpMethod::Get,
            &["person-profile", "v1", "profile", "current"],
            query([
                ("authInfoEnabled", Some(options.auth_info.to_string())),
                ("contractInfoEnabled", Some(options.contract_info.to_string())),
                ("userInfoEnabled", Some(options.user_info.to_string())),
            ]),
            None,
        )
        .await
    }

    /// Отправляет данные для идентификации кошелька.
    ///
    /// Нужен хотя бы один из номеров: ИНН, СНИЛС или полис ОМС.
    pub async fn identify(&self, request: &IdentificationRequest) -> Result<Value> {
        if request.inn.is_none() && request.snils.is_none() && request.oms.is_none() {
            return Err(QiwiError::InvalidArgument(
                "укажите минимум один из параметров: ИНН, СНИЛС, ОМС".to_string(),
            ));
        }
        let number = self.wallet_number()?;
        self.request_json(
            EndpointFamily::Wallet,
            HttpMethod::Post,
            &["identification", "v1", "persons", number, "identification"],
            BTreeMap::new(),
            Some(RequestBody::Json(serde_json::to_value(request)?)),
        )
        .await
    }

    /// Маскированные данные и статус идентификации.
    pub async fn identification(&self) -> Result<Value> {
        let number = self.wallet_number()?;
        self.request_json(
            EndpointFamily::Wallet,
            HttpMethod::Get,
            &["identification", "v1", "persons", number, "identification"],
            BTreeMap::new(),
            None,
        )
        .await
    }

    /// Текущие лимиты по типам операций (REFILL, TURNOVER, PAYMENTS_P2P и т.д.).
    pub async fn limits(&self, types: &[String]) -> Result<Value> {
        if types.is_empty() {
            return Err(QiwiError::InvalidArgument(
                "задайте хотя бы один тип операций для лимитов".to_string(),
            ));
        }
        let number = self.wallet_number()?;
        self.request_json(
            EndpointFamily::Wallet,
            HttpMethod::Get,
            &["qw-limits", "v1", "persons", number, "actual-limits"],
            query(indexed("types", types)),
            None,
        )
        .await
    }

    /// Ограничения исходящих платежей.
    pub async fn restrictions(&self) -> Result<Value> {
        let number = self.wallet_number()?;
        self.request_json(
            EndpointFamily::Wallet,
            HttpMethod::Get,
            &["person-profile", "v1", "persons", number, "status", "restrictions"],
            BTreeMap::new(),
            None,
        )
        .await
    }

    /// История платежей.
    ///
    /// Пустая выборка считается ошибкой [`DomainError::EmptyHistory`].
    pub async fn payments_history(&self, filter: &HistoryQuery) -> Result<PaymentHistory> {
        if !(1..=MAX_HISTORY_ROWS).contains(&filter.rows) {
            return Err(QiwiError::InvalidArgument(format!(
                "rows должно быть от 1 до {MAX_HISTORY_ROWS}, получено {}",
                filter.rows
            )));
        }
        let number = self.wallet_number()?;
        let params = query(
            [
                ("rows".to_string(), Some(filter.rows.to_string())),
                ("operation".to_string(), Some(filter.operation.clone())),
                ("startDate".to_string(), filter.start_date.as_ref().map(format_date)),
                ("endDate".to_string(), filter.end_date.as_ref().map(format_date)),
                ("nextTxnDate".to_string(), filter.next_txn_date.clone()),
                ("nextTxnId".to_string(), filter.next_txn_id.clone()),
            ]
            .into_iter()
            .chain(indexed("sources", &filter.sources)),
        );

        let body = self
            .request_json(
                EndpointFamily::Wallet,
                HttpMethod::Get,
                &["payment-history", "v2", "persons", number, "payments"],
                params,
                None,
            )
            .await?;
        let history: PaymentHistory = serde_json::from_value(body)?;
        if history.data.is_empty() {
            return Err(DomainError::EmptyHistory.into());
        }
        Ok(history)
    }

    /// Суммы входящих и исходящих платежей за период (не более 90 дней).
    pub async fn payments_total(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        operation: &str,
        sources: &[String],
    ) -> Result<Value> {
        if end < start {
            return Err(QiwiError::InvalidArgument(
                "конец периода раньше начала".to_string(),
            ));
        }
        let number = self.wallet_number()?;
        let params = query(
            [
                ("startDate".to_string(), Some(format_date(&start))),
                ("endDate".to_string(), Some(format_date(&end))),
                ("operation".to_string(), Some(operation.to_string())),
            ]
            .into_iter()
            .chain(indexed("sources", sources)),
        );
        self.request_json(
            EndpointFamily::Wallet,
            HttpMethod::Get,
            &["payment-history", "v2", "persons", number, "payments", "total"],
            params,
            None,
        )
        .await
    }

    /// Информация о транзакции из истории (содержимое поля `Transaction`).
    pub async fn transaction_info(
        &self,
        transaction_id: &str,
        transaction_type: Option<&str>,
    ) -> Result<Value> {
        let mut body = self
            .request_json(
                EndpointFamily::Wallet,
                HttpMethod::Get,
                &["payment-history", "v2", "transactions", transaction_id],
                query([("type", transaction_type.map(str::to_string))]),
                None,
            )
            .await?;
        body.get_mut("Transaction")
            .map(Value::take)
            .ok_or_else(|| DomainError::MalformedResponse("нет поля Transaction".to_string()).into())
    }

    /// Квитанция платежа файлом; тело возвращается как есть.
    pub async fn receipt_file(
        &self,
        transaction_id: &str,
        transaction_type: &str,
        format: ReceiptFormat,
    ) -> Result<Vec<u8>> {
        self.request_bytes(
            EndpointFamily::Wallet,
            HttpMethod::Get,
            &["payment-history", "v1", "transactions", transaction_id, "cheque", "file"],
            query([
                ("type", Some(transaction_type.to_string())),
                ("format", Some(format.as_str().to_string())),
            ]),
        )
        .await
    }

    /// Отправляет квитанцию платежа на e-mail.
    pub async fn send_receipt(
        &self,
        transaction_id: &str,
        transaction_type: &str,
        email: &str,
    ) -> Result<()> {
        self.request_raw(
            EndpointFamily::Wallet,
            HttpMethod::Post,
            &["payment-history", "v1", "transactions", transaction_id, "cheque", "send"],
            BTreeMap::new(),
            Some(RequestBody::Json(json!({
                "type": transaction_type,
                "email": email,
            }))),
        )
        .await?;
        Ok(())
    }

    /// Счета кошелька и их балансы.
    pub async fn balances(&self) -> Result<Value> {
        let number = self.wallet_number()?;
        self.request_json(
            EndpointFamily::Wallet,
            HttpMethod::Get,
            &["funding-sources", "v2", "persons", number, "accounts"],
            BTreeMap::new(),
            None,
        )
        .await
    }

    /// Создает новый счет (например, "qw_wallet_usd").
    pub async fn create_balance(&self, alias: &str) -> Result<()> {
        let number = self.wallet_number()?;
        self.request_raw(
            EndpointFamily::Wallet,
            HttpMethod::Post,
            &["funding-sources", "v2", "persons", number, "accounts"],
            BTreeMap::new(),
            Some(RequestBody::Json(json!({ "alias": alias }))),
        )
        .await?;
        Ok(())
    }

    /// Счета, которые можно создать.
    pub async fn balance_offers(&self) -> Result<Value> {
        let number = self.wallet_number()?;
        self.request_json(
            EndpointFamily::Wallet,
            HttpMethod::Get,
            &["funding-sources", "v2", "persons", number, "accounts", "offer"],
            BTreeMap::new(),
            None,
        )
        .await
    }

    /// Делает счет счетом по умолчанию.
    pub async fn set_default_balance(&self, alias: &str) -> Result<()> {
        let number = self.wallet_number()?;
        self.request_raw(
            EndpointFamily::Wallet,
            HttpMethod::Patch,
            &["funding-sources", "v2", "persons", number, "accounts", alias],
            BTreeMap::new(),
            Some(RequestBody::Json(json!({ "defaultAccount": true }))),
        )
        .await?;
        Ok(())
    }

    /// Полная комиссия за платеж провайдеру; по умолчанию получатель - сам кошелек.
    pub async fn commission(
        &self,
        provider_id: &str,
        amount: f64,
        account: Option<&str>,
    ) -> Result<f64> {
        let number = self.wallet_number()?;
        let payload = json!({
            "account": account.unwrap_or(number),
            "paymentMethod": {"type": "Account", "accountId": RUB_NUMERIC},
            "purchaseTotals": {"total": Sum::rub(amount)},
        });
        let body = self
            .request_json(
                EndpointFamily::Wallet,
                HttpMethod::Post,
                &["sinap", "providers", provider_id, "onlineCommission"],
                BTreeMap::new(),
                Some(RequestBody::Json(payload)),
            )
            .await?;
        body.pointer("/qwCommission/amount")
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                DomainError::MalformedResponse("нет поля qwCommission.amount".to_string()).into()
            })
    }

    pub async fn nickname(&self) -> Result<String> {
        let number = self.wallet_number()?;
        let body = self
            .request_json(
                EndpointFamily::Wallet,
                HttpMethod::Get,
                &["qw-nicknames", "v1", "persons", number, "nickname"],
                BTreeMap::new(),
                None,
            )
            .await?;
        body.get("nickname")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DomainError::MalformedResponse("нет поля nickname".to_string()).into())
    }

    /// Курсы конвертации валют.
    pub async fn cross_rates(&self) -> Result<Value> {
        let mut body = self
            .request_json(
                EndpointFamily::Wallet,
                HttpMethod::Get,
                &["sinap", "crossRates"],
                BTreeMap::new(),
                None,
            )
            .await?;
        body.get_mut("result")
            .map(Value::take)
            .ok_or_else(|| DomainError::MalformedResponse("нет поля result".to_string()).into())
    }

    /// Платеж в пользу провайдера `provider_id`.
    pub async fn pay_provider(&self, provider_id: &str, payment: &Payment) -> Result<PaymentInfo> {
        let body = self
            .request_json(
                EndpointFamily::Wallet,
                HttpMethod::Post,
                &["sinap", "api", "v2", "terms", provider_id, "payments"],
                BTreeMap::new(),
                Some(RequestBody::Json(payment.to_json()?)),
            )
            .await?;
        PaymentInfo::from_response(&body)
    }

    /// Перевод на другой QIWI Кошелек.
    pub async fn pay_to_wallet(
        &self,
        amount: f64,
        to: &str,
        comment: Option<String>,
    ) -> Result<PaymentInfo> {
        let mut payment = Payment::new(amount).with_account(to);
        payment.comment = comment;
        self.pay_provider(QIWI_WALLET_PROVIDER, &payment).await
    }

    /// Конвертация рублей в валюту и зачисление на валютный счет `to`.
    pub async fn convert_currency(&self, amount: f64, currency: &str, to: &str) -> Result<PaymentInfo> {
        if !CONVERTIBLE_CURRENCIES.contains(&currency) {
            return Err(QiwiError::InvalidArgument(format!(
                "валюта {currency} недоступна для конвертации"
            )));
        }
        let payment = Payment::from_params(PaymentParams {
            sum: Some(Sum {
                amount,
                currency: currency.to_string(),
            }),
            ..Default::default()
        })
        .with_account(to);
        self.pay_provider(CONVERSION_PROVIDER, &payment).await
    }

    /// Перевод на банковскую карту; провайдера можно узнать через
    /// [`Wallet::detect_card_provider`].
    pub async fn pay_to_card(
        &self,
        amount: f64,
        card_number: &str,
        provider_id: &str,
    ) -> Result<PaymentInfo> {
        let payment = Payment::new(amount).with_account(card_number);
        self.pay_provider(provider_id, &payment).await
    }

    /// Определяет провайдера для перевода на карту по ее номеру.
    pub async fn detect_card_provider(&self, card_number: &str) -> Result<String> {
        self.detect_provider("card", "cardNumber", card_number)
            .await
    }

    /// Определяет оператора по номеру телефона (без префикса 8).
    pub async fn detect_mobile_provider(&self, phone: &str) -> Result<String> {
        self.detect_provider("mobile", "phone", phone).await
    }

    // Формы qiwi.com/{kind}/detect.action: code.value "0" и id провайдера в message
    async fn detect_provider(&self, kind: &str, field: &str, value: &str) -> Result<String> {
        let mut form = BTreeMap::new();
        form.insert(field.to_string(), value.to_string());
        let body = self
            .request_json(
                EndpointFamily::WalletForm,
                HttpMethod::Post,
                &[kind, "detect.action"],
                BTreeMap::new(),
                Some(RequestBody::Form(form)),
            )
            .await?;

        let message = body
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| DomainError::MalformedResponse("нет поля message".to_string()))?;
        match body.pointer("/code/value").and_then(Value::as_str) {
            Some("0") => Ok(message.to_string()),
            _ => Err(QiwiError::InvalidArgument(format!(
                "провайдер не определен ({kind}): {message}"
            ))),
        }
    }

    /// Пополнение мобильного телефона; провайдера дает [`Wallet::detect_mobile_provider`].
    pub async fn pay_mobile(
        &self,
        provider_id: &str,
        amount: f64,
        phone: &str,
    ) -> Result<PaymentInfo> {
        let payment = Payment::new(amount).with_account(phone);
        self.pay_provider(provider_id, &payment).await
    }

    /// Неоплаченные счета, выставленные на этот кошелек.
    pub async fn list_bills(&self, filter: &BillsQuery) -> Result<Vec<Value>> {
        if let Some(rows) = filter.rows {
            if !(1..=MAX_BILL_ROWS).contains(&rows) {
                return Err(QiwiError::InvalidArgument(format!(
                    "rows должно быть от 1 до {MAX_BILL_ROWS}, получено {rows}"
                )));
            }
        }
        let unix = |date: &DateTime<Utc>| date.timestamp().to_string();
        let params = query([
            ("statuses", Some(BILL_READY_FOR_PAY.to_string())),
            ("rows", filter.rows.map(|rows| rows.to_string())),
            ("min_creation_datetime", filter.min_creation.as_ref().map(unix)),
            ("max_creation_datetime", filter.max_creation.as_ref().map(unix)),
            ("next_id", filter.next_id.clone()),
            ("next_creation_datetime", filter.next_creation.as_ref().map(unix)),
        ]);

        let mut body = self
            .request_json(
                EndpointFamily::Wallet,
                HttpMethod::Get,
                &["checkout-api", "api", "bill", "search"],
                params,
                None,
            )
            .await?;
        match body.get_mut("bills").map(Value::take) {
            Some(Value::Array(bills)) => Ok(bills),
            _ => Err(DomainError::MalformedResponse("нет списка bills".to_string()).into()),
        }
    }

    /// Оплата счета с баланса кошелька без SMS-подтверждения.
    pub async fn pay_bill(&self, invoice_uid: &str, currency: &str) -> Result<Value> {
        self.request_json(
            EndpointFamily::Wallet,
            HttpMethod::Post,
            &["checkout-api", "invoice", "pay", "wallet"],
            BTreeMap::new(),
            Some(RequestBody::Json(json!({
                "invoice_uid": invoice_uid,
                "currency": currency,
            }))),
        )
        .await
    }

    /// Отклоняет неоплаченный счет; после этого оплатить его нельзя.
    pub async fn reject_bill(&self, bill_id: &str) -> Result<()> {
        self.request_raw(
            EndpointFamily::Wallet,
            HttpMethod::Post,
            &["checkout-api", "api", "bill", "reject"],
            BTreeMap::new(),
            Some(RequestBody::Json(json!({ "id": bill_id }))),
        )
        .await?;
        Ok(())
    }

    /// Выпускает пару ключей P2P; секретный ключ годится для [`Credential::invoicing`].
    pub async fn create_p2p_keys(
        &self,
        pair_name: &str,
        notifications_url: Option<&str>,
    ) -> Result<P2pKeyPair> {
        let body = self
            .request_json(
                EndpointFamily::Wallet,
                HttpMethod::Post,
                &["widgets-api", "api", "p2p", "protected", "keys", "create"],
                BTreeMap::new(),
                Some(RequestBody::Json(json!({
                    "keysPairName": pair_name,
                    "serverNotificationsUrl": notifications_url,
                }))),
            )
            .await?;
        serde_json::from_value(body)
            .map_err(|err| DomainError::MalformedResponse(err.to_string()).into())
    }
}
