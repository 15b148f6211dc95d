//! QIWI P2P API: выставление, проверка и отмена счетов.
//!
//! Доступно только для кошелька, созданного с секретным ключом P2P.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::client::Wallet;
use crate::credential::EndpointFamily;
use crate::error::Result;
use crate::models::{Invoice, InvoiceRequest};
use crate::transport::{HttpMethod, RequestBody};

const BILLS_PATH: [&str; 4] = ["partner", "bill", "v1", "bills"];

impl Wallet {
    /// Выставляет новый счет.
    ///
    /// Повторный вызов с тем же `bill_id` не создает второй счет: API
    /// возвращает уже выставленный.
    pub async fn create_invoice(&self, request: InvoiceRequest) -> Result<Invoice> {
        let (bill_id, body) = request.into_wire(Utc::now());
        let body = self
            .request_json(
                EndpointFamily::Invoicing,
                HttpMethod::Put,
                &bill_path(&bill_id, None),
                BTreeMap::new(),
                Some(RequestBody::Json(body)),
            )
            .await?;
        Invoice::from_response(&body)
    }

    /// Проверяет статус счета.
    pub async fn invoice_status(&self, bill_id: &str) -> Result<Invoice> {
        let body = self
            .request_json(
                EndpointFamily::Invoicing,
                HttpMethod::Get,
                &bill_path(bill_id, None),
                BTreeMap::new(),
                None,
            )
            .await?;
        Invoice::from_response(&body)
    }

    /// Отменяет неоплаченный счет.
    pub async fn cancel_invoice(&self, bill_id: &str) -> Result<Invoice> {
        let body = self
            .request_json(
                EndpointFamily::Invoicing,
                HttpMethod::Post,
                &bill_path(bill_id, Some("reject")),
                BTreeMap::new(),
                None,
            )
            .await?;
        Invoice::from_response(&body)
    }
}

fn bill_path<'a>(bill_id: &'a str, action: Option<&'a str>) -> Vec<&'a str> {
    let mut segments: Vec<&'a str> = BILLS_PATH.to_vec();
    segments.push(bill_id);
    segments.extend(action);
    segments
}
