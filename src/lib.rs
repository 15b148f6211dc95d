//! Клиент QIWI Wallet API и QIWI P2P API.
//!
//! ```no_run
//! use qiwi_rs::{Credential, InvoiceRequest, Wallet};
//!
//! # async fn example() -> qiwi_rs::Result<()> {
//! // ВАЖНО: не храните ключи прямо в коде, используйте переменные окружения.
//! let wallet = Wallet::new(Credential::invoicing("p2p-secret-key"))?;
//! let invoice = wallet
//!     .create_invoice(InvoiceRequest::new(10.0).comment("Тестовый заказ №123"))
//!     .await?;
//! println!("Ссылка на оплату: {invoice}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod models;
pub mod p2p;
pub mod response;
pub mod retry;
pub mod transport;
pub mod wallet_api;

pub use client::Wallet;
pub use config::ClientConfig;
pub use credential::{Credential, CredentialKind, EndpointFamily};
pub use error::{AuthError, DomainError, ErrorDescriptor, ProviderError, QiwiError, Result, describe};
pub use models::{
    Invoice, InvoiceAmount, InvoiceRequest, InvoiceStatus, Payment, PaymentInfo, PaymentMethod,
    PaymentParams, Sum,
};
pub use response::{BodyKind, DecodedBody, ResponseOutcome, classify, classify_as};
pub use retry::RetryPolicy;
pub use transport::{
    HttpMethod, RawResponse, RequestBody, RequestSpec, ReqwestTransport, Transport, TransportError,
};
pub use wallet_api::{
    BillsQuery, HistoryQuery, IdentificationRequest, P2pKeyPair, PaymentHistory, ProfileOptions,
    ReceiptFormat,
};
