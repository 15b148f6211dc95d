use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::credential::{Credential, EndpointFamily};
use crate::error::{QiwiError, Result};
use crate::response::{BodyKind, DecodedBody, ResponseOutcome, classify_as};
use crate::transport::{
    HttpMethod, RawResponse, RequestBody, RequestSpec, ReqwestTransport, Transport, TransportError,
};

// --- Клиент QIWI ---

/// Кошелек QIWI: учетные данные, настройки и транспорт.
///
/// Учетные данные задаются один раз при создании и определяют, какие методы
/// доступны: токен кошелька открывает Wallet API, секретный ключ P2P - только
/// выставление счетов. Клонирование дешевое, транспорт разделяется.
#[derive(Clone)]
pub struct Wallet {
    credential: Credential,
    config: ClientConfig,
    transport: Arc<dyn Transport>,
}

impl Wallet {
    /// Создает кошелек с настройками по умолчанию и транспортом `reqwest`.
    pub fn new(credential: Credential) -> Result<Self> {
        Wallet::with_config(credential, ClientConfig::default())
    }

    pub fn with_config(credential: Credential, config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.request_timeout)?;
        Ok(Wallet::with_transport(credential, config, Arc::new(transport)))
    }

    /// Кошелек с собственным транспортом (прокси, тестовые заглушки).
    pub fn with_transport(
        credential: Credential,
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Wallet {
            credential,
            config,
            transport,
        }
    }

    /// Учетные данные из `QIWI_WALLET_NUMBER`/`QIWI_WALLET_TOKEN` или `QIWI_P2P_SECRET_KEY`.
    pub fn from_env() -> Result<Self> {
        Wallet::new(Credential::from_env()?)
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn wallet_number(&self) -> Result<&str> {
        self.credential.wallet_number()
    }

    /// Выполняет вызов API и возвращает тело успешного ответа.
    ///
    /// Учетные данные проверяются до обращения к сети. Сетевые сбои
    /// повторяются согласно [`ClientConfig::retry`], HTTP-ошибки возвращаются
    /// сразу как [`QiwiError::Http`].
    pub async fn call(
        &self,
        family: EndpointFamily,
        method: HttpMethod,
        url: Url,
        query: BTreeMap<String, String>,
        body: Option<RequestBody>,
    ) -> Result<DecodedBody> {
        self.execute(family, method, url, query, body, BodyKind::Json)
            .await
    }

    #[instrument(skip(self, url, query, body), fields(url = %url))]
    async fn execute(
        &self,
        family: EndpointFamily,
        method: HttpMethod,
        url: Url,
        query: BTreeMap<String, String>,
        body: Option<RequestBody>,
        kind: BodyKind,
    ) -> Result<DecodedBody> {
        let headers = self.credential.headers(family)?;
        let request = RequestSpec {
            method,
            url,
            headers,
            query,
            body,
        };

        let raw = self.dispatch(&request).await?;
        let outcome = classify_as(raw, kind);
        match &outcome {
            ResponseOutcome::Success { status, .. } => debug!(status, "request succeeded"),
            ResponseOutcome::Failure { status, .. } => warn!(
                status,
                server_fault = outcome.is_server_fault(),
                "request failed"
            ),
        }
        outcome.into_result()
    }

    async fn dispatch(&self, request: &RequestSpec) -> Result<RawResponse> {
        let transport = self.transport.as_ref();
        let attempt_timeout = self.config.request_timeout;

        let attempts = self.config.retry.run(|| async move {
            match tokio::time::timeout(attempt_timeout, transport.send(request)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(format!(
                    "нет ответа за {attempt_timeout:?}"
                ))),
            }
        });

        match self.config.deadline {
            Some(deadline) => tokio::time::timeout(deadline, attempts)
                .await
                .map_err(|_| QiwiError::Timeout(deadline))?,
            None => attempts.await,
        }
    }

    // Внутренний метод: URL по сегментам пути, вызов и разбор JSON
    pub(crate) async fn request_json(
        &self,
        family: EndpointFamily,
        method: HttpMethod,
        segments: &[&str],
        query: BTreeMap<String, String>,
        body: Option<RequestBody>,
    ) -> Result<Value> {
        let url = self.config.endpoint(family, segments)?;
        self.call(family, method, url, query, body).await?.into_json()
    }

    // Файл: байты ответа возвращаются без разбора
    pub(crate) async fn request_bytes(
        &self,
        family: EndpointFamily,
        method: HttpMethod,
        segments: &[&str],
        query: BTreeMap<String, String>,
    ) -> Result<Vec<u8>> {
        let url = self.config.endpoint(family, segments)?;
        let body = self
            .execute(family, method, url, query, None, BodyKind::Binary)
            .await?;
        Ok(body.into_bytes())
    }

    // Тело ответа не требуется как JSON (204 без тела)
    pub(crate) async fn request_raw(
        &self,
        family: EndpointFamily,
        method: HttpMethod,
        segments: &[&str],
        query: BTreeMap<String, String>,
        body: Option<RequestBody>,
    ) -> Result<DecodedBody> {
        let url = self.config.endpoint(family, segments)?;
        self.call(family, method, url, query, body).await
    }
}

/// Собирает параметры строки запроса, пропуская незаданные значения.
pub(crate) fn query<I, K>(pairs: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, Option<String>)>,
    K: Into<String>,
{
    pairs
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key.into(), value)))
        .collect()
}
