//! Транспортный уровень: один HTTP-обмен без какой-либо интерпретации статуса.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Method};
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Сетевые ошибки. HTTP-ответ с кодом ошибки сюда не относится.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("таймаут запроса: {0}")]
    Timeout(String),

    #[error("ошибка соединения: {0}")]
    Connect(String),

    #[error("ошибка ввода-вывода: {0}")]
    Io(String),

    #[error("некорректный запрос: {0}")]
    Request(String),
}

impl TransportError {
    /// Имеет ли смысл повторить тот же запрос.
    pub fn is_transient(&self) -> bool {
        !matches!(self, TransportError::Request(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_builder() {
            TransportError::Request(err.to_string())
        } else {
            TransportError::Io(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Patch,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Post => Method::POST,
            HttpMethod::Patch => Method::PATCH,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(BTreeMap<String, String>), // application/x-www-form-urlencoded
}

/// Полностью собранный запрос. Создается заново на каждый вызов.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
}

impl RequestSpec {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        RequestSpec {
            method,
            url,
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            body: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestSpec) -> Result<RawResponse, TransportError>;
}

/// Транспорт по умолчанию поверх `reqwest`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = ReqwestClient::builder().timeout(timeout).build()?;
        Ok(ReqwestTransport { client })
    }

    /// Использует уже настроенный клиент (прокси, пулы соединений и т.д.).
    pub fn with_client(client: ReqwestClient) -> Self {
        ReqwestTransport { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestSpec) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.into(), request.url.clone());

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match &request.body {
            Some(RequestBody::Json(payload)) => builder.json(payload),
            Some(RequestBody::Form(fields)) => builder.form(fields),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_malformed_requests_are_permanent() {
        assert!(TransportError::Timeout("t".into()).is_transient());
        assert!(TransportError::Connect("c".into()).is_transient());
        assert!(TransportError::Io("i".into()).is_transient());
        assert!(!TransportError::Request("r".into()).is_transient());
    }

    #[test]
    fn methods_map_to_reqwest() {
        assert_eq!(Method::from(HttpMethod::Get), Method::GET);
        assert_eq!(Method::from(HttpMethod::Put), Method::PUT);
        assert_eq!(Method::from(HttpMethod::Post), Method::POST);
        assert_eq!(Method::from(HttpMethod::Patch), Method::PATCH);
    }

    #[tokio::test]
    async fn refused_connection_is_transient() {
        let transport = ReqwestTransport::new(Duration::from_secs(2)).unwrap();
        // Порт 9 (discard) на localhost обычно закрыт
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        let err = transport
            .send(&RequestSpec::new(HttpMethod::Get, url))
            .await
            .unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err:?}");
    }
}
