use std::time::Duration;

use url::Url;

use crate::credential::EndpointFamily;
use crate::error::{QiwiError, Result};
use crate::retry::RetryPolicy;

// --- Константы ---
pub const QIWI_EDGE_BASE_URL: &str = "https://edge.qiwi.com/";
pub const QIWI_P2P_BASE_URL: &str = "https://api.qiwi.com/";
pub const QIWI_WEB_BASE_URL: &str = "https://qiwi.com/";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Настройки клиента: адреса API, таймауты и политика повторов.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub edge_url: Url,
    pub p2p_url: Url,
    pub web_url: Url,
    /// Таймаут одной попытки.
    pub request_timeout: Duration,
    /// Ограничение на весь вызов вместе с повторами и паузами.
    pub deadline: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            edge_url: parse_static(QIWI_EDGE_BASE_URL),
            p2p_url: parse_static(QIWI_P2P_BASE_URL),
            web_url: parse_static(QIWI_WEB_BASE_URL),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            deadline: None,
            retry: RetryPolicy::default(),
        }
    }
}

fn parse_static(url: &str) -> Url {
    match Url::parse(url) {
        Ok(url) => url,
        Err(err) => unreachable!("invalid built-in URL {url}: {err}"),
    }
}

/// Приводит базовый URL к виду с одним завершающим "/".
pub fn normalize_base_url(url: &str) -> Result<Url> {
    let mut normalized = url.trim_end_matches('/').to_string();
    normalized.push('/');
    Ok(Url::parse(&normalized)?)
}

impl ClientConfig {
    /// Направляет все семейства методов на один хост (для тестов или прокси).
    pub fn set_base_url(mut self, base_url: &str) -> Result<Self> {
        let url = normalize_base_url(base_url)?;
        self.edge_url = url.clone();
        self.p2p_url = url.clone();
        self.web_url = url;
        Ok(self)
    }

    pub fn set_edge_url(mut self, url: &str) -> Result<Self> {
        self.edge_url = normalize_base_url(url)?;
        Ok(self)
    }

    pub fn set_p2p_url(mut self, url: &str) -> Result<Self> {
        self.p2p_url = normalize_base_url(url)?;
        Ok(self)
    }

    pub fn set_web_url(mut self, url: &str) -> Result<Self> {
        self.web_url = normalize_base_url(url)?;
        Ok(self)
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self, family: EndpointFamily) -> &Url {
        match family {
            EndpointFamily::Wallet => &self.edge_url,
            EndpointFamily::WalletForm => &self.web_url,
            EndpointFamily::Invoicing => &self.p2p_url,
        }
    }

    /// Полный URL метода; сегменты пути экранируются по отдельности.
    ///
    /// Пустые сегменты, "." и ".." отклоняются: `url` молча схлопывает их,
    /// и запрос ушел бы на другой метод.
    pub fn endpoint(&self, family: EndpointFamily, segments: &[&str]) -> Result<Url> {
        if let Some(segment) = segments
            .iter()
            .find(|segment| matches!(**segment, "" | "." | ".."))
        {
            return Err(QiwiError::InvalidArgument(format!(
                "недопустимый сегмент пути: {segment:?}"
            )));
        }
        let mut url = self.base_url(family).clone();
        url.path_segments_mut()
            .map_err(|_| {
                QiwiError::InvalidArgument(format!("базовый URL без пути: {}", self.base_url(family)))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}
