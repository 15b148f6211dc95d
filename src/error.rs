use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::credential::{CredentialKind, EndpointFamily};
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum QiwiError {
    #[error("Ошибка транспорта: {0}")]
    Transport(#[from] TransportError),

    #[error("Запрос не выполнен после {attempts} попыток: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: TransportError,
    },

    #[error("Ошибка API QIWI (Статус: {}): {}", descriptor.status, descriptor.message)]
    Http {
        descriptor: ErrorDescriptor,
        details: Option<ProviderError>, // Тело ошибки от API, если удалось разобрать
    },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Превышено время ожидания: {0:?}")]
    Timeout(Duration),

    #[error("Неверный аргумент: {0}")]
    InvalidArgument(String),

    #[error("Ошибка сериализации/десериализации JSON: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Неверный URL: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Не задана переменная окружения: {0}")]
    MissingEnv(&'static str),
}

impl QiwiError {
    /// Код HTTP-статуса, если ошибка пришла от API.
    pub fn status(&self) -> Option<u16> {
        match self {
            QiwiError::Http { descriptor, .. } => Some(descriptor.status),
            _ => None,
        }
    }

    /// Ошибка на стороне QIWI (5xx): повтор имеет смысл только на уровне вызывающего кода.
    pub fn is_server_fault(&self) -> bool {
        matches!(self.status(), Some(status) if (500..600).contains(&status))
    }
}

pub type Result<T> = std::result::Result<T, QiwiError>;

/// Нарушения постусловий для формально успешных ответов.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("История платежей пуста или не найдена")]
    EmptyHistory,

    #[error("Некорректный ответ API: {0}")]
    MalformedResponse(String),
}

/// Учетные данные не подходят для вызываемого семейства методов.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Метод {family:?} недоступен для учетных данных {credential:?}")]
pub struct AuthError {
    pub family: EndpointFamily,
    pub credential: CredentialKind,
}

/// Код статуса и человекочитаемая причина ошибки.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorDescriptor {
    pub status: u16,
    pub message: String,
}

impl fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.message)
    }
}

pub const UNKNOWN_ERROR: &str = "unknown error";

/// Таблица известных кодов ошибок QIWI API.
pub fn describe(status: u16) -> ErrorDescriptor {
    let message = match status {
        400 => "malformed request syntax",
        401 => "invalid or expired credential",
        403 => "insufficient permission for this credential/endpoint",
        423 => "rate-limited / temporarily unavailable",
        500 => "upstream service fault",
        _ => UNKNOWN_ERROR,
    };
    ErrorDescriptor {
        status,
        message: message.to_string(),
    }
}

// Структура для парсинга тела ошибки от QIWI (если оно есть)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderError {
    #[serde(default)]
    pub service_name: Option<String>, // Например, "invoicing"
    #[serde(default)]
    pub error_code: Option<String>, // Например, "auth.unauthorized"
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub user_message: Option<String>,
    #[serde(default)]
    pub datetime: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
}

impl ProviderError {
    /// Разбирает тело ответа с ошибкой; пустые и не-JSON тела дают `None`.
    pub fn parse(body: &str) -> Option<Self> {
        let parsed: ProviderError = serde_json::from_str(body).ok()?;
        if parsed.error_code.is_none() && parsed.description.is_none() {
            return None;
        }
        Some(parsed)
    }
}
