use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{DomainError, ErrorDescriptor, ProviderError, QiwiError, Result, describe};
use crate::transport::RawResponse;

// Базовый набор успешных кодов 200 и 201 намеренно расширен кодом 204:
// его без тела возвращает смена баланса по умолчанию.
const SUCCESS_CODES: [u16; 3] = [200, 201, 204];

/// Тело успешного ответа.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedBody {
    Json(Value),
    /// Тело не является JSON (квитанции в PDF/JPEG, пустой ответ) и передается как есть.
    Raw(Vec<u8>),
}

impl DecodedBody {
    pub fn into_json(self) -> Result<Value> {
        match self {
            DecodedBody::Json(value) => Ok(value),
            DecodedBody::Raw(bytes) => Err(DomainError::MalformedResponse(format!(
                "ожидался JSON, получено {} байт",
                bytes.len()
            ))
            .into()),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            DecodedBody::Json(value) => value.to_string().into_bytes(),
            DecodedBody::Raw(bytes) => bytes,
        }
    }

    pub fn parse<R: DeserializeOwned>(self) -> Result<R> {
        Ok(serde_json::from_value(self.into_json()?)?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    Success { status: u16, body: DecodedBody },
    Failure { status: u16, body: String },
}

impl ResponseOutcome {
    pub fn status(&self) -> u16 {
        match self {
            ResponseOutcome::Success { status, .. } | ResponseOutcome::Failure { status, .. } => {
                *status
            }
        }
    }

    /// Ошибка на стороне сервиса, а не в запросе клиента.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, ResponseOutcome::Failure { status, .. } if (500..600).contains(status))
    }

    /// Описание ошибки для неуспешного ответа.
    pub fn descriptor(&self) -> Option<ErrorDescriptor> {
        match self {
            ResponseOutcome::Failure { status, .. } => Some(describe(*status)),
            ResponseOutcome::Success { .. } => None,
        }
    }

    /// Тело успешного ответа или типизированная ошибка.
    pub fn into_result(self) -> Result<DecodedBody> {
        match self {
            ResponseOutcome::Success { body, .. } => Ok(body),
            ResponseOutcome::Failure { status, body } => Err(QiwiError::Http {
                descriptor: describe(status),
                details: ProviderError::parse(&body),
            }),
        }
    }
}

/// Как читать тело успешного ответа.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyKind {
    /// JSON, если тело разбирается, иначе байты как есть.
    #[default]
    Json,
    /// Файл: байты не разбираются, даже если похожи на JSON.
    Binary,
}

pub fn classify(raw: RawResponse) -> ResponseOutcome {
    classify_as(raw, BodyKind::Json)
}

pub fn classify_as(raw: RawResponse, kind: BodyKind) -> ResponseOutcome {
    if SUCCESS_CODES.contains(&raw.status) {
        let body = match kind {
            BodyKind::Json => match serde_json::from_slice::<Value>(&raw.body) {
                Ok(value) => DecodedBody::Json(value),
                Err(_) => DecodedBody::Raw(raw.body),
            },
            BodyKind::Binary => DecodedBody::Raw(raw.body),
        };
        ResponseOutcome::Success {
            status: raw.status,
            body,
        }
    } else {
        ResponseOutcome::Failure {
            status: raw.status,
            body: String::from_utf8_lossy(&raw.body).into_owned(),
        }
    }
}
