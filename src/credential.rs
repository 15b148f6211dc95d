use std::collections::BTreeMap;
use std::fmt;

use crate::error::{AuthError, QiwiError, Result};

pub const WALLET_NUMBER_ENV: &str = "QIWI_WALLET_NUMBER";
pub const WALLET_TOKEN_ENV: &str = "QIWI_WALLET_TOKEN";
pub const P2P_SECRET_KEY_ENV: &str = "QIWI_P2P_SECRET_KEY";

/// Группа методов API, определяющая хост и набор заголовков.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointFamily {
    /// edge.qiwi.com, токен API кошелька.
    Wallet,
    /// Формы qiwi.com (поиск провайдера по карте); без Bearer, тело form-urlencoded.
    WalletForm,
    /// api.qiwi.com, секретный ключ P2P.
    Invoicing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Wallet,
    Invoicing,
}

/// Учетные данные кошелька. Не меняются после создания.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Номер кошелька в формате 79219876543 (без "+") и токен API QIWI Кошелька.
    Wallet { number: String, token: String },
    /// Секретный ключ P2P (создается на p2p.qiwi.com в разделе "API").
    Invoicing { secret_key: String },
}

impl Credential {
    pub fn wallet(number: impl Into<String>, token: impl Into<String>) -> Self {
        let number: String = number.into();
        Credential::Wallet {
            number: number.trim_start_matches('+').to_string(),
            token: token.into(),
        }
    }

    pub fn invoicing(secret_key: impl Into<String>) -> Self {
        Credential::Invoicing {
            secret_key: secret_key.into(),
        }
    }

    /// Читает учетные данные из окружения.
    ///
    /// Если задан `QIWI_WALLET_TOKEN`, нужен и `QIWI_WALLET_NUMBER`; иначе
    /// используется `QIWI_P2P_SECRET_KEY`.
    pub fn from_env() -> Result<Self> {
        if let Ok(token) = std::env::var(WALLET_TOKEN_ENV) {
            let number = std::env::var(WALLET_NUMBER_ENV)
                .map_err(|_| QiwiError::MissingEnv(WALLET_NUMBER_ENV))?;
            return Ok(Credential::wallet(number, token));
        }
        std::env::var(P2P_SECRET_KEY_ENV)
            .map(Credential::invoicing)
            .map_err(|_| QiwiError::MissingEnv(P2P_SECRET_KEY_ENV))
    }

    pub fn kind(&self) -> CredentialKind {
        match self {
            Credential::Wallet { .. } => CredentialKind::Wallet,
            Credential::Invoicing { .. } => CredentialKind::Invoicing,
        }
    }

    pub fn supports(&self, family: EndpointFamily) -> bool {
        matches!(
            (self, family),
            (Credential::Wallet { .. }, EndpointFamily::Wallet | EndpointFamily::WalletForm)
                | (Credential::Invoicing { .. }, EndpointFamily::Invoicing)
        )
    }

    pub fn ensure_supports(&self, family: EndpointFamily) -> Result<()> {
        if self.supports(family) {
            Ok(())
        } else {
            Err(AuthError {
                family,
                credential: self.kind(),
            }
            .into())
        }
    }

    /// Номер кошелька; есть только у учетных данных кошелька.
    pub fn wallet_number(&self) -> Result<&str> {
        match self {
            Credential::Wallet { number, .. } => Ok(number),
            Credential::Invoicing { .. } => Err(AuthError {
                family: EndpointFamily::Wallet,
                credential: self.kind(),
            }
            .into()),
        }
    }

    fn bearer(&self) -> &str {
        match self {
            Credential::Wallet { token, .. } => token,
            Credential::Invoicing { secret_key } => secret_key,
        }
    }

    /// Заголовки для вызова метода из семейства `family`.
    pub fn headers(&self, family: EndpointFamily) -> Result<BTreeMap<String, String>> {
        self.ensure_supports(family)?;
        let mut headers = BTreeMap::new();
        headers.insert("Accept".to_string(), "application/json".to_string());
        match family {
            EndpointFamily::WalletForm => {
                headers.insert(
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                );
            }
            EndpointFamily::Wallet | EndpointFamily::Invoicing => {
                headers.insert("Content-Type".to_string(), "application/json".to_string());
                headers.insert(
                    "Authorization".to_string(),
                    format!("Bearer {}", self.bearer()),
                );
            }
        }
        Ok(headers)
    }
}

// Секреты не должны попадать в логи
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Wallet { number, .. } => f
                .debug_struct("Wallet")
                .field("number", number)
                .field("token", &"***")
                .finish(),
            Credential::Invoicing { .. } => f
                .debug_struct("Invoicing")
                .field("secret_key", &"***")
                .finish(),
        }
    }
}
