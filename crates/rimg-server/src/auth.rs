use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

use crate::error::ServerResult;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Anonymous,
}

impl Credentials {
    /// Extract credentials from an `Authorization: Bearer <token>` header.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|token| Self::Bearer(token.trim().to_string()))
            .unwrap_or(Self::Anonymous)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Refresh,
    ReadIndex,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Refresh => write!(f, "refresh"),
            Self::ReadIndex => write!(f, "read-index"),
        }
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authorize(&self, credentials: &Credentials, action: Action) -> ServerResult<bool>;
}

pub struct AllowAllAuth;

#[async_trait]
impl AuthProvider for AllowAllAuth {
    async fn authorize(&self, _credentials: &Credentials, _action: Action) -> ServerResult<bool> {
        Ok(true)
    }
}

/// Guards `Refresh` behind a shared bearer token. Reading the raw index is
/// open unless [`guard_reads`](Self::guard_reads) is set.
pub struct TokenAuth {
    token: String,
    guard_reads: bool,
}

impl TokenAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            guard_reads: false,
        }
    }

    /// Also require the token for `ReadIndex`.
    pub fn guard_reads(mut self, guard: bool) -> Self {
        self.guard_reads = guard;
        self
    }

    fn matches(&self, credentials: &Credentials) -> bool {
        matches!(credentials, Credentials::Bearer(t) if *t == self.token)
    }
}

#[async_trait]
impl AuthProvider for TokenAuth {
    async fn authorize(&self, credentials: &Credentials, action: Action) -> ServerResult<bool> {
        match action {
            Action::ReadIndex if !self.guard_reads => Ok(true),
            Action::ReadIndex | Action::Refresh => Ok(self.matches(credentials)),
        }
    }
}
