//! Errors - エラー型と分類
//!
//! ポーリングの継続可否は `ErrorKind` だけで決まります。

use thiserror::Error;

/// ErrorKind は失敗の運用分類
///
/// - Transient: 通常のスケジュールで再試行（ネットワーク断、5xx、壊れたレスポンス）
/// - Fatal: 再試行しない（認証失敗、認証情報なし）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Fatal,
}

/// Failure talking to the analytics API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("no access token available")]
    MissingCredential,

    #[error("http status {status}")]
    Http { status: u16 },

    #[error("network: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Unauthorized | ClientError::MissingCredential => ErrorKind::Fatal,
            ClientError::Http { .. } | ClientError::Network(_) | ClientError::Malformed(_) => {
                ErrorKind::Transient
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}

/// Failure persisting the last completed record.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
}
