//! InMemoryCredentials - プロセス内のトークン置き場

use std::sync::RwLock;

use crate::ports::CredentialStore;

/// InMemoryCredentials は CLI やテスト用の CredentialStore
///
/// `invalidate()` が呼ばれた回数を数えます（認証失敗の検出用）。
#[derive(Debug, Default)]
pub struct InMemoryCredentials {
    token: RwLock<Option<String>>,
    invalidations: RwLock<u32>,
}

impl InMemoryCredentials {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token),
            invalidations: RwLock::new(0),
        }
    }

    pub fn set(&self, token: impl Into<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = Some(token.into());
        }
    }

    pub fn invalidations(&self) -> u32 {
        self.invalidations.read().map(|n| *n).unwrap_or_default()
    }
}

impl CredentialStore for InMemoryCredentials {
    fn access_token(&self) -> Option<String> {
        self.token
            .read()
            .ok()
            .and_then(|guard| guard.clone())
            .filter(|t| !t.is_empty())
    }

    fn invalidate(&self) {
        if let Ok(mut guard) = self.token.write() {
            *guard = None;
        }
        if let Ok(mut n) = self.invalidations.write() {
            *n += 1;
        }
    }
}
