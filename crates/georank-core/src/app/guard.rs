//! AccessTokenGuard - 認証情報がなければ I/O せずに中止する

use std::sync::Arc;

use crate::domain::ClientError;
use crate::ports::CredentialStore;

pub struct AccessTokenGuard {
    credentials: Arc<dyn CredentialStore>,
}

impl AccessTokenGuard {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self { credentials }
    }

    /// The credential to send, or `MissingCredential` (fatal) if there is none.
    pub fn credential(&self) -> Result<String, ClientError> {
        self.credentials
            .access_token()
            .ok_or(ClientError::MissingCredential)
    }

    /// Hand an authorization failure over to the credential store.
    pub fn reject(&self) {
        self.credentials.invalidate();
    }
}
