//! Credentials port - アクセストークンと認証失敗の受け手
//!
//! 認証失敗時にはここへ通知し、ログアウト／リダイレクトは実装側に任せます。

/// CredentialStore はプロセス全体のトークン置き場
pub trait CredentialStore: Send + Sync {
    /// 現在のアクセストークン。なければ None（ポーリングは I/O なしで中止）
    fn access_token(&self) -> Option<String>;

    /// 認証失敗またはログアウト。トークンを破棄する
    fn invalidate(&self);
}
