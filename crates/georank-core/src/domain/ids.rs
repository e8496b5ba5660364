//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID
//! ポーリングセッションは ULID で識別します。
//! タイマーやフェッチの完了通知はこの ID を運び、状態機械は
//! 「いまのセッションか？」を ID の一致で判定します（bool フラグではなく）。
//!
//! ## Phantom Type パターン
//! `Id<T>` の `T` は実行時には使わないマーカー型で、
//! 異なる種類の ID を型レベルで混同できないようにします。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"session-" など）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Polling session のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Session {}

impl IdMarker for Session {
    fn prefix() -> &'static str {
        "session-"
    }
}

/// Regeneration request のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Regeneration {}

impl IdMarker for Regeneration {
    fn prefix() -> &'static str {
        "regen-"
    }
}

/// Identifier of one polling session (one product, one arming of the machine).
pub type SessionId = Id<Session>;

/// Identifier of one user-initiated regeneration request (used for log correlation).
pub type RegenerationId = Id<Regeneration>;
