//! Domain model (records, sessions, phases, trigger clock, cooldown, ...).
//!
//! Everything here is synchronous and free of I/O.

pub mod cooldown;
pub mod errors;
pub mod events;
pub mod ids;
pub mod observed;
pub mod product;
pub mod record;
pub mod session;
pub mod state;
pub mod timestamp;
pub mod trigger;

pub use cooldown::{CooldownCheck, CooldownGuard};
pub use errors::{ClientError, ErrorKind, StoreError};
pub use events::Notice;
pub use ids::{RegenerationId, SessionId};
pub use observed::ObservedState;
pub use product::ProductId;
pub use record::{AnalysisRecord, AnalysisStatus, AnalyticsEnvelope};
pub use session::PollingSession;
pub use state::{PollKind, SessionPhase, TimerKind};
pub use timestamp::EpochMs;
pub use trigger::TriggerClock;
