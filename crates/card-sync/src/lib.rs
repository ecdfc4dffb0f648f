//! Card sync client: the notification service HTTP client and the engine
//! that polls cards, renders them and acknowledges dismissals.

pub mod client;
pub mod engine;
pub mod error;
pub mod types;

pub use client::NowServerClient;
pub use engine::{
    AuthProvider, BackoffPolicy, Clock, EngineConfig, EnginePorts, NotificationSink,
    PlatformSignals, RemoteServiceClient, SyncEngine, SystemClock, TransportError,
};
pub use error::{ApiRetryClass, EngineError, Result, SyncError};
pub use types::{DismissalRequest, NotificationsQuery};
