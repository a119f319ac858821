//! Streamsec State Management
//!
//! Persists the state of every managed Stream.Security resource between runs,
//! with a lock so two runs cannot modify the same state at once.
//!
//! - **StateFile**: the persisted document holding all managed resources
//! - **StateBackend**: a trait for state storage backends
//! - **LockInfo**: who holds the state lock and until when
//!
//! # Example
//!
//! ```ignore
//! use streamsec_state::{create_backend, BackendConfig};
//!
//! let backend = create_backend(&BackendConfig::local("streamsec.state.json"))?;
//! let lock = backend.acquire_lock("apply").await?;
//! let mut state = backend.read_state().await?.unwrap_or_default();
//!
//! // ... apply effects, upserting resources ...
//!
//! state.increment_serial();
//! backend.write_state(&state).await?;
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::create_backend;
pub use lock::LockInfo;
pub use state::{ResourceState, StateFile};
