pub mod codec;
pub mod config;
pub mod constants;
pub mod drag;
pub mod error;
pub mod events;
pub mod ids;
pub mod interchange;
pub mod local_state;
pub mod models;
pub mod mutator;
pub mod presence;
pub mod reconcile;
pub mod remote;
pub mod runtime;
pub mod store;
pub mod tracing_setup;

// Re-export the engine surface at crate root for convenience
pub use config::CoreConfig;
pub use error::{CoreError, CoreResult, RemoteError};
pub use runtime::CoreRuntime;
