pub mod config;
pub mod seed;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use seed::{demo_page, DEMO_HANDLE};
pub use server::{ApiError, WorkspaceServer};
pub use state::{PageEntry, PageRegistry, StateError};
