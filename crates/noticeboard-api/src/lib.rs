pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod password;
pub mod routes;
pub mod session;
pub mod state;

pub use routes::router;
pub use state::{AppState, AppStateInner};
