pub mod server;
pub mod state;
pub mod websocket;

pub use server::{create_router, run_server, spawn_core};
pub use state::AppState;
