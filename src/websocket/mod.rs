// WebSocket transport: upgrade handling and per-socket pumps

mod connection;
pub mod handler;
pub mod routes;

pub use routes::create_router;
