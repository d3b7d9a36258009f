//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, API routes, static SPA)
//!     → request.rs (request ID in, echoed out)
//!     → donation/ranking services
//!     → response.rs (error envelope with code + severity)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{request_id_middleware, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{AppState, HttpServer};
