//! HTTP RPC layer serving one rotating filter
pub mod api;
pub mod registry;
pub mod types;

pub use api::create_router;
pub use registry::FilterRegistry;
pub use types::{
    AddRequest, AddResponse, AppState, CheckRequest, CheckResponse,
    ErrorResponse, InfoResponse, ServerConfig, ServerConfigBuilder,
    ServerConfigBuilderError, UnionResponse,
};
