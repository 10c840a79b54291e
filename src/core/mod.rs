pub mod audit;
pub mod auth;
pub mod error;
pub mod gateway;
pub mod proxy;
pub mod rate_limiter;
pub mod route_table;

pub use error::GatewayError;
pub use gateway::GatewayService;
pub use rate_limiter::FixedWindowLimiter;
pub use route_table::RouteTable;
