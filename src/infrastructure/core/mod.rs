pub mod circuit_breaker;
pub mod http_client_factory;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
pub use http_client_factory::{build_url_with_query, urlencoding_encode, HttpClientFactory};
