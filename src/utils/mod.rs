pub mod http;
pub mod numbers;
