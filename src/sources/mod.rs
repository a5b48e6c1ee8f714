//! Round source implementations

pub mod http;

pub use http::HttpRoundSource;
