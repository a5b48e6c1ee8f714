//! Connections that host pollers for their consumers

pub mod round;

pub use round::RoundConnection;
