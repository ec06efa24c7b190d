//! Wire types for the forecast endpoint

pub mod request;
pub mod response;

pub use request::ForecastRequest;
pub use response::{ForecastResponse, ResponseStatus};
