pub mod http;
pub mod mock;

pub use http::*;
pub use mock::*;
