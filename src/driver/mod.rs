pub mod http;
pub mod traits;

pub use http::HttpDriver;
pub use traits::{ApiDriver, ApiMethod, ApiRequest, ApiResponse, TransportError};
