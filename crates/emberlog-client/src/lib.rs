pub mod api;
pub mod error;
pub mod sse;
pub mod stream;

pub use api::*;
pub use error::*;
pub use sse::*;
pub use stream::*;
