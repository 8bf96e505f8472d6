pub mod config;
pub mod error;
pub mod incident;
pub mod live;
pub mod query;
pub mod reconcile;
pub mod view;

pub use config::*;
pub use error::*;
pub use incident::*;
pub use live::*;
pub use query::*;
pub use reconcile::*;
pub use view::*;
