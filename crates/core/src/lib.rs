pub mod error;
pub mod gap;
pub mod memo;
pub mod models;
pub mod series;

pub use error::*;
pub use gap::*;
pub use memo::*;
pub use models::*;
pub use series::*;
