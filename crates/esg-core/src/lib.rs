pub mod error;
pub mod schema;
pub mod traits;
pub mod types;

pub use error::*;
pub use schema::*;
pub use traits::*;
pub use types::*;
