pub mod schema;
pub mod operations;

pub use schema::*;
pub use operations::*;
