pub mod enums;
pub mod filters;
pub mod records;
pub mod schema;

pub use enums::*;
pub use filters::*;
pub use records::*;
pub use schema::*;
