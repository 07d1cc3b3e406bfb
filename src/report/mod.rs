pub mod handlers;
pub mod models;
pub mod multipart_parser;

pub use models::*;
pub use multipart_parser::*;
