pub mod api;
pub mod backend;
pub mod files;

pub use api::*;
pub use backend::*;
pub use files::*;
