pub mod backend;
pub mod command;
pub mod log_entry;

pub use backend::*;
pub use command::*;
pub use log_entry::*;
