pub mod completion;
pub mod endpoints;
mod http;
pub mod local_files;
pub mod log_sink;
pub mod proxy;
pub mod readiness;
pub mod shell;
pub mod supervisor;

pub use completion::*;
pub use endpoints::*;
pub use local_files::*;
pub use log_sink::*;
pub use proxy::*;
pub use readiness::*;
pub use shell::*;
pub use supervisor::*;
