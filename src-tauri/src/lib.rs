//! 沙粒检测工作站的桌面外壳：监管 Python 分析后端，并把界面命令转发给它

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::ShellConfig;
pub use error::{CommandError, ConfigError, SupervisorError};
