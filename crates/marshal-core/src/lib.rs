pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::MarshalConfig;
pub use error::{MarshalError, Result};
pub use types::*;
