pub mod config;
pub mod error;
pub mod types;

pub use config::SomniaConfig;
pub use error::{Result, SomniaError};
pub use types::*;
