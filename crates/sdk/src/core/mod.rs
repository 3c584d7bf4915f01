pub mod error;
pub mod types;

pub use error::{LpError, LpResult};
pub use types::*;
