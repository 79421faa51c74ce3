pub mod clock;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use traits::*;
pub use types::*;
