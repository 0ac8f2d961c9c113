pub mod backend;
pub mod config;
pub mod frame;
pub mod transport;

pub use backend::*;
pub use config::*;
pub use frame::*;
pub use transport::*;
