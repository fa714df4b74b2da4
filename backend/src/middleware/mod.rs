pub mod logging;
pub mod transaction;

pub use logging::*;
pub use transaction::*;
