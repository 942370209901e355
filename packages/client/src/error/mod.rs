pub mod classification;
pub mod constructors;
pub mod helpers;
pub mod types;

pub use constructors::*;
pub use helpers::{ConnectionClosed, OperationCanceled, TimedOut};
pub use types::{Error, Inner, Kind, Result};

