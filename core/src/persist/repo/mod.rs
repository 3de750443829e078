pub mod catalysts;
pub mod common;
pub mod markets;
pub mod portfolio;
pub mod positions;

pub use catalysts::*;
pub use markets::*;
pub use portfolio::*;
pub use positions::*;
