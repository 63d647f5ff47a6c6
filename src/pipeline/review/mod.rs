pub mod confidence;
pub mod router;
pub mod types;

pub use confidence::*;
pub use router::*;
pub use types::*;
