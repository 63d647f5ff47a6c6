pub mod chunker;
pub mod classify;
pub mod types;

pub use chunker::*;
pub use classify::*;
pub use types::*;
