pub mod chunking;
pub mod extraction;
pub mod processor; // PDF → extraction → structuring → review routing
pub mod review;
pub mod storage;
pub mod structuring;
