pub mod store;

pub use store::PageFtl;
