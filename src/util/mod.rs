pub mod concurrent_set;

pub use concurrent_set::ConcurrentSet;
