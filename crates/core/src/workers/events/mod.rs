pub mod pipeline_failed;

pub use pipeline_failed::*;
