pub mod pipeline;
pub mod project;
pub mod query;

pub use pipeline::*;
pub use project::*;
