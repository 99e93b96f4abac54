// Core data models
// These structs represent the domain entities

pub mod pipeline;
pub mod project;
pub mod stage;

pub use pipeline::*;
pub use project::*;
pub use stage::*;
