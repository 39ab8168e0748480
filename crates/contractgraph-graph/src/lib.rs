pub mod builder;
pub mod diff;
pub mod graph;
pub mod identity;
pub mod pipeline;
pub mod propagation;
pub mod ranking;

pub use builder::*;
pub use diff::*;
pub use graph::*;
pub use identity::*;
pub use pipeline::*;
pub use propagation::*;
pub use ranking::*;
