pub mod node;
pub mod tree;
pub mod config;

pub use node::*;
pub use tree::*;
pub use config::*;
