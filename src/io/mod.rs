pub mod config_io;
pub mod lock;
pub mod mirror;
pub mod recovery;
pub mod store;
pub mod workspace_io;
