pub mod blog;
pub mod config;
pub mod estimate;
pub mod init;
pub mod wizard;
