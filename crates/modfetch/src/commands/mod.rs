pub mod clean;
pub mod completions;
pub mod config_cmd;
pub mod download;
pub mod place;
pub mod state;
pub mod verify;
