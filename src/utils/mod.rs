pub mod error;
pub mod logger;
pub mod ssh_command_parser;
