pub mod actuator;
pub mod config;
pub mod control;
pub mod link;
pub mod messages;
pub mod runtime;
