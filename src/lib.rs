pub mod bundle;
pub mod commands;
pub mod config;
pub mod error;
pub mod http;
pub mod module;
pub mod naming;
pub mod npm;
pub mod plugin;
pub mod rewrite;
pub mod runtime;
