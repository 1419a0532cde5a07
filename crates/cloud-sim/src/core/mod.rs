pub mod allocation_policy;
pub mod common;
pub mod config;
pub mod events;
pub mod host;
pub mod host_impl;
pub mod logger;
pub mod queue;
pub mod service;
pub mod vm;
