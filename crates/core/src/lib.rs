pub mod chat;
pub mod config;
pub mod confirm;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod keys;
pub mod layout;
pub mod logger;
pub mod platform;
pub mod roster;
pub mod sampler;
pub mod settings;
pub mod shared;
pub mod sleep;
pub mod stats;
pub mod supervisor;
pub mod tools;
pub mod types;
