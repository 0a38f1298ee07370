#![forbid(unsafe_code)]

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod gazer;
pub mod notifier;
pub mod pidfile;
pub mod proto;
pub mod server;
pub mod transport;

pub use client::{EventClient, WatchSet};
pub use config::{load_from_path, Config};
pub use error::{Result, TafError};
pub use proto::Message;
pub use server::EventServer;
