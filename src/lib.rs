//! dina: a keyboard driven X11 window manager with speech and tone feedback.

#[macro_use]
extern crate log;

#[macro_use]
extern crate lazy_static;

pub mod action;
pub mod bindings;
pub mod client;
pub mod config;
pub mod geometry;
pub mod ipc;
pub mod keysym;
pub mod memory;
pub mod monitor;
pub mod notify;
pub mod rules;
pub mod spawn;
pub mod tag;
pub mod wm;
pub mod xconnection;

mod events;

#[cfg(test)]
mod mock;

pub use config::Config;
pub use spawn::ProcessSpawner;
pub use wm::WindowManager;
pub use xconnection::XcbConnection;
