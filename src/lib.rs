//! Widget MVC - remote-backed UI widget state synchronization
//!
//! A `View` captures user input and renders state, a `Controller` holds the
//! canonical widget state, and a `Model` persists writes to a remote service
//! and fans confirmed state out to every widget subscribed to it.

pub mod api;
pub mod cli;
pub mod config;
pub mod hub;
pub mod mvc;
pub mod remote;
pub mod render;
