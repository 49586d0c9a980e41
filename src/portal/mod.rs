//! SoftAP + web configuration portal.
//!
//! Hosts a temporary access point and an HTTP form for managing the
//! saved WiFi profiles.

pub mod forms;
mod handlers;
mod html;
mod server;

pub use server::ConfigPortal;

/// Sent from the HTTP handlers to the main task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalEvent {
    /// The user switched the active profile; reboot into station mode.
    Activated(usize),
}
