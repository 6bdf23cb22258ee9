//! Self-healing kiosk supervisor library

pub mod clock;
pub mod config;
pub mod health;
pub mod navigation;
pub mod recovery;
pub mod resilience;
pub mod surface;
pub mod supervisor;
pub mod watchdog;

pub mod admin;
pub mod ingress;
pub mod lifecycle;
pub mod observability;

pub use config::schema::KioskConfig;
pub use ingress::IngressServer;
pub use lifecycle::Shutdown;
pub use supervisor::Supervisor;
pub use watchdog::Watchdog;
