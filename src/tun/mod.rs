//! TUN Layer
//!
//! Responsibilities:
//! - Create the virtual interface and move raw IP packets in and out of it
//! - Assign interface addresses and install host routes per platform
//! - Undo full-tunnel routing on shutdown
//!
//! Route rules are planned as plain [`NetCommand`](crate::common::NetCommand)
//! lists and executed through a [`CommandRunner`](crate::common::CommandRunner),
//! so every platform's rule set can be inspected on any host.

mod device;
pub mod exclusion;
pub mod host;
pub mod routes;

pub use device::{create_interface, TunDevice, TunInterface};
pub use exclusion::exclusion_set;
pub use host::HostInfo;
pub use routes::{NetworkConfigurator, Platform, RouteContext, RouteReport, RouteRules};
