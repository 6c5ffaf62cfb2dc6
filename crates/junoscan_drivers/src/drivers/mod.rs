pub mod junos_netconf;
pub mod mock;

pub use junos_netconf::JunosNetconfDriver;
pub use mock::{MockBehavior, MockDriver};
