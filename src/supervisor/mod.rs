pub mod coordinator;
pub mod events;
pub mod state;

pub use coordinator::{estimate_ram_mb, Supervisor};
pub use state::{SupervisorControls, SupervisorState};
