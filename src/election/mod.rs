pub mod coordinator;
pub mod protocol;
pub mod state;
pub mod timer;

pub use coordinator::{LeadershipChange, Message, PeerMessage};
pub use state::{ElectionState, Role, StateSnapshot};
