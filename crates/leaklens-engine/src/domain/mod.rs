//! Domain entities of the leaklens system.
//!
//! Every entity is tenanted by a [`leaklens_core::NetworkId`]. The
//! [`LeakDetection`] aggregate owns the detection lifecycle state machine;
//! the remaining entities are plain records validated at the repository
//! boundary.

mod detection;
mod network;
mod node;
mod partition;
mod reading;
mod sensitivity;
mod sensor;

pub use detection::LeakDetection;
pub use network::Network;
pub use node::NetworkNode;
pub use partition::Partition;
pub use reading::Reading;
pub use sensitivity::{MatrixStats, SensitivityEntry};
pub use sensor::Sensor;
