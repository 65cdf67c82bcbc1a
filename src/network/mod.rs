pub mod backward;
pub mod config;
pub mod forward;
pub mod network;
pub mod params;

pub use backward::{compute_gradients, Gradients};
pub use config::{Architecture, NetworkConfig};
pub use forward::{forward, predict, ForwardCache};
pub use network::Network;
pub use params::{Dims, Params};
