// ABOUTME: Capability traits the engine needs from the container host.
// ABOUTME: ContainerOps, ImageOps, NetworkOps, ComposeOps, and the Runtime umbrella trait.

mod compose;
mod container;
mod image;
mod network;

pub use compose::{BuildPolicy, ComposeError, ComposeOps, ComposeUp};
pub use container::{ContainerError, ContainerFilters, ContainerOps, ContainerSummary};
pub use image::{ImageError, ImageOps, ImageSummary};
pub use network::{NetworkConfig, NetworkError, NetworkOps};

/// Everything a deployment needs from the host.
pub trait Runtime: ContainerOps + ImageOps + NetworkOps + ComposeOps {}

impl<T: ContainerOps + ImageOps + NetworkOps + ComposeOps> Runtime for T {}
