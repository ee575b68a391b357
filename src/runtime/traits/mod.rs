// ABOUTME: Composable capability traits for container runtimes.
// ABOUTME: Network, volume, image, container, file and probe capabilities, joined by RuntimeAdapter.

mod container;
mod file;
mod image;
mod network;
mod probe;
mod specs;
mod volume;

pub use container::{ContainerError, ContainerOps};
pub use file::{FileError, FileOps};
pub use image::{ImageError, ImageOps};
pub use network::{NetworkError, NetworkOps};
pub use probe::{ProbeError, ProbeOps};
pub use specs::*;
pub use volume::{VolumeError, VolumeOps};

/// Everything the executor and destroyer need from one host's runtime.
pub trait RuntimeAdapter:
    NetworkOps + VolumeOps + ImageOps + ContainerOps + FileOps + ProbeOps
{
}

impl<T> RuntimeAdapter for T where
    T: NetworkOps + VolumeOps + ImageOps + ContainerOps + FileOps + ProbeOps
{
}
