// ABOUTME: Typed handles and validated domain values shared across the crate.
// ABOUTME: Handles use phantom types so resource kinds cannot be confused.

mod handle;
mod image_ref;
mod resource_name;

pub use handle::{Handle, NodeIndex};
pub use image_ref::{DEFAULT_DOMAIN, ImageRef, ParseImageRefError};
pub use resource_name::{ResourceName, ResourceNameError};
