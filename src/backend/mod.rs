// Backend module - Vulkan abstraction layer
//
// Design: Thin RAII wrappers around ash. Every handle is owned by exactly
// one value and destroyed in its Drop; `frames::VulkanFrames` puts them
// together behind the frame ring's `FrameQueue` interface.

pub mod buffer;
pub mod commands;
pub mod device;
pub mod frames;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use device::VulkanDevice;
pub use frames::VulkanFrames;
pub use swapchain::{Swapchain, SwapchainOutOfDate};
