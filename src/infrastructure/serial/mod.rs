// Serial module - OS serial access and hot-plug notification
pub mod backend;
pub mod hotplug;
pub mod memory;
pub mod system;

pub use backend::{PortHandle, SerialBackend};
pub use hotplug::{
    ChannelDeviceSource, DeviceChange, DeviceChangeSender, DeviceChangeSource,
    PollingDeviceSource,
};
pub use memory::MemoryBackend;
pub use system::SystemBackend;
