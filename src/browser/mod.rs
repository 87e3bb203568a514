#[cfg(feature = "chrome")]
pub mod chrome;
pub mod memory;
#[cfg(feature = "chrome")]
pub mod monitor;
#[cfg(feature = "chrome")]
pub mod navigation;

#[cfg(feature = "chrome")]
pub use chrome::ChromePage;
pub use memory::MemoryPage;
#[cfg(feature = "chrome")]
pub use monitor::ChangeMonitor;
#[cfg(feature = "chrome")]
pub use navigation::{NavigationManager, NavigationResult};
