#[cfg(feature = "chrome")]
pub mod javascript;
pub mod screenshot;

#[cfg(feature = "chrome")]
pub use javascript::JavaScriptRunner;
pub use screenshot::ScreenshotManager;
