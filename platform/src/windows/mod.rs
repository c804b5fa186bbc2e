mod backend;
mod elevation;
mod handle;
mod ioctl;
mod setupapi;
mod volume;

pub use backend::WindowsStorageBackend;
pub use elevation::process_privilege;
pub use handle::WindowsHandle;
