pub mod cancel;
pub mod index;
pub mod progress;
pub mod upload;
