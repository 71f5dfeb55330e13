//! The concrete migrations, one module per stage.
//!
//! Each stage is bespoke: it knows the layout it starts from and the layout it
//! leaves behind, and nothing else.

pub mod relocate;
pub mod rename_fps;
pub mod restructure;

pub use relocate::Relocate;
pub use rename_fps::RenameFps;
pub use restructure::Restructure;
