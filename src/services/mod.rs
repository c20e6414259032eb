pub use activity::*;
pub use editor::*;
pub use registry::*;

mod activity;
mod editor;
mod registry;
