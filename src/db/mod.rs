pub use activity::*;
pub use categories::*;
pub use containers::*;
pub use db::*;
pub use demo_containers::*;
pub use fork::*;
pub use pages::*;
pub use templates::*;

mod activity;
mod categories;
mod containers;
mod db;
mod demo_containers;
mod fork;
mod pages;
pub(crate) mod scope;
mod templates;
