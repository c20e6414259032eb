pub use activity_log::*;
pub use category::*;
pub use container::*;
pub use demo_container::*;
pub use keys::*;
pub use page::*;
pub use page_status::*;
pub use template::*;

mod activity_log;
mod category;
mod container;
mod demo_container;
mod keys;
mod page;
mod page_status;
mod template;
