pub mod caller;

pub use caller::{AdminContext, CallerContext, Role};
