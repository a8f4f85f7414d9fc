pub mod resource;
pub mod user;

pub use resource::{Hardware, Resource, ResourceKind, ResourceStatus};
pub use user::{Role, User, UserStatus};
