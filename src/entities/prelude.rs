#![allow(unused_imports)]

pub use super::api_log::Entity as ApiLog;
pub use super::category::Entity as Category;
pub use super::comment::Entity as Comment;
pub use super::proposal::Entity as Proposal;
pub use super::user::Entity as User;
pub use super::vote::Entity as Vote;
