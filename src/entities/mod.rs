pub mod prelude;

pub mod api_log;
pub mod category;
pub mod comment;
pub mod proposal;
pub mod user;
pub mod vote;
