pub mod analytics;
pub mod audit;
pub mod category;
pub mod comment;
pub mod proposal;
pub mod user;
pub mod vote;
