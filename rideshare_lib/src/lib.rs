pub mod notification;
pub mod page;
pub mod ride;
pub mod rules;
pub mod user;
