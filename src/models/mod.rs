pub mod activity;
pub mod article;
pub mod category;
pub mod comment;
pub mod role;
pub mod settings;
pub mod tag;
pub mod user;
