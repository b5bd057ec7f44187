pub mod document;
pub mod payload;
pub mod request;
pub mod step;
pub mod user;
