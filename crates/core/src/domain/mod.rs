pub mod feature;
pub mod request;
pub mod service;
pub mod user;
