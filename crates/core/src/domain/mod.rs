pub mod member;
pub mod service;
pub mod ticket;
