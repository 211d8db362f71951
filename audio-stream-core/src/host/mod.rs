pub mod command;
pub mod grant;
pub mod service;
