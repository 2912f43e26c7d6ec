pub mod category;
pub mod derived;
pub mod dto;
pub mod repo;
pub mod services;
