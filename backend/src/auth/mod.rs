pub mod current_user;
pub mod user_service;
