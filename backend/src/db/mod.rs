pub mod dynamodb_repository;
pub mod memory_repository;
pub mod models;
pub mod repository;
