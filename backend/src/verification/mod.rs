pub mod classifier;
pub mod controller;
pub mod gemini;
pub mod parser;
pub mod session;
