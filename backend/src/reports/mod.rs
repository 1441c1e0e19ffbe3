pub mod report_service;
pub mod reward_service;
