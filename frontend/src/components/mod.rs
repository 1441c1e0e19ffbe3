pub mod events;
pub mod handlers;
pub mod header;
pub mod notices;
pub mod report_form;
pub mod reports_table;
pub mod results;
pub mod upload_section;
pub mod utils;
