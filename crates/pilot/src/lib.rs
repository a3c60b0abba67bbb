pub mod agent;
pub mod errors;
pub mod history;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod tools;
