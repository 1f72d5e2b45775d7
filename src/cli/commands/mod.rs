pub mod config;
pub mod extract;
pub mod name;
pub mod run;
pub mod version;
