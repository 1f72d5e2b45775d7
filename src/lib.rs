pub mod assemble;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod name;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod record;

pub use assemble::{ProfileExtractor, RecordAssembler};
pub use config::SiteDescriptor;
pub use error::{AnnuaireError, Result};
pub use record::LawyerRecord;
