pub mod config;
pub mod draft;
pub mod observability;
pub mod operator;
pub mod pipeline;
pub mod preview;
pub mod source;
