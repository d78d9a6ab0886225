pub mod config;
pub mod logging;

pub mod archiver;
pub mod checksum;
pub mod engine;
pub mod pipeline;
pub mod planner;
pub mod recorder;
pub mod storage;
pub mod table;
pub mod url_model;
