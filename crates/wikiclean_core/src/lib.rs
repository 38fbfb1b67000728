pub mod analysis;
pub mod bot;
pub mod check;
pub mod config;
pub mod error;
pub mod filesystem;
pub mod gateway;
pub mod mediawiki;
pub mod orchestrator;
pub mod page;
pub mod site;
