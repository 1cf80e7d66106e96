pub mod adb;
pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod flows;
pub mod interrupt;
pub mod logging;
pub mod models;
pub mod session;
pub mod ui;
pub mod walkthrough;
pub mod watchdog;

#[cfg(test)]
pub mod testing;
