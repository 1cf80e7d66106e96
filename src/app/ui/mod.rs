pub mod adb_driver;
pub mod driver;
pub mod hierarchy;
pub mod selector;
