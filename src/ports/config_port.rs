//! Configuration access port trait.
//!
//! Sections read by the toolkit: `[engine]`, `[portfolio]`, `[performance]`
//! and `[log]`. See `domain::config_validation` for the recognised keys.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
}
