//! Configuration access port trait.
//!
//! Typed getters return `Ok(None)` when the key is absent and `Err` with a
//! description when the value is present but does not parse.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, String>;
    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, String>;
}
