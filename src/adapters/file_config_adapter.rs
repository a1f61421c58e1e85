//! INI file configuration adapter.

use crate::domain::error::GhbError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, GhbError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| GhbError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, GhbError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| GhbError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, String> {
        match self.get_string(section, key) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| format!("'{raw}' is not an integer")),
        }
    }

    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, String> {
        match self.get_string(section, key) {
            None => Ok(None),
            Some(raw) => match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Some(v)),
                _ => Err(format!("'{raw}' is not a finite number")),
            },
        }
    }
}
