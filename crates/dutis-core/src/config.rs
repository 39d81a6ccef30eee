//! Configuration.
//!
//! Settings come from a plist file (XML or binary) found on a
//! short search path. Missing files fall back to defaults; a file that
//! exists but cannot be parsed is an error.

use log::debug;
use plist::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::directory::RetryPolicy;
use crate::{Error, Result};

pub const CONFIGURATION_PATH_ENV: &str = "DUTIS_CONFIGURATION_PATH";

const BUILTIN_GROUPS: &[(&str, &[&str])] = &[
    ("archive", &["zip", "tar", "gz", "tgz", "7z", "rar", "bz2", "xz"]),
    ("audio", &["mp3", "wav", "aiff", "m4a", "flac", "ogg", "aac"]),
    ("code", &["c", "h", "cpp", "py", "js", "ts", "rs", "go", "rb", "sh", "swift", "java"]),
    ("document", &["pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "rtf"]),
    ("image", &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "svg", "heic", "webp"]),
    ("text", &["txt", "md", "log", "csv", "json", "xml", "yaml", "toml"]),
    ("video", &["mp4", "mov", "avi", "mkv", "webm", "m4v", "mpeg"]),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub retry_attempts: usize,
    pub retry_delay: Duration,
    pub verify_attempts: usize,
    pub allow_unregistered: bool,
    pub groups: BTreeMap<String, Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        let groups = BUILTIN_GROUPS
            .iter()
            .map(|(name, extensions)| {
                (
                    name.to_string(),
                    extensions.iter().map(|e| e.to_string()).collect(),
                )
            })
            .collect();
        Settings {
            retry_attempts: 3,
            retry_delay: Duration::from_millis(100),
            verify_attempts: 1,
            allow_unregistered: false,
            groups,
        }
    }
}

impl Settings {
    /// Configuration file search paths, most specific first.
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(val) = std::env::var(CONFIGURATION_PATH_ENV) {
            paths.push(PathBuf::from(val));
        } else {
            if let Ok(home) = std::env::var("HOME") {
                paths.push(PathBuf::from(format!("{home}/.dutis/configuration.plist")));
            }
            paths.push(PathBuf::from("/usr/local/etc/dutis/configuration.plist"));
        }
        paths
    }

    /// Load settings from the first existing file in `paths`.
    pub fn load(paths: &[PathBuf]) -> Result<Settings> {
        for path in paths {
            if path.is_file() {
                return Settings::open(path);
            }
        }
        debug!("event=config_default searched={}", paths.len());
        Ok(Settings::default())
    }

    /// Load settings from one file, layered over the defaults.
    pub fn open(path: &Path) -> Result<Settings> {
        let value = Value::from_file(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let dict = match value {
            Value::Dictionary(d) => d,
            _ => {
                return Err(Error::Config {
                    path: path.to_path_buf(),
                    message: "top-level object is not a dictionary".to_string(),
                })
            }
        };

        let invalid = |key: &str, expected: &str| Error::Config {
            path: path.to_path_buf(),
            message: format!("'{key}' must be {expected}"),
        };

        let mut settings = Settings::default();
        if let Some(v) = dict.get("RetryAttempts") {
            settings.retry_attempts = get_count(v)
                .filter(|n| *n >= 1)
                .ok_or_else(|| invalid("RetryAttempts", "an integer of at least 1"))?;
        }
        if let Some(v) = dict.get("RetryDelayMilliseconds") {
            let ms = get_count(v).ok_or_else(|| invalid("RetryDelayMilliseconds", "a non-negative integer"))?;
            settings.retry_delay = Duration::from_millis(ms as u64);
        }
        if let Some(v) = dict.get("VerifyAttempts") {
            settings.verify_attempts = get_count(v).ok_or_else(|| invalid("VerifyAttempts", "a non-negative integer"))?;
        }
        if let Some(v) = dict.get("AllowUnregistered") {
            settings.allow_unregistered = v.as_boolean().ok_or_else(|| invalid("AllowUnregistered", "a boolean"))?;
        }
        if let Some(v) = dict.get("Groups") {
            let groups = v
                .as_dictionary()
                .ok_or_else(|| invalid("Groups", "a dictionary of string arrays"))?;
            for (name, members) in groups.iter() {
                let extensions = string_array(members).ok_or_else(|| invalid("Groups", "a dictionary of string arrays"))?;
                settings.groups.insert(name.clone(), extensions);
            }
        }

        debug!("event=config_loaded path={}", path.display());
        Ok(settings)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts.max(1),
            min_delay: self.retry_delay,
            ..RetryPolicy::default()
        }
    }

    pub fn group(&self, name: &str) -> Result<&[String]> {
        self.groups
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::UnknownGroup(name.to_string()))
    }
}

fn get_count(value: &Value) -> Option<usize> {
    value
        .as_signed_integer()
        .and_then(|n| usize::try_from(n).ok())
        .or_else(|| value.as_unsigned_integer().and_then(|n| usize::try_from(n).ok()))
}

fn string_array(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_string().map(|s| s.trim_start_matches('.').to_ascii_lowercase()))
        .collect()
}
