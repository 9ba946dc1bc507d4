//! Configuration lookup and stream defaults
//!
//! Settings are read through [`ConfigSource`], a plain key/value lookup
//! with dotted keys (`stream.buffer_size`). Sources can be layered so that,
//! for example, the environment overrides a TOML file which overrides the
//! built-in defaults.

use crate::mode::{DEFAULT_PERMISSIONS, Permissions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default buffer size in units.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

pub const BUFFER_SIZE_KEY: &str = "stream.buffer_size";
pub const PERMISSIONS_KEY: &str = "stream.permissions";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// A key/value lookup.
pub trait ConfigSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Look up a flag. See [`parse_bool`].
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).map(|value| parse_bool(&value))
    }
}

/// Values starting with `0`, `no`, `off`, `false` or `disable` (ignoring
/// case) are false; anything else, including the empty string, is true.
pub fn parse_bool(value: &str) -> bool {
    const FALSE_PREFIXES: [&str; 5] = ["0", "no", "off", "false", "disable"];
    let value = value.trim().to_ascii_lowercase();
    !FALSE_PREFIXES.iter().any(|prefix| value.starts_with(prefix))
}

/// Look up `key` and parse it with `FromStr`.
pub fn get_parsed<T>(source: &dyn ConfigSource, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let Some(value) = source.get(key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|err: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.clone(),
            reason: err.to_string(),
        })
}

/// In-memory source.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    values: BTreeMap<String, String>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapSource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Environment variables: `stream.buffer_size` is read from
/// `FDSTREAM_STREAM_BUFFER_SIZE`.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
}

impl EnvSource {
    pub const DEFAULT_PREFIX: &'static str = "FDSTREAM_";

    pub fn new() -> Self {
        Self::with_prefix(Self::DEFAULT_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The variable name `key` maps to.
    pub fn var_name(&self, key: &str) -> String {
        let mut name = self.prefix.clone();
        name.extend(key.chars().map(|c| match c {
            '.' | '-' => '_',
            c => c.to_ascii_uppercase(),
        }));
        name
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(self.var_name(key)).ok()
    }
}

/// A parsed TOML document; dotted keys walk nested tables.
#[derive(Debug, Clone, Default)]
pub struct TomlSource {
    table: toml::Table,
}

impl TomlSource {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            table: text.parse::<toml::Table>()?,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::parse(&read_file(path.as_ref())?)
    }
}

impl ConfigSource for TomlSource {
    fn get(&self, key: &str) -> Option<String> {
        let mut parts = key.split('.');
        let mut value = self.table.get(parts.next()?)?;
        for part in parts {
            value = value.as_table()?.get(part)?;
        }
        match value {
            toml::Value::String(s) => Some(s.clone()),
            toml::Value::Integer(i) => Some(i.to_string()),
            toml::Value::Float(f) => Some(f.to_string()),
            toml::Value::Boolean(b) => Some(b.to_string()),
            toml::Value::Datetime(d) => Some(d.to_string()),
            toml::Value::Array(_) | toml::Value::Table(_) => None,
        }
    }
}

/// Several sources consulted in order; the first hit wins.
#[derive(Default)]
pub struct Layered {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl Layered {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source with lower precedence than those already added.
    pub fn with(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }
}

impl ConfigSource for Layered {
    fn get(&self, key: &str) -> Option<String> {
        self.sources.iter().find_map(|source| source.get(key))
    }
}

impl fmt::Debug for Layered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layered")
            .field("sources", &self.sources.len())
            .finish()
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Defaults applied by streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Buffer capacity in units for each direction the stream uses
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Permissions for files created by `open`
    #[serde(default = "default_permissions", with = "permissions_serde")]
    pub permissions: Permissions,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            permissions: default_permissions(),
        }
    }
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_permissions() -> Permissions {
    DEFAULT_PERMISSIONS
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    stream: StreamConfig,
}

impl StreamConfig {
    /// Build from `source`, falling back to the defaults for missing keys.
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        Self::default().with_overrides(source)
    }

    /// Replace the fields whose keys `source` defines, keeping the rest.
    ///
    /// Source values are strings, so `stream.permissions` is always read as
    /// octal digits here. Use [`StreamConfig::load_from`] for TOML files that
    /// write the mode as an integer.
    pub fn with_overrides(self, source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let config = Self {
            buffer_size: get_parsed(source, BUFFER_SIZE_KEY)?.unwrap_or(self.buffer_size),
            permissions: get_parsed(source, PERMISSIONS_KEY)?.unwrap_or(self.permissions),
        };
        config.validate()?;
        Ok(config)
    }

    /// Read the `[stream]` table of a TOML file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(&read_file(path.as_ref())?)?;
        file.stream.validate()?;
        Ok(file.stream)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: BUFFER_SIZE_KEY.to_string(),
                value: "0".to_string(),
                reason: "buffer size must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Permissions are written as an octal string (`"644"`). Integers are
/// accepted on input and read as the numeric mode (TOML `0o644`).
mod permissions_serde {
    use super::Permissions;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(perms: &Permissions, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(perms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Permissions, D::Error> {
        deserializer.deserialize_any(PermissionsVisitor)
    }

    struct PermissionsVisitor;

    impl Visitor<'_> for PermissionsVisitor {
        type Value = Permissions;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an octal permission string or a numeric mode")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Permissions, E> {
            v.parse().map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Permissions, E> {
            u32::try_from(v)
                .ok()
                .and_then(Permissions::from_octal)
                .ok_or_else(|| E::custom(format!("mode {v:#o} has bits outside 0o777")))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Permissions, E> {
            let v = u64::try_from(v).map_err(|_| E::custom("negative mode"))?;
            self.visit_u64(v)
        }
    }
}
