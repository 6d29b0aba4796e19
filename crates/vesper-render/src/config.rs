//! Render system configuration.
//!
//! [`RenderSystemConfig`] holds typed settings shared by every backend.
//! [`ConfigOptionMap`] carries the free-form, backend-published options
//! (video mode, colour depth, driver quirks) and validates changes against
//! each option's allowed values.

use indexmap::IndexMap;

use crate::depth_buffer::PoolId;
use crate::error::{RenderSystemError, RenderSystemResult};

/// Typed settings used by the shared render system layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSystemConfig {
    pub vsync: bool,
    pub vsync_interval: u32,
    pub wbuffer: bool,
    pub fsaa: u8,
    pub fsaa_hint: String,
    /// Pool new targets draw depth buffers from.
    pub default_depth_pool: PoolId,
    /// Require exact depth formats when sharing pooled buffers.
    pub exact_depth_format: bool,
}

impl Default for RenderSystemConfig {
    fn default() -> Self {
        Self {
            vsync: true,
            vsync_interval: 1,
            wbuffer: false,
            fsaa: 0,
            fsaa_hint: String::new(),
            default_depth_pool: PoolId::DEFAULT,
            exact_depth_format: false,
        }
    }
}

impl RenderSystemConfig {
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn with_vsync_interval(mut self, interval: u32) -> Self {
        self.vsync_interval = interval.max(1);
        self
    }

    pub fn with_wbuffer(mut self, wbuffer: bool) -> Self {
        self.wbuffer = wbuffer;
        self
    }

    pub fn with_fsaa(mut self, fsaa: u8, hint: impl Into<String>) -> Self {
        self.fsaa = fsaa;
        self.fsaa_hint = hint.into();
        self
    }

    pub fn with_default_depth_pool(mut self, pool: PoolId) -> Self {
        self.default_depth_pool = pool;
        self
    }

    pub fn with_exact_depth_format(mut self, exact: bool) -> Self {
        self.exact_depth_format = exact;
        self
    }
}

/// One backend-published option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOption {
    pub name: String,
    pub current_value: String,
    /// Empty means any value is accepted.
    pub possible_values: Vec<String>,
    pub immutable: bool,
}

impl ConfigOption {
    pub fn new(name: impl Into<String>, current_value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current_value: current_value.into(),
            possible_values: Vec::new(),
            immutable: false,
        }
    }

    pub fn with_possible_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.possible_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }
}

/// Options keyed by name, in the order the backend published them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOptionMap {
    options: IndexMap<String, ConfigOption>,
}

impl ConfigOptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, option: ConfigOption) {
        self.options.insert(option.name.clone(), option);
    }

    pub fn get(&self, name: &str) -> Option<&ConfigOption> {
        self.options.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(|o| o.current_value.as_str())
    }

    pub fn set(&mut self, name: &str, value: &str) -> RenderSystemResult<()> {
        let option = self
            .options
            .get_mut(name)
            .ok_or_else(|| RenderSystemError::InvalidConfigOption {
                name: name.to_string(),
                message: "unknown option".to_string(),
            })?;

        if option.immutable {
            return Err(RenderSystemError::InvalidConfigOption {
                name: name.to_string(),
                message: "option is immutable".to_string(),
            });
        }
        if !option.possible_values.is_empty() && !option.possible_values.iter().any(|v| v == value) {
            return Err(RenderSystemError::InvalidConfigOption {
                name: name.to_string(),
                message: format!("'{}' is not one of {:?}", value, option.possible_values),
            });
        }

        option.current_value = value.to_string();
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigOption> {
        self.options.values()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

impl FromIterator<ConfigOption> for ConfigOptionMap {
    fn from_iter<T: IntoIterator<Item = ConfigOption>>(iter: T) -> Self {
        let mut map = Self::new();
        for option in iter {
            map.insert(option);
        }
        map
    }
}
