//! The configuration block resolved per-card by group membership. The
//! external, user-editable defaults are persisted on disk in the teacher's
//! idiom: a TOML file under the platform config directory (`etcetera`),
//! read with defaults-on-missing-file semantics and written back with
//! `toml_edit` so round-tripping an existing file never loses
//! unknown-to-this-version sibling data. Per-group overrides are an
//! in-memory map the caller owns and supplies to the queue builder.

use crate::model::GroupId;
use crate::{Error, LibraryError};
use etcetera::{AppStrategy, AppStrategyArgs, choose_app_strategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, read_to_string, write};
use std::path::PathBuf;
use toml_edit::DocumentMut;

#[allow(clippy::missing_panics_doc)]
pub fn get_config_dir() -> PathBuf {
    let crate_name = env!("CARGO_PKG_NAME");
    if cfg!(feature = "testing") {
        let mut tmp_dir = PathBuf::from("/tmp");
        tmp_dir.push(crate_name);
        tmp_dir.push("config");
        create_dir_all(&tmp_dir).unwrap();
        return tmp_dir;
    }
    let strategy: etcetera::app_strategy::Xdg = choose_app_strategy(AppStrategyArgs {
        top_level_domain: "org".to_string(),
        author: crate_name.to_string(),
        app_name: crate_name.to_string(),
    })
    .unwrap();
    create_dir_all(strategy.config_dir()).unwrap();
    strategy.config_dir()
}

#[derive(
    Clone, Copy, Debug, Eq, PartialEq, strum::EnumString, strum::Display, Serialize, Deserialize,
)]
pub enum NewOrder {
    Random,
    Added,
}

#[derive(
    Clone, Copy, Debug, Eq, PartialEq, strum::EnumString, strum::Display, Serialize, Deserialize,
)]
pub enum LeechAction {
    Suspend,
    TagOnly,
}

/// Learning steps for fresh cards, in minutes, plus graduation intervals.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NewConfig {
    pub delays: Vec<f64>,
    /// `[good_ivl, easy_ivl, first_review_delay_days]`, in days.
    pub ints: [i64; 3],
    pub per_day: u32,
    pub order: NewOrder,
}

impl Default for NewConfig {
    fn default() -> Self {
        NewConfig {
            delays: vec![1.0, 10.0],
            ints: [1, 4, 7],
            per_day: 20,
            order: NewOrder::Added,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LapseConfig {
    pub delays: Vec<f64>,
    pub mult: f64,
    pub min_int: i64,
    pub leech_threshold: u32,
    pub leech_action: LeechAction,
    pub relearn: bool,
}

impl Default for LapseConfig {
    fn default() -> Self {
        LapseConfig {
            delays: vec![10.0],
            mult: 0.0,
            min_int: 1,
            leech_threshold: 16,
            leech_action: LeechAction::Suspend,
            relearn: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RevConfig {
    pub ease4: f64,
    pub min_space: i64,
    pub fuzz: f64,
    pub per_day: u32,
}

impl Default for RevConfig {
    fn default() -> Self {
        RevConfig {
            ease4: 1.3,
            min_space: 1,
            fuzz: 0.05,
            per_day: 200,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CramConfig {
    pub delays: Vec<f64>,
    pub reset: bool,
    pub resched: bool,
}

impl Default for CramConfig {
    fn default() -> Self {
        CramConfig {
            delays: vec![1.0, 10.0],
            reset: false,
            resched: true,
        }
    }
}

/// A fully-resolved configuration block for one card.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub new: NewConfig,
    pub lapse: LapseConfig,
    pub rev: RevConfig,
    pub cram: CramConfig,
    pub rollover_hour: u32,
}

impl Configuration {
    pub fn validate(&self) -> Result<(), String> {
        if self.new.delays.is_empty() {
            return Err("new.delays must not be empty".to_string());
        }
        if self.rev.fuzz < 0.0 {
            return Err("rev.fuzz must be non-negative".to_string());
        }
        Ok(())
    }
}

/// A partial override applied on top of the global default. Each present
/// block replaces the default's block wholesale; absent blocks fall
/// through.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigOverride {
    pub new: Option<NewConfig>,
    pub lapse: Option<LapseConfig>,
    pub rev: Option<RevConfig>,
    pub cram: Option<CramConfig>,
    pub rollover_hour: Option<u32>,
}

/// Resolves the effective [`Configuration`] for a card's `group_id`: the
/// global default, overridden per-group. Resolution happens once per queue
/// build and the result is cached on the in-memory card handle by the
/// caller (the resolver itself is cheap to call repeatedly).
#[derive(Clone, Debug, Default)]
pub struct ConfigResolver {
    pub default: Configuration,
    pub overrides: HashMap<GroupId, ConfigOverride>,
}

impl ConfigResolver {
    pub fn new(default: Configuration) -> Self {
        ConfigResolver {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn set_override(&mut self, group_id: GroupId, over: ConfigOverride) {
        self.overrides.insert(group_id, over);
    }

    pub fn resolve(&self, group_id: GroupId) -> Configuration {
        let Some(over) = self.overrides.get(&group_id) else {
            return self.default.clone();
        };
        Configuration {
            new: over.new.clone().unwrap_or_else(|| self.default.new.clone()),
            lapse: over
                .lapse
                .clone()
                .unwrap_or_else(|| self.default.lapse.clone()),
            rev: over.rev.clone().unwrap_or_else(|| self.default.rev.clone()),
            cram: over
                .cram
                .clone()
                .unwrap_or_else(|| self.default.cram.clone()),
            rollover_hour: over.rollover_hour.unwrap_or(self.default.rollover_hour),
        }
    }
}

fn get_external_config_file() -> PathBuf {
    let mut config_file_path = get_config_dir();
    config_file_path.push("config.toml");
    config_file_path
}

/// `toml_edit` is used in place of a plain `serde`+`toml` round trip so
/// that, when a user has an existing config file and a new default key is
/// later added, deserialization fills it in instead of failing.
pub fn read_external_config() -> Result<Configuration, Error> {
    let config_file_path = get_external_config_file();
    if !config_file_path.exists() {
        let config = Configuration::default();
        write_external_config(&config)?;
        return Ok(config);
    }
    let file_contents = read_to_string(&config_file_path).map_err(|e| Error::Io {
        description: format!("Failed to read {}.", config_file_path.display()),
        source: e,
    })?;
    let doc = file_contents
        .parse::<DocumentMut>()
        .map_err(|e| Error::Library(LibraryError::InvalidConfig(e.to_string())))?;
    let config: Configuration = toml_edit::de::from_document(doc)
        .map_err(|e| Error::Library(LibraryError::InvalidConfig(e.to_string())))?;
    config
        .validate()
        .map_err(|e| Error::Library(LibraryError::InvalidConfig(e)))?;
    Ok(config)
}

pub fn write_external_config(config: &Configuration) -> Result<(), Error> {
    let config_file_path = get_external_config_file();
    let config_string = toml_edit::ser::to_string_pretty(config).map_err(|e| {
        Error::Library(LibraryError::InvalidConfig(format!(
            "Failed to serialize config: {e}"
        )))
    })?;
    write(&config_file_path, config_string).map_err(|e| Error::Io {
        description: "Failed to write config".to_string(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resolver_falls_through_to_default_with_no_override() {
        let resolver = ConfigResolver::new(Configuration::default());
        let effective = resolver.resolve(1);
        assert_eq!(effective.lapse.leech_threshold, 16);
    }

    #[test]
    fn override_replaces_only_its_own_block() {
        let mut resolver = ConfigResolver::new(Configuration::default());
        resolver.set_override(
            1,
            ConfigOverride {
                lapse: Some(LapseConfig {
                    leech_threshold: 4,
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        let effective = resolver.resolve(1);
        assert_eq!(effective.lapse.leech_threshold, 4);
        assert_eq!(effective.new.ints, [1, 4, 7]);
    }
}
