use anyhow::{Context, Result};
use clap::Args;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fs, path::PathBuf, str::FromStr};

use crate::{error::PipelineError, process::ReadMode, schema::SchemaRegistry};

/// Inclusive range of four-digit years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: u16,
    pub end: u16,
}

impl FromStr for YearRange {
    type Err = PipelineError;

    /// Accepts `2005`, `2005-2023` or `2005:2023`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let re = Regex::new(r"^\s*(\d{4})\s*(?:[-:]\s*(\d{4}))?\s*$")
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        let caps = re
            .captures(s)
            .ok_or_else(|| PipelineError::Config(format!("not a year or year range: `{}`", s)))?;

        let parse = |m: regex::Match<'_>| {
            m.as_str()
                .parse::<u16>()
                .map_err(|e| PipelineError::Config(e.to_string()))
        };
        let start = match caps.get(1) {
            Some(m) => parse(m)?,
            None => return Err(PipelineError::Config(format!("no start year in `{}`", s))),
        };
        let end = match caps.get(2) {
            Some(m) => parse(m)?,
            None => start,
        };
        Ok(YearRange { start, end })
    }
}

/// Which subdirectories under each document-type root to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupSelection {
    Years(YearRange),
    Districts(Vec<String>),
}

impl GroupSelection {
    /// Group keys in processing order, duplicates removed.
    pub fn keys(&self) -> Result<Vec<String>, PipelineError> {
        match self {
            GroupSelection::Years(YearRange { start, end }) => {
                if start > end {
                    return Err(PipelineError::Config(format!(
                        "year range starts after it ends: {}-{}",
                        start, end
                    )));
                }
                Ok((*start..=*end).map(|y| y.to_string()).collect())
            }
            GroupSelection::Districts(names) => {
                let mut seen = HashSet::new();
                Ok(names
                    .iter()
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty() && seen.insert(n.clone()))
                    .collect())
            }
        }
    }
}

/// Everything one pipeline run needs, passed explicitly to each stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub securities_root: PathBuf,
    pub insiders_root: PathBuf,
    pub output_dir: PathBuf,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub groups: GroupSelection,
    /// Read every cell as text during aggregation.
    pub strict_types: bool,
    /// Also write each combined table as Parquet.
    pub write_parquet: bool,
    pub schemas: SchemaRegistry,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            securities_root: PathBuf::from("csv/securities"),
            insiders_root: PathBuf::from("csv/insiders"),
            output_dir: PathBuf::from("output"),
            groups: GroupSelection::Years(YearRange {
                start: 2000,
                end: 2024,
            }),
            strict_types: false,
            write_parquet: false,
            schemas: SchemaRegistry::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a YAML config; omitted fields keep their defaults.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: PipelineConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn read_mode(&self) -> ReadMode {
        if self.strict_types {
            ReadMode::Strict
        } else {
            ReadMode::Infer
        }
    }
}

/// Command-line flags shared by the binaries; each one set overrides the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// YAML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Year or inclusive year range, e.g. 2005-2023
    #[arg(long, conflicts_with = "districts")]
    pub years: Option<YearRange>,

    /// Comma-separated district directory names
    #[arg(long, value_delimiter = ',')]
    pub districts: Option<Vec<String>>,

    /// Root holding securities/{group}/*.csv
    #[arg(long)]
    pub securities_root: Option<PathBuf>,

    /// Root holding insiders/{group}/*.csv
    #[arg(long)]
    pub insiders_root: Option<PathBuf>,

    /// Output directory
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Read every cell as text when aggregating
    #[arg(long)]
    pub strict: bool,

    /// Also write combined tables as Parquet
    #[arg(long)]
    pub parquet: bool,
}

impl ConfigArgs {
    pub fn resolve(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(years) = self.years {
            config.groups = GroupSelection::Years(years);
        }
        if let Some(districts) = self.districts {
            config.groups = GroupSelection::Districts(districts);
        }
        if let Some(root) = self.securities_root {
            config.securities_root = root;
        }
        if let Some(root) = self.insiders_root {
            config.insiders_root = root;
        }
        if let Some(dir) = self.output {
            config.output_dir = dir;
        }
        config.strict_types |= self.strict;
        config.write_parquet |= self.parquet;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_year_ranges() {
        assert_eq!(
            "2005-2007".parse::<YearRange>().unwrap(),
            YearRange {
                start: 2005,
                end: 2007
            }
        );
        assert_eq!(
            "2010".parse::<YearRange>().unwrap(),
            YearRange {
                start: 2010,
                end: 2010
            }
        );
        assert!("05-07".parse::<YearRange>().is_err());
        assert!("Boston".parse::<YearRange>().is_err());
    }

    #[test]
    fn year_keys_are_inclusive() {
        let keys = GroupSelection::Years(YearRange {
            start: 2005,
            end: 2007,
        })
        .keys()
        .unwrap();
        assert_eq!(keys, vec!["2005", "2006", "2007"]);
    }

    #[test]
    fn reversed_range_is_rejected() {
        let err = GroupSelection::Years(YearRange {
            start: 2010,
            end: 2005,
        })
        .keys()
        .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn district_keys_are_deduplicated() {
        let keys = GroupSelection::Districts(vec![
            "Boston".into(),
            " Chicago ".into(),
            "Boston".into(),
            "".into(),
        ])
        .keys()
        .unwrap();
        assert_eq!(keys, vec!["Boston", "Chicago"]);
    }

    #[test]
    fn loads_partial_yaml() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("pipeline.yaml");
        fs::write(
            &path,
            "securities_root: data/sec\ngroups:\n  districts: [Boston, Atlanta]\nstrict_types: true\n",
        )?;

        let config = PipelineConfig::load(&path)?;
        assert_eq!(config.securities_root, PathBuf::from("data/sec"));
        assert_eq!(config.insiders_root, PathBuf::from("csv/insiders"));
        assert_eq!(
            config.groups,
            GroupSelection::Districts(vec!["Boston".into(), "Atlanta".into()])
        );
        assert_eq!(config.read_mode(), ReadMode::Strict);
        assert_eq!(config.schemas, SchemaRegistry::default());
        Ok(())
    }

    #[test]
    fn flags_override_file() -> Result<()> {
        let args = ConfigArgs {
            years: Some("2019-2020".parse()?),
            output: Some(PathBuf::from("out")),
            parquet: true,
            ..ConfigArgs::default()
        };
        let config = args.resolve()?;
        assert_eq!(config.groups.keys()?, vec!["2019", "2020"]);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert!(config.write_parquet);
        assert!(!config.strict_types);
        Ok(())
    }
}
