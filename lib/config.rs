//! Run configuration.
//!
//! Loaded from a TOML file, then overridden by `DIATOM_*` environment
//! variables, then validated:
//!
//! ```toml
//! n_max = 3
//! input = "data/Rb87Cs133NMax3-eig.npz"
//! output = "output"
//!
//! [molecule]
//! name = "Rb87Cs133"
//! i1_d = 3
//! i2_d = 7
//! start_states = [[0, 10, 0], [0, 8, 1]]
//!
//! [[fields]]
//! start = 0.001
//! stop = 100.0
//! step = 0.1
//! ```

use std::{
    env,
    path::{ Path, PathBuf },
};
use serde::Deserialize;
use crate::{
    error::{ Error, Result },
    labels::{ LabelSpace, StateLabel },
    sampler::{ FieldGrid, FieldSegment },
    spin::SpinTotal,
};

/// Reduced Planck constant in J s.
pub const HBAR: f64 = 1.054571817e-34;

/// Molecule-specific constants.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct MoleculeConfig {
    /// Used in the output file name.
    pub name: String,
    /// Doubled nuclear spin of the first nucleus.
    pub i1_d: u32,
    /// Doubled nuclear spin of the second nucleus.
    pub i2_d: u32,
    /// Initial states as `[N, MF_D, d]`.
    #[serde(default)]
    pub start_states: Vec<(u32, i32, u32)>,
}

/// Top-level configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Config {
    pub molecule: MoleculeConfig,

    /// Highest rotational level.
    pub n_max: u32,

    #[serde(default = "default_hbar")]
    pub hbar: f64,

    /// Expected field grid in gauss; checked against the input if given.
    #[serde(default)]
    pub fields: Vec<FieldSegment>,

    /// Archive written by the diagonalization step.
    pub input: PathBuf,

    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Worker threads; `0` for the rayon default.
    #[serde(default)]
    pub threads: usize,
}

fn default_hbar() -> f64 { HBAR }

fn default_output() -> PathBuf { PathBuf::from("output") }

impl Config {
    /// Parse a configuration from TOML text without applying overrides.
    pub fn from_toml(text: &str) -> Result<Self> { Ok(toml::from_str(text)?) }

    /// Load, override from the environment and validate.
    pub fn load<P>(path: P) -> Result<Self>
    where P: AsRef<Path>
    {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&text)?;
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a `DIATOM_*` variable lookup.
    pub fn apply_overrides<F>(&mut self, var: F) -> Result<()>
    where F: Fn(&str) -> Option<String>
    {
        fn parse<T>(key: &str, val: String) -> Result<T>
        where T: std::str::FromStr
        {
            val.trim().parse()
                .map_err(|_| Error::Config(format!("invalid value for {}: {}", key, val)))
        }

        if let Some(val) = var("DIATOM_N_MAX") {
            self.n_max = parse("DIATOM_N_MAX", val)?;
        }
        if let Some(val) = var("DIATOM_HBAR") {
            self.hbar = parse("DIATOM_HBAR", val)?;
        }
        if let Some(val) = var("DIATOM_INPUT") {
            self.input = PathBuf::from(val);
        }
        if let Some(val) = var("DIATOM_OUTPUT") {
            self.output = PathBuf::from(val);
        }
        if let Some(val) = var("DIATOM_THREADS") {
            self.threads = parse("DIATOM_THREADS", val)?;
        }
        if let Some(val) = var("DIATOM_MOLECULE") {
            self.molecule.name = val;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.molecule.name.is_empty() {
            return Err(Error::Config("molecule name cannot be empty".into()));
        }
        if !(self.hbar.is_finite() && self.hbar > 0.0) {
            return Err(Error::Config(format!("invalid hbar {}", self.hbar)));
        }
        if self.molecule.start_states.is_empty() {
            return Err(Error::Config("at least one start state is required".into()));
        }
        if let Some(seg)
            = self.fields.iter().find(|s| !(s.step > 0.0 && s.stop > s.start))
        {
            return Err(Error::Config(format!("empty field segment {:?}", seg)));
        }
        Ok(())
    }

    /// The label space described by this configuration.
    pub fn label_space(&self) -> LabelSpace {
        LabelSpace::new(
            self.n_max,
            SpinTotal::new(self.molecule.i1_d),
            SpinTotal::new(self.molecule.i2_d),
        )
    }

    /// Node indices of the configured start states.
    pub fn initial_indices(&self, labels: &LabelSpace) -> Result<Vec<usize>> {
        self.molecule.start_states.iter()
            .map(|t| {
                let label = StateLabel::from(*t);
                labels.index_of(&label).ok_or(Error::LabelNotFound(label))
            })
            .collect()
    }

    /// Expected field grid, if one was configured.
    pub fn field_grid(&self) -> Result<Option<FieldGrid>> {
        if self.fields.is_empty() {
            Ok(None)
        } else {
            FieldGrid::from_segments(&self.fields).map(Some)
        }
    }

    /// Archive file stem, `{molecule}NMax{n_max}`.
    pub fn settings(&self) -> String {
        crate::archive::settings_string(&self.molecule.name, self.n_max)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const TEXT: &str = r#"
        n_max = 1
        input = "in.npz"

        [molecule]
        name = "Rb87Cs133"
        i1_d = 3
        i2_d = 3
        start_states = [[0, 0, 0], [0, 2, 1]]

        [[fields]]
        start = 1.0
        stop = 3.0
        step = 1.0
    "#;

    #[test]
    fn parses_with_defaults() {
        let config = Config::from_toml(TEXT).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.hbar, HBAR);
        assert_eq!(config.output, PathBuf::from("output"));
        assert_eq!(config.threads, 0);
        assert_eq!(config.settings(), "Rb87Cs133NMax1");
        assert_eq!(config.field_grid().unwrap().unwrap().len(), 2);
        assert_eq!(config.label_space().num_states(), 64);
    }

    #[test]
    fn env_overrides_apply_after_file() {
        let mut config = Config::from_toml(TEXT).unwrap();
        config.apply_overrides(|key| match key {
            "DIATOM_N_MAX" => Some("2".into()),
            "DIATOM_OUTPUT" => Some("elsewhere".into()),
            "DIATOM_THREADS" => Some(" 4 ".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.n_max, 2);
        assert_eq!(config.output, PathBuf::from("elsewhere"));
        assert_eq!(config.threads, 4);
        assert_eq!(config.input, PathBuf::from("in.npz"));

        let err = config.apply_overrides(|key| {
            (key == "DIATOM_HBAR").then(|| "abc".to_string())
        });
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = Config::from_toml(TEXT).unwrap();
        config.hbar = -1.0;
        assert!(config.validate().is_err());
        let mut config = Config::from_toml(TEXT).unwrap();
        config.molecule.start_states.clear();
        assert!(config.validate().is_err());
        let mut config = Config::from_toml(TEXT).unwrap();
        config.fields[0].step = 0.0;
        assert!(config.validate().is_err());
        assert!(Config::from_toml("n_max = 1").is_err());
    }

    #[test]
    fn start_states_resolve_to_indices() {
        let config = Config::from_toml(TEXT).unwrap();
        let labels = config.label_space();
        let initial = config.initial_indices(&labels).unwrap();
        assert_eq!(initial.len(), 2);
        for (k, t) in initial.iter().zip(&config.molecule.start_states) {
            assert_eq!(labels.label(*k), Some(&StateLabel::from(*t)));
        }

        let mut config = config;
        config.molecule.start_states.push((0, 8, 0));
        assert!(matches!(
            config.initial_indices(&labels),
            Err(Error::LabelNotFound(l)) if l == StateLabel::new(0, 8, 0),
        ));
    }
}
