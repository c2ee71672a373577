use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// File name looked up in the working directory when no config path is given.
pub const DEFAULT_CONFIG_FILE: &str = "shaderbuild.toml";

/// Subdirectory of the asset root that receives compiled shader binaries.
pub const SHADER_OUTPUT_DIR: &str = "shaders";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Pipeline stage a shader unit can implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Vertex,
    Fragment,
    Compute,
}

impl Stage {
    /// Stages in the order their unit lists are expanded.
    pub const ALL: [Stage; 3] = [Stage::Vertex, Stage::Fragment, Stage::Compute];

    /// Name understood by the shader compiler's `-stage` argument.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Vertex => "vertex",
            Stage::Fragment => "fragment",
            Stage::Compute => "compute",
        }
    }

    pub fn entry_point(self) -> &'static str {
        match self {
            Stage::Vertex => "vertex_main",
            Stage::Fragment => "fragment_main",
            Stage::Compute => "compute_main",
        }
    }

    /// Infix used in compiled file names (`<unit>.<suffix>.<ext>`).
    pub fn suffix(self) -> &'static str {
        match self {
            Stage::Vertex => "vert",
            Stage::Fragment => "frag",
            Stage::Compute => "comp",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered shader unit names, one list per stage.
///
/// A unit may appear in several lists when its source file defines more than
/// one entry point. Empty lists are valid and produce no work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UnitRegistry {
    #[serde(default)]
    pub vertex: Vec<String>,
    #[serde(default)]
    pub fragment: Vec<String>,
    #[serde(default)]
    pub compute: Vec<String>,
}

impl UnitRegistry {
    pub fn units(&self, stage: Stage) -> &[String] {
        match stage {
            Stage::Vertex => &self.vertex,
            Stage::Fragment => &self.fragment,
            Stage::Compute => &self.compute,
        }
    }

    /// Every (stage, unit) pair: vertex list first, then fragment, then compute.
    pub fn entries(&self) -> impl Iterator<Item = (Stage, &str)> + '_ {
        Stage::ALL.into_iter().flat_map(move |stage| {
            self.units(stage)
                .iter()
                .map(move |unit| (stage, unit.as_str()))
        })
    }

    pub fn len(&self) -> usize {
        self.vertex.len() + self.fragment.len() + self.compute.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for stage in Stage::ALL {
            let mut seen = HashSet::new();
            for unit in self.units(stage) {
                validate_unit_name(stage, unit)?;
                if !seen.insert(unit.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "unit '{unit}' is listed twice for the {stage} stage; both would write the same output file"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn validate_unit_name(stage: Stage, unit: &str) -> Result<(), ConfigError> {
    if unit.trim().is_empty() {
        return Err(ConfigError::Invalid(format!(
            "{stage} unit list contains an empty name"
        )));
    }

    if unit != unit.trim() {
        return Err(ConfigError::Invalid(format!(
            "{stage} unit '{unit}' has leading or trailing whitespace"
        )));
    }

    if unit.contains(['/', '\\']) || unit == "." || unit == ".." {
        return Err(ConfigError::Invalid(format!(
            "{stage} unit '{unit}' must be a plain file stem, not a path"
        )));
    }

    Ok(())
}

/// External shader compiler and the file extensions it consumes and produces.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerSettings {
    pub executable: String,
    pub source_extension: String,
    pub binary_extension: String,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            executable: "slangc".to_string(),
            source_extension: "slang".to_string(),
            binary_extension: "spv".to_string(),
        }
    }
}

/// External program compiler invoked once per run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProgramSettings {
    pub executable: String,
    pub args: Vec<String>,
    pub debug_args: Vec<String>,
    pub release_args: Vec<String>,
    /// Launch the program build only after every shader compiled cleanly.
    pub after_shaders: bool,
    /// Environment variable that receives the requested log level.
    pub log_env: Option<String>,
}

impl Default for ProgramSettings {
    fn default() -> Self {
        Self {
            executable: "cargo".to_string(),
            args: vec!["build".to_string()],
            debug_args: Vec::new(),
            release_args: vec!["--release".to_string()],
            after_shaders: false,
            log_env: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    pub version: u32,
    #[serde(default = "default_shader_root")]
    pub shader_root: PathBuf,
    #[serde(default = "default_asset_root")]
    pub asset_root: PathBuf,
    #[serde(default)]
    pub compiler: CompilerSettings,
    #[serde(default)]
    pub program: ProgramSettings,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub units: UnitRegistry,
}

fn default_shader_root() -> PathBuf {
    PathBuf::from("shaders")
}

fn default_asset_root() -> PathBuf {
    PathBuf::from("assets")
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }
    }

    deserializer.deserialize_any(Visitor)
}

/// Parses a human-readable duration (`90s`, `5m`) or a plain number of seconds.
pub fn parse_timeout(raw: &str) -> Result<Duration, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("timeout must not be empty".to_string());
    }

    let duration = match trimmed.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(_) => humantime::parse_duration(trimmed)
            .map_err(|err| format!("invalid timeout '{trimmed}': {err}"))?,
    };

    if duration.is_zero() {
        return Err("timeout must be greater than zero".to_string());
    }
    Ok(duration)
}

impl BuildConfig {
    /// Configuration with default toolchain settings around the given units.
    pub fn with_units(units: UnitRegistry) -> Self {
        Self {
            version: 1,
            shader_root: default_shader_root(),
            asset_root: default_asset_root(),
            compiler: CompilerSettings::default(),
            program: ProgramSettings::default(),
            timeout: None,
            units,
        }
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: BuildConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates a config file, resolving relative roots against
    /// the directory that contains it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        Ok(config)
    }

    pub fn rebase(&mut self, base: &Path) {
        if self.shader_root.is_relative() {
            self.shader_root = base.join(&self.shader_root);
        }
        if self.asset_root.is_relative() {
            self.asset_root = base.join(&self.asset_root);
        }
    }

    pub fn shader_output_dir(&self) -> PathBuf {
        self.asset_root.join(SHADER_OUTPUT_DIR)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.compiler.executable.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "compiler.executable must not be empty".into(),
            ));
        }

        for (field, value) in [
            ("source_extension", &self.compiler.source_extension),
            ("binary_extension", &self.compiler.binary_extension),
        ] {
            let trimmed = value.trim();
            if trimmed.is_empty() || trimmed.starts_with('.') {
                return Err(ConfigError::Invalid(format!(
                    "compiler.{field} must be a non-empty extension without a leading dot"
                )));
            }
        }

        if self.program.executable.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "program.executable must not be empty".into(),
            ));
        }

        if let Some(name) = &self.program.log_env {
            if name.is_empty() || name.contains(['=', '\0']) {
                return Err(ConfigError::Invalid(format!(
                    "program.log_env '{name}' is not a valid environment variable name"
                )));
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout.is_zero() {
                return Err(ConfigError::Invalid(
                    "timeout must be greater than zero".into(),
                ));
            }
        }

        self.units.validate()
    }
}
