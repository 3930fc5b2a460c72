use crate::config::{DisconnectSettings, StallSettings, StressSettings};
use crate::utils::error::{ProbeError, Result};
use crate::utils::validation::{validate_non_empty_string, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    pub suite: SuiteInfo,
    #[serde(default)]
    pub probes: Vec<ProbeDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteInfo {
    pub name: String,
    pub description: Option<String>,
    pub stop_on_failure: Option<bool>,
    /// 執行順序；未指定時依檔案中的順序
    pub execution_order: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeDefinition {
    pub name: String,
    pub enabled: Option<bool>,
    #[serde(flatten)]
    pub kind: ProbeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeKind {
    Disconnect(DisconnectSettings),
    Stall(StallSettings),
    Stress(StressSettings),
}

impl ProbeDefinition {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ProbeKind::Disconnect(_) => "disconnect",
            ProbeKind::Stall(_) => "stall",
            ProbeKind::Stress(_) => "stress",
        }
    }
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex is valid"))
}

fn check_known_keys(field: &str, known: &serde_json::Value, raw: &toml::Table) -> Result<()> {
    let Some(known) = known.as_object() else {
        return Ok(());
    };
    match raw.keys().find(|key| !known.contains_key(key.as_str())) {
        Some(key) => Err(ProbeError::ConfigValidationError {
            field: field.to_string(),
            message: format!("Unknown key '{}'", key),
        }),
        None => Ok(()),
    }
}

impl SuiteConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ProbeError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);
        let parse_error = |e: toml::de::Error| ProbeError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        };

        let config: Self = toml::from_str(&processed_content).map_err(parse_error)?;
        let raw: toml::Table = toml::from_str(&processed_content).map_err(parse_error)?;
        config.reject_unknown_keys(&raw)?;
        Ok(config)
    }

    /// Flattened settings cannot use `deny_unknown_fields`, so every key of
    /// the file is checked against the keys the parsed value serializes to.
    fn reject_unknown_keys(&self, raw: &toml::Table) -> Result<()> {
        if let Some(raw_suite) = raw.get("suite").and_then(|v| v.as_table()) {
            check_known_keys("suite", &serde_json::to_value(&self.suite)?, raw_suite)?;
        }

        let raw_probes = raw.get("probes").and_then(|v| v.as_array());
        for (definition, raw_probe) in self.probes.iter().zip(raw_probes.into_iter().flatten()) {
            if let Some(raw_probe) = raw_probe.as_table() {
                check_known_keys(
                    &format!("probes.{}", definition.name),
                    &serde_json::to_value(definition)?,
                    raw_probe,
                )?;
            }
        }
        Ok(())
    }

    /// 替換環境變數 (例如 ${XMLRPC_HOST})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    pub fn get_probe(&self, name: &str) -> Option<&ProbeDefinition> {
        self.probes.iter().find(|p| p.name == name)
    }

    pub fn stop_on_failure(&self) -> bool {
        self.suite.stop_on_failure.unwrap_or(false)
    }

    /// Enabled probes in execution order.
    pub fn ordered_probes(&self) -> Result<Vec<&ProbeDefinition>> {
        let ordered: Vec<&ProbeDefinition> = match &self.suite.execution_order {
            Some(order) => order
                .iter()
                .map(|name| {
                    self.get_probe(name)
                        .ok_or_else(|| ProbeError::ConfigValidationError {
                            field: "suite.execution_order".to_string(),
                            message: format!("Unknown probe '{}'", name),
                        })
                })
                .collect::<Result<_>>()?,
            None => self.probes.iter().collect(),
        };

        Ok(ordered.into_iter().filter(|p| p.is_enabled()).collect())
    }
}

impl Validate for SuiteConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("suite.name", &self.suite.name)?;

        if self.probes.is_empty() {
            return Err(ProbeError::ConfigValidationError {
                field: "probes".to_string(),
                message: "Suite defines no probes".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for probe in &self.probes {
            validate_non_empty_string("probes.name", &probe.name)?;
            if !seen.insert(probe.name.as_str()) {
                return Err(ProbeError::ConfigValidationError {
                    field: "probes.name".to_string(),
                    message: format!("Duplicate probe name '{}'", probe.name),
                });
            }

            match &probe.kind {
                ProbeKind::Disconnect(settings) => settings.validate()?,
                ProbeKind::Stall(settings) => settings.validate()?,
                ProbeKind::Stress(settings) => settings.validate()?,
            }
        }

        if let Some(order) = &self.suite.execution_order {
            for name in order {
                if self.get_probe(name).is_none() {
                    return Err(ProbeError::ConfigValidationError {
                        field: "suite.execution_order".to_string(),
                        message: format!("Unknown probe '{}'", name),
                    });
                }
            }
        }

        Ok(())
    }
}
