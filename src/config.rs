use serde::{Deserialize, Serialize};
use std::path::Path;

/// Render themes the engine is allowed to see. Requests naming anything
/// else fall back to the default rather than erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Default,
    Dark,
    Neutral,
    Forest,
    Base,
}

impl Theme {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Self::Default),
            "dark" => Some(Self::Dark),
            "neutral" => Some(Self::Neutral),
            "forest" => Some(Self::Forest),
            "base" => Some(Self::Base),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Dark => "dark",
            Self::Neutral => "neutral",
            Self::Forest => "forest",
            Self::Base => "base",
        }
    }
}

/// External command the sidecar delegates rendering to.
#[derive(Debug, Clone)]
pub struct EngineCommand {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub theme: Theme,
    pub engine: Option<EngineCommand>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    engine: Option<String>,
    engine_args: Option<Vec<String>>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<ServiceConfig> {
    let mut config = ServiceConfig::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = serde_json::from_str(&contents)?;

    if let Some(theme) = parsed.theme.as_deref() {
        config.theme = Theme::parse(theme).unwrap_or_default();
    }
    if let Some(program) = parsed.engine {
        config.engine = Some(EngineCommand {
            program,
            args: parsed.engine_args.unwrap_or_default(),
        });
    }

    Ok(config)
}
