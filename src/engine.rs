use crate::config::Theme;
use crate::dom::Document;
use serde::Serialize;
use std::io::Write;
use std::process::{Command, Stdio};
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors crossing the engine boundary. Render messages travel to the
/// caller verbatim (truncated by the protocol layer), so they carry no
/// prefix of their own.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine initialization failed: {0}")]
    Initialization(String),

    #[error("{0}")]
    Render(String),

    #[error("Engine io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration handed to the engine on startup and on every theme
/// switch. Serialized camelCase, the shape the rendering library expects.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub theme: Theme,
    pub flowchart: UseMaxWidth,
    pub sequence: UseMaxWidth,
    pub security_level: String,
    pub start_on_load: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UseMaxWidth {
    pub use_max_width: bool,
}

impl EngineConfig {
    pub fn for_theme(theme: Theme) -> Self {
        Self {
            theme,
            flowchart: UseMaxWidth { use_max_width: true },
            sequence: UseMaxWidth { use_max_width: true },
            security_level: "strict".to_string(),
            start_on_load: false,
        }
    }
}

/// The rendering library boundary: diagram code in, SVG markup out, or an
/// error. The synthetic document is passed so in-process engines can
/// measure through the installed hooks; out-of-process engines are free to
/// ignore it.
pub trait DiagramEngine {
    fn initialize(&mut self, config: &EngineConfig) -> EngineResult<()>;

    fn render(&mut self, document: &mut Document, id: &str, code: &str) -> EngineResult<String>;
}

/// Engine backed by an external render command: diagram code on the
/// child's stdin, SVG expected on stdout, stderr becomes the error
/// message. The active configuration rides along in `MMDS_CONFIG` and the
/// block id as the trailing argument.
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
    config: Option<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            config: None,
        }
    }
}

impl DiagramEngine for CommandEngine {
    fn initialize(&mut self, config: &EngineConfig) -> EngineResult<()> {
        let serialized = serde_json::to_string(config)
            .map_err(|err| EngineError::Initialization(err.to_string()))?;
        self.config = Some(serialized);
        Ok(())
    }

    fn render(&mut self, _document: &mut Document, id: &str, code: &str) -> EngineResult<String> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(config) = &self.config {
            command.env("MMDS_CONFIG", config);
        }

        let mut child = command.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(code.as_bytes())?;
        }
        let output = child.wait_with_output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.trim();
            if message.is_empty() {
                return Err(EngineError::Render(format!(
                    "render command exited with {}",
                    output.status
                )));
            }
            return Err(EngineError::Render(message.to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
