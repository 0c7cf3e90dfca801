//! Local invocation of the trusted DCAP/measurement CLI. Inputs are written
//! to tempfiles rather than piped through argv (quote blobs can exceed
//! comfortable argv limits) and the tempfiles are always removed, success or
//! failure, because `tempfile::NamedTempFile` deletes on drop.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io::Write;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tv_types::VmConfig;

#[derive(Debug, Error)]
pub enum ToolExecError {
    #[error("failed to write tool input: {0}")]
    Io(#[from] std::io::Error),
    #[error("tool exited with status {0}: {1}")]
    NonZeroExit(i32, String),
    #[error("tool output failed schema validation: {0}")]
    InvalidOutput(String),
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MeasureImagesRequest {
    pub image_dir: String,
    pub vm_config: VmConfig,
    /// Legacy images are measured from `metadata.json` alone; `vm_config` is
    /// carried for schema uniformity but ignored by the legacy tool path
    /// (spec §4.3 "OS verification").
    pub legacy: bool,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MeasuredRegisters {
    pub mrtd: String,
    pub rtmr0: String,
    pub rtmr1: String,
    pub rtmr2: String,
    pub rtmr3: String,
}

/// The three measurement-tool subcommands the verifier chain needs (spec
/// §4.1 "tool exec").
#[async_trait]
pub trait ToolExec: Send + Sync {
    async fn verify_quote(&self, quote_hex: &str) -> Result<Value, ToolExecError>;
    async fn decode_quote(&self, quote_hex: &str) -> Result<Value, ToolExecError>;
    async fn measure_images(&self, request: MeasureImagesRequest) -> Result<MeasuredRegisters, ToolExecError>;
}

pub struct LocalToolExec {
    binary_path: String,
}

impl LocalToolExec {
    pub fn new(binary_path: impl Into<String>) -> Self {
        LocalToolExec { binary_path: binary_path.into() }
    }

    fn write_input_file(&self, contents: &[u8]) -> Result<tempfile::NamedTempFile, ToolExecError> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(contents)?;
        file.flush()?;
        Ok(file)
    }

    async fn run(&self, subcommand: &str, input_path: &std::path::Path) -> Result<String, ToolExecError> {
        let output = Command::new(&self.binary_path)
            .arg(subcommand)
            .arg(input_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(ToolExecError::NonZeroExit(
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, ToolExecError> {
        serde_json::from_str(raw).map_err(|e| ToolExecError::InvalidOutput(e.to_string()))
    }
}

#[async_trait]
impl ToolExec for LocalToolExec {
    async fn verify_quote(&self, quote_hex: &str) -> Result<Value, ToolExecError> {
        let input = self.write_input_file(quote_hex.as_bytes())?;
        let raw = self.run("verify-quote", input.path()).await?;
        Self::parse_json(&raw)
    }

    async fn decode_quote(&self, quote_hex: &str) -> Result<Value, ToolExecError> {
        let input = self.write_input_file(quote_hex.as_bytes())?;
        let raw = self.run("decode-quote", input.path()).await?;
        Self::parse_json(&raw)
    }

    async fn measure_images(&self, request: MeasureImagesRequest) -> Result<MeasuredRegisters, ToolExecError> {
        let payload = serde_json::to_vec(&request)?;
        let input = self.write_input_file(&payload)?;
        let raw = self.run("measure-images", input.path()).await?;
        Self::parse_json(&raw)
    }
}

impl From<serde_json::Error> for ToolExecError {
    fn from(e: serde_json::Error) -> Self {
        ToolExecError::InvalidOutput(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_surfaces_as_io_error() {
        let tool = LocalToolExec::new("/nonexistent/tee-tool-binary");
        let result = tool.verify_quote("0xaa").await;
        assert!(matches!(result, Err(ToolExecError::Io(_))));
    }

    #[test]
    fn write_input_file_round_trips_contents() {
        let tool = LocalToolExec::new("/bin/true");
        let file = tool.write_input_file(b"hello").unwrap();
        let read_back = std::fs::read(file.path()).unwrap();
        assert_eq!(read_back, b"hello");
    }
}
