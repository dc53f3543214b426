//! Solidity compilation through `solc --standard-json`.

use alloy::hex;
use alloy::json_abi::JsonAbi;
use alloy::primitives::Bytes;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::instrument;

use crate::config::CompilerConfig;
use crate::error::EngineError;

/// One contract produced by compiling a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledContract {
    pub name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

#[async_trait]
pub trait Compiler: Send + Sync {
    /// Compile `source`, returning its contracts in compiler output order.
    async fn compile(&self, file_name: &str, source: &str) -> Result<Vec<CompiledContract>, EngineError>;
}

pub struct SolcCompiler {
    config: CompilerConfig,
}

impl SolcCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    fn standard_input(&self, file_name: &str, source: &str) -> Value {
        json!({
            "language": "Solidity",
            "sources": { file_name: { "content": source } },
            "settings": {
                "evmVersion": self.config.evm_version,
                "optimizer": {
                    "enabled": self.config.optimizer_enabled,
                    "runs": self.config.optimizer_runs,
                },
                "outputSelection": { "*": { "*": ["abi", "evm.bytecode.object"] } }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct SolcOutput {
    #[serde(default)]
    errors: Vec<SolcDiagnostic>,
    #[serde(default)]
    contracts: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolcDiagnostic {
    severity: String,
    #[serde(default)]
    formatted_message: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct SolcArtifact {
    abi: JsonAbi,
    evm: SolcEvm,
}

#[derive(Debug, Deserialize)]
struct SolcEvm {
    bytecode: SolcBytecode,
}

#[derive(Debug, Deserialize)]
struct SolcBytecode {
    object: String,
}

/// Turn `solc` standard-json output into artifacts for `file_name`.
pub fn parse_output(file_name: &str, raw: &str) -> Result<Vec<CompiledContract>, EngineError> {
    let output: SolcOutput = serde_json::from_str(raw)
        .map_err(|e| EngineError::Compilation(format!("unreadable compiler output: {e}")))?;

    let errors: Vec<_> = output
        .errors
        .iter()
        .filter(|diagnostic| diagnostic.severity == "error")
        .map(|diagnostic| {
            diagnostic
                .formatted_message
                .clone()
                .unwrap_or_else(|| diagnostic.message.clone())
        })
        .collect();
    if !errors.is_empty() {
        return Err(EngineError::Compilation(errors.join("\n")));
    }

    let Some(Value::Object(contracts)) = output.contracts.get(file_name) else {
        return Err(EngineError::Compilation(format!(
            "no contracts produced for {file_name}"
        )));
    };

    let mut compiled = Vec::with_capacity(contracts.len());
    for (name, artifact) in contracts {
        let artifact: SolcArtifact = serde_json::from_value(artifact.clone())
            .map_err(|e| EngineError::Compilation(format!("malformed artifact for {name}: {e}")))?;
        let bytecode = hex::decode(artifact.evm.bytecode.object.trim_start_matches("0x"))
            .map_err(|e| EngineError::Compilation(format!("invalid bytecode for {name}: {e}")))?;
        compiled.push(CompiledContract {
            name: name.clone(),
            abi: artifact.abi,
            bytecode: bytecode.into(),
        });
    }
    Ok(compiled)
}

#[async_trait]
impl Compiler for SolcCompiler {
    #[instrument(skip_all, fields(file = %file_name))]
    async fn compile(&self, file_name: &str, source: &str) -> Result<Vec<CompiledContract>, EngineError> {
        let input = serde_json::to_vec(&self.standard_input(file_name, source))
            .map_err(|e| EngineError::Compilation(e.to_string()))?;

        let mut child = Command::new(&self.config.solc_path)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EngineError::Compilation(format!(
                    "could not start {}: {e}",
                    self.config.solc_path.display()
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&input)
                .await
                .map_err(|e| EngineError::Compilation(e.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| EngineError::Compilation(e.to_string()))?;
        if !output.status.success() && output.stdout.is_empty() {
            return Err(EngineError::Compilation(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let contracts = parse_output(file_name, &String::from_utf8_lossy(&output.stdout))?;
        tracing::info!(count = contracts.len(), "Compiled");
        Ok(contracts)
    }
}
