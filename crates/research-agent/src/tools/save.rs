use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use research_agent_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// The file written when the model doesn't name one.
pub const DEFAULT_FILENAME: &str = "research_output.txt";

static TEMP_FILE_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Deserialize, JsonSchema)]
pub struct SaveParameters {
    #[schemars(description = "The research content to save.")]
    content: String,
    #[schemars(
        description = "The name of the file to save to, default to \
                       `research_output.txt`."
    )]
    #[serde(default)]
    filename: Option<String>,
}

/// A tool for saving research content to a text file.
///
/// The file is replaced atomically: readers see either the old content or
/// the new one, never a partially written file.
pub struct SaveTool {
    parameter_schema: Value,
    output_dir: PathBuf,
}

impl SaveTool {
    /// Creates a new save tool, writing relative paths into the current
    /// directory.
    #[inline]
    pub fn new() -> Self {
        SaveTool {
            parameter_schema: schema_for!(SaveParameters).to_value(),
            output_dir: PathBuf::from("."),
        }
    }

    /// Sets the directory that relative file names resolve against.
    #[inline]
    pub fn with_output_dir<P: Into<PathBuf>>(mut self, output_dir: P) -> Self {
        self.output_dir = output_dir.into();
        self
    }
}

impl Default for SaveTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for SaveTool {
    type Input = SaveParameters;

    fn name(&self) -> &str {
        "save_tool"
    }

    fn description(&self) -> &str {
        r#"
Save research content to a text file, replacing the file if it exists.
Use this tool to save the final research paper or store findings when the user asks for it."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: SaveParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let filename = input
            .filename
            .filter(|filename| !filename.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILENAME.to_owned());
        let path = self.output_dir.join(&filename);
        let content = input.content;
        async move {
            let written = write_atomically(&path, content.as_bytes()).await;
            if let Err(err) = written {
                warn!("failed to save {}: {err}", path.display());
                return Err(ToolError::execution_error().with_reason(format!(
                    "failed to save '{filename}': {err}"
                )));
            }
            info!("saved {} bytes to {}", content.len(), path.display());
            Ok(format!("Research successfully saved to '{filename}'"))
        }
    }
}

/// Writes `content` to a sibling temporary file, syncs it and renames it
/// over `path`.
async fn write_atomically(path: &Path, content: &[u8]) -> io::Result<()> {
    let Some(file_name) = path.file_name() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "path doesn't name a file",
        ));
    };
    let seq = TEMP_FILE_SEQ.fetch_add(1, Ordering::Relaxed);
    let temp_path = path.with_file_name(format!(
        ".{}.{}-{seq}.tmp",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    let result = async {
        write_and_sync(&temp_path, content).await?;
        fs::rename(&temp_path, path).await
    }
    .await;
    if result.is_err() {
        fs::remove_file(&temp_path).await.ok();
    }
    result
}

async fn write_and_sync(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(content).await?;
    file.sync_all().await
}
