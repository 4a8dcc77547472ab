// cli.rs - Command-line interface configuration
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ViewerConfig;
use crate::types::{ArtStyle, ModelFormat};

#[derive(Parser, Debug, Clone)]
#[command(name = "mesh-viewer")]
#[command(about = "Interactive viewer for generated 3D models", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// JSON config file; flags given here take precedence
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the generation API
    #[arg(long, global = true)]
    pub api_base: Option<String>,

    /// Milliseconds between status queries
    #[arg(long, global = true)]
    pub interval_ms: Option<u64>,

    /// Status queries before giving up
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Load and frame the model without opening a window
    #[arg(long = "no-window", global = true, default_value = "false")]
    pub no_window: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Display a model from a URL or local path
    View {
        url: String,
        /// glb, gltf, obj, fbx or usdz; guessed from the URL when omitted
        #[arg(long)]
        format: Option<String>,
    },
    /// Wait for a generation task, then display its model
    Poll { task_id: String },
    /// Submit a prompt, wait for the task, then display its model
    Generate {
        prompt: String,
        #[arg(long, default_value = "realistic")]
        style: String,
        #[arg(long, default_value = "glb")]
        format: String,
    },
}

impl Cli {
    /// Overlay the flags that were given onto `config`
    pub fn apply(&self, config: &mut ViewerConfig) {
        if let Some(api_base) = &self.api_base {
            config.http.api_base = api_base.clone();
        }
        if let Some(interval_ms) = self.interval_ms {
            config.poll.interval_ms = interval_ms;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.poll.max_attempts = max_attempts;
        }
    }
}

impl Command {
    /// Format requested on the command line, if any
    pub fn format(&self) -> Option<ModelFormat> {
        match self {
            Command::View { format, .. } => format.as_deref().map(ModelFormat::from_tag_or_default),
            Command::Generate { format, .. } => Some(ModelFormat::from_tag_or_default(format)),
            Command::Poll { .. } => None,
        }
    }

    pub fn style(&self) -> ArtStyle {
        match self {
            Command::Generate { style, .. } => ArtStyle::from_tag_or_default(style),
            _ => ArtStyle::default(),
        }
    }
}
