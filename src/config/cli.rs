use crate::config::ApiOverrides;
use crate::core::extraction::DEFAULT_SCRIPT_FILE;
use crate::domain::model::{DEFAULT_ASPECT_RATIO, DEFAULT_STYLE};
use crate::domain::prompts::DEFAULT_IMAGE_PROMPT;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "imagegen-probe")]
#[command(about = "Probe an OpenRouter-compatible chat/image-generation API")]
pub struct CliConfig {
    /// Optional TOML file with defaults for endpoints, models, timeouts and output
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for responses and images [default: test/out]
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Fixed pause between sequential generation calls [default: 2]
    #[arg(long, global = true)]
    pub pause_secs: Option<u64>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

/// 每個子命令共用的 API 覆寫參數
#[derive(Debug, Clone, Default, Args)]
pub struct ApiArgs {
    /// Chat-completions endpoint URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Model id
    #[arg(long)]
    pub model: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl From<&ApiArgs> for ApiOverrides {
    fn from(args: &ApiArgs) -> Self {
        ApiOverrides {
            base_url: args.base_url.clone(),
            model: args.model.clone(),
            timeout_secs: args.timeout,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Check connectivity with a short text completion (OPENROUTER_* variables)
    Ping {
        #[command(flatten)]
        api: ApiArgs,
    },

    /// Generate one image from a text prompt (NANOBANANA_* variables)
    Generate {
        #[arg(long, default_value = DEFAULT_IMAGE_PROMPT)]
        prompt: String,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// Generate one reference image per storyboard character
    References {
        /// Storyboard script (TOML); the built-in script is used when omitted
        #[arg(long)]
        script: Option<PathBuf>,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// Generate storyboard frames from the saved reference images
    Storyboard {
        /// Storyboard script (TOML); the built-in script is used when omitted
        #[arg(long)]
        script: Option<PathBuf>,

        /// Generate the reference images first
        #[arg(long)]
        with_references: bool,

        /// One request per frame instead of a single batch request
        #[arg(long)]
        per_frame: bool,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// Split a screenplay into characters and frames, written as a storyboard script (OPENROUTER_* variables)
    Extract {
        /// Screenplay text file
        #[arg(long)]
        screenplay: PathBuf,

        /// Script file name under the output directory
        #[arg(long, default_value = DEFAULT_SCRIPT_FILE)]
        out_script: String,

        #[arg(long, default_value = DEFAULT_STYLE)]
        style: String,

        #[arg(long, default_value = DEFAULT_ASPECT_RATIO)]
        aspect_ratio: String,

        #[command(flatten)]
        api: ApiArgs,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        CliConfig::command().debug_assert();
    }

    #[test]
    fn test_parse_storyboard_flags() {
        let cli = CliConfig::parse_from([
            "imagegen-probe",
            "storyboard",
            "--with-references",
            "--per-frame",
            "--model",
            "x/y",
            "--output-dir",
            "renders",
        ]);

        assert_eq!(cli.output_dir, Some(PathBuf::from("renders")));
        match cli.command {
            Command::Storyboard {
                with_references,
                per_frame,
                api,
                script,
            } => {
                assert!(with_references);
                assert!(per_frame);
                assert!(script.is_none());
                assert_eq!(api.model.as_deref(), Some("x/y"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_generate_default_prompt() {
        let cli = CliConfig::parse_from(["imagegen-probe", "generate"]);
        match cli.command {
            Command::Generate { prompt, .. } => assert_eq!(prompt, DEFAULT_IMAGE_PROMPT),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_extract_defaults() {
        let cli = CliConfig::parse_from(["imagegen-probe", "extract", "--screenplay", "play.txt"]);
        match cli.command {
            Command::Extract {
                screenplay,
                out_script,
                style,
                aspect_ratio,
                ..
            } => {
                assert_eq!(screenplay, PathBuf::from("play.txt"));
                assert_eq!(out_script, "script.toml");
                assert_eq!(style, "写实摄影");
                assert_eq!(aspect_ratio, "16:9");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
