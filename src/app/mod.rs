//! 子命令到探測流程的組裝。

use crate::adapters::{http::ChatClient, storage::LocalStorage};
use crate::config::cli::{CliConfig, Command};
use crate::config::file::FileConfig;
use crate::config::script::load_script;
use crate::config::{ApiOverrides, FlowKind, ProbeSettings, DEFAULT_OUTPUT_DIR, DEFAULT_PAUSE_SECS};
use crate::core::engine::ProbeEngine;
use crate::core::extraction::{FrameSplitProbe, RoleExtractionProbe};
use crate::core::probes::{ConnectivityProbe, ImageProbe, ReferenceProbe, StoryboardMode, StoryboardProbe};
use crate::domain::model::StoryboardScript;
use crate::domain::ports::{Probe, ProbeReport};
use crate::utils::error::{ProbeError, Result};
use crate::utils::validation::{validate_non_empty_string, Validate};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub reports: Vec<ProbeReport>,
    pub output_dir: PathBuf,
}

/// 一次執行的共用設定：環境變數查詢、設定檔、輸出目錄、間隔
pub struct RunContext<F> {
    lookup: F,
    file: Option<FileConfig>,
    output_dir: PathBuf,
    pause: Duration,
}

impl<F> RunContext<F>
where
    F: Fn(&str) -> Option<String>,
{
    pub fn new(cli: &CliConfig, lookup: F) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                let file = FileConfig::from_file(path)?;
                file.validate()?;
                Some(file)
            }
            None => None,
        };

        let output_dir = cli
            .output_dir
            .clone()
            .or_else(|| file.as_ref().and_then(|f| f.output_dir()).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let pause_secs = cli
            .pause_secs
            .or_else(|| file.as_ref().and_then(|f| f.pause_secs()))
            .unwrap_or(DEFAULT_PAUSE_SECS);

        Ok(Self {
            lookup,
            file,
            output_dir,
            pause: Duration::from_secs(pause_secs),
        })
    }

    fn settings(&self, flow: FlowKind, overrides: &ApiOverrides) -> Result<ProbeSettings> {
        ProbeSettings::resolve_with(flow, &self.lookup, self.file.as_ref(), overrides)
    }

    fn storage(&self) -> LocalStorage {
        LocalStorage::new(self.output_dir.clone())
    }

    fn engine<P: Probe>(&self, probe: P, settings: &ProbeSettings) -> ProbeEngine<P> {
        let client = ChatClient::new(settings).with_preview_chars(settings.flow.body_preview_chars());
        ProbeEngine::new(probe, client).with_pause(self.pause)
    }

    async fn execute<P: Probe>(&self, probe: P, settings: &ProbeSettings) -> Result<ProbeReport> {
        self.engine(probe, settings).run().await
    }

    async fn pause_between_flows(&self) {
        if !self.pause.is_zero() {
            tokio::time::sleep(self.pause).await;
        }
    }
}

fn read_screenplay(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ProbeError::MissingPrecondition {
            path: path.display().to_string(),
        },
        _ => ProbeError::IoError(e),
    })?;
    validate_non_empty_string("screenplay", &text)?;
    Ok(text)
}

pub async fn run(cli: &CliConfig) -> Result<RunSummary> {
    run_with(cli, |name| std::env::var(name).ok()).await
}

/// 所有設定（含 API key）都在第一個請求之前解析完成
pub async fn run_with<F>(cli: &CliConfig, lookup: F) -> Result<RunSummary>
where
    F: Fn(&str) -> Option<String>,
{
    let ctx = RunContext::new(cli, lookup)?;
    tracing::debug!("Output directory: {}", ctx.output_dir.display());

    let mut reports = Vec::new();
    match &cli.command {
        Command::Ping { api } => {
            let settings = ctx.settings(FlowKind::Connectivity, &ApiOverrides::from(api))?;
            let probe = ConnectivityProbe::new(settings.model_id.clone());
            reports.push(ctx.execute(probe, &settings).await?);
        }
        Command::Generate { prompt, api } => {
            let settings = ctx.settings(FlowKind::Image, &ApiOverrides::from(api))?;
            let probe = ImageProbe::new(settings.model_id.clone(), prompt.clone(), ctx.storage());
            reports.push(ctx.execute(probe, &settings).await?);
        }
        Command::References { script, api } => {
            let settings = ctx.settings(FlowKind::Reference, &ApiOverrides::from(api))?;
            let script = load_script(script.as_deref())?;
            let probe = ReferenceProbe::new(settings.model_id.clone(), script, ctx.storage());
            reports.push(ctx.execute(probe, &settings).await?);
        }
        Command::Storyboard {
            script,
            with_references,
            per_frame,
            api,
        } => {
            let overrides = ApiOverrides::from(api);
            let storyboard_settings = ctx.settings(FlowKind::Storyboard, &overrides)?;
            let reference_settings = if *with_references {
                Some(ctx.settings(FlowKind::Reference, &overrides)?)
            } else {
                None
            };
            let script = load_script(script.as_deref())?;

            if let Some(settings) = reference_settings {
                let probe = ReferenceProbe::new(settings.model_id.clone(), script.clone(), ctx.storage());
                reports.push(ctx.execute(probe, &settings).await?);
                ctx.pause_between_flows().await;
            }

            let mode = if *per_frame {
                StoryboardMode::PerFrame
            } else {
                StoryboardMode::Batch
            };
            let probe = StoryboardProbe::new(storyboard_settings.model_id.clone(), script, ctx.storage())
                .with_mode(mode);
            reports.push(ctx.execute(probe, &storyboard_settings).await?);
        }
        Command::Extract {
            screenplay,
            out_script,
            style,
            aspect_ratio,
            api,
        } => {
            let settings = ctx.settings(FlowKind::Extraction, &ApiOverrides::from(api))?;
            validate_non_empty_string("out_script", out_script)?;
            let screenplay = read_screenplay(screenplay)?;

            // 角色清單決定分鏡請求中的可用角色
            let role_probe = RoleExtractionProbe::new(settings.model_id.clone(), screenplay.clone());
            let roles = ctx.engine(role_probe, &settings);
            reports.push(roles.run().await?);
            let characters = roles.probe().roles().await;
            ctx.pause_between_flows().await;

            let template = StoryboardScript {
                style: style.clone(),
                aspect_ratio: aspect_ratio.clone(),
                atmosphere: None,
                characters,
                frames: Vec::new(),
            };
            let probe = FrameSplitProbe::new(settings.model_id.clone(), screenplay, template, ctx.storage())
                .with_output_file(out_script.clone());
            reports.push(ctx.execute(probe, &settings).await?);
        }
    }

    Ok(RunSummary {
        reports,
        output_dir: ctx.output_dir,
    })
}
