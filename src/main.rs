use clap::Parser;
use imagegen_probe::app::{self, RunSummary};
use imagegen_probe::config::cli::{CliConfig, LogFormat};
use imagegen_probe::utils::logger;

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    // 初始化日誌
    match config.log_format {
        LogFormat::Compact => logger::init_cli_logger(config.verbose),
        LogFormat::Json => logger::init_json_logger(),
    }

    let run_id = format!("run_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"));
    tracing::info!("Starting imagegen-probe ({})", run_id);
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    match app::run(&config).await {
        Ok(summary) => print_summary(&summary),
        Err(e) => {
            tracing::error!(
                "❌ Probe failed: {} (Category: {:?}, exit code: {})",
                e,
                e.category(),
                e.exit_code()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            std::process::exit(e.exit_code());
        }
    }
}

fn print_summary(summary: &RunSummary) {
    let artifacts: Vec<&str> = summary.reports.iter().flat_map(|r| r.artifacts()).collect();
    if artifacts.is_empty() {
        return;
    }

    println!("\n{}", "=".repeat(60));
    println!("✅ Done!");
    println!("{}", "=".repeat(60));
    for report in &summary.reports {
        println!(
            "{}: {} step(s), {} image(s), {:.2}s",
            report.name,
            report.steps.len(),
            report.image_count(),
            report.elapsed.as_secs_f64()
        );
    }
    println!("\nGenerated files:");
    for artifact in artifacts {
        println!("  - {}", summary.output_dir.join(artifact).display());
    }
}
