use clap::Parser;
use xmlrpc_probe::config::cli::{Command, OutputFormat, SuiteArgs};
use xmlrpc_probe::config::toml_config::SuiteConfig;
use xmlrpc_probe::core::suite::ProbeResult;
use xmlrpc_probe::core::Probe;
use xmlrpc_probe::utils::{logger, validation::Validate};
use xmlrpc_probe::{
    CliConfig, DisconnectProbe, DisconnectSettings, ProbeEngine, ProbeError, ProbeReport,
    ProbeSuite, StallProbe, StallSettings, StressProbe, StressSettings,
};

const EXIT_PROBE_FAILED: i32 = 4;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::debug!("CLI config: {:?}", config);

    let passed = match run(&config).await {
        Ok(passed) => passed,
        Err(e) => exit_with_error(e),
    };

    if let Some(code) = outcome_exit_code(passed, config.strict) {
        std::process::exit(code);
    }

    Ok(())
}

/// 探測跑完但未通過時，只有 --strict 才改變退出碼
fn outcome_exit_code(passed: bool, strict: bool) -> Option<i32> {
    if strict && !passed {
        Some(EXIT_PROBE_FAILED)
    } else {
        None
    }
}

async fn run(config: &CliConfig) -> xmlrpc_probe::Result<bool> {
    match config.command.clone() {
        Command::Disconnect(args) => {
            let settings = DisconnectSettings::from(args);
            settings.validate()?;
            run_single(DisconnectProbe::new("disconnect", settings), config.output).await
        }
        Command::Stall(args) => {
            let settings = StallSettings::from(args);
            settings.validate()?;
            run_single(StallProbe::new("stall", settings)?, config.output).await
        }
        Command::Stress(args) => {
            let settings = StressSettings::from(args);
            settings.validate()?;
            run_single(StressProbe::new("stress", settings)?, config.output).await
        }
        Command::Suite(args) => run_suite(&args, config.output).await,
    }
}

async fn run_single<P: Probe>(probe: P, output: OutputFormat) -> xmlrpc_probe::Result<bool> {
    let engine = ProbeEngine::new(probe);
    let report = engine.run().await?;
    print_report(&report, output)?;
    Ok(report.passed())
}

async fn run_suite(args: &SuiteArgs, output: OutputFormat) -> xmlrpc_probe::Result<bool> {
    tracing::info!("📁 Loading suite from: {}", args.config.display());
    let mut suite_config = SuiteConfig::from_file(&args.config)?;

    // 應用命令列覆蓋設定
    if let Some(stop) = args.stop_on_failure {
        suite_config.suite.stop_on_failure = Some(stop);
        tracing::info!("🔧 stop_on_failure overridden to: {}", stop);
    }

    suite_config.validate()?;
    tracing::info!("✅ Suite '{}' loaded and validated", suite_config.suite.name);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - no probe will touch the network");
        for probe in suite_config.ordered_probes()? {
            println!("  - {} ({})", probe.name, probe.kind_name());
        }
        return Ok(true);
    }

    let suite = ProbeSuite::from_config(&suite_config)?;
    let results = suite.execute_all().await?;
    print_suite(&results, output)?;

    Ok(results.iter().all(ProbeResult::passed))
}

fn print_report(report: &ProbeReport, output: OutputFormat) -> xmlrpc_probe::Result<()> {
    match output {
        OutputFormat::Text => println!("{}", report.summary_line()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

fn print_suite(results: &[ProbeResult], output: OutputFormat) -> xmlrpc_probe::Result<()> {
    let summary = ProbeSuite::get_execution_summary(results);
    match output {
        OutputFormat::Text => {
            for result in results {
                match (&result.report, &result.error) {
                    (Some(report), _) => println!("{}: {}", result.probe_name, report.summary_line()),
                    (None, Some(error)) => println!("{}: error: {}", result.probe_name, error),
                    (None, None) => println!("{}: no result", result.probe_name),
                }
            }
            println!(
                "📈 {} probes, {} passed, {} failed",
                summary["total_probes"], summary["passed"], summary["failed"]
            );
        }
        OutputFormat::Json => {
            let reports: Vec<serde_json::Value> = results
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "name": r.probe_name,
                        "report": r.report,
                        "error": r.error,
                        "duration_ms": r.duration.as_millis() as u64,
                    })
                })
                .collect();
            let document = serde_json::json!({ "summary": summary, "probes": reports });
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
    }
    Ok(())
}

fn exit_with_error(e: ProbeError) -> ! {
    tracing::error!(
        "❌ Probe run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    std::process::exit(e.exit_code())
}
