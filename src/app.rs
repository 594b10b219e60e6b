use crate::cli::{Cli, Commands, SettingsOverrides};
use anyhow::{Context, Result};
use avcbatch::config::Config;
use avcbatch::engine::{
    self, BatchScheduler, ConversionSettings, EncoderCapabilityProber, JobOutcome, JobRunner,
    MediaProbe, NullSink, SystemTools, ToolRunner, TracingSink,
};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread;

pub fn run(cli: Cli) {
    let result = match cli.command {
        Commands::CheckFfmpeg => handle_check_ffmpeg(),
        Commands::Encoders => handle_encoders(),
        Commands::Probe { ref file } => handle_probe(file, &cli.overrides),
        Commands::DryRun { ref paths } => handle_dry_run(paths, &cli.overrides),
        Commands::Convert { ref paths } => handle_convert(paths, &cli.overrides, cli.debug_log),
        Commands::InitConfig => handle_init_config(),
        Commands::ResetConfig => handle_reset_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn system_tools() -> Arc<dyn ToolRunner> {
    Arc::new(SystemTools::default())
}

/// Config file values with command line overrides applied
fn load_settings(overrides: &SettingsOverrides) -> Result<ConversionSettings> {
    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Config missing or invalid, using defaults: {:#}", e);
        Config::default()
    });
    let mut settings = config.to_settings().context("Invalid configuration")?;
    overrides.apply(&mut settings);
    Ok(settings)
}

fn handle_check_ffmpeg() -> Result<()> {
    let tools = SystemTools::default();
    let version = engine::ffmpeg_version(&tools)?;
    println!("ffmpeg found: {}", version);
    let probe_version = engine::ffprobe_version(&tools)?;
    println!("ffprobe found: {}", probe_version);
    Ok(())
}

fn handle_encoders() -> Result<()> {
    let tools = system_tools();
    if !engine::ffmpeg_available(tools.as_ref()) {
        anyhow::bail!("ffmpeg not found; only checked PATH");
    }

    println!("Testing encoders (this may take a few seconds)...");
    let prober = EncoderCapabilityProber::new(tools, Arc::new(TracingSink));
    for descriptor in prober.probe() {
        println!("  {}", descriptor);
    }
    Ok(())
}

fn handle_probe(file: &Path, overrides: &SettingsOverrides) -> Result<()> {
    let settings = load_settings(overrides)?;
    let info = MediaProbe::new(system_tools()).try_probe(file)?;

    println!("File:       {}", file.display());
    println!("Codec:      {}", info.codec);
    println!("Resolution: {}x{}", info.width, info.height);
    println!("Pixel fmt:  {}", info.pix_fmt);
    println!("Bit depth:  {}", info.effective_bit_depth());
    match info.duration {
        Some(secs) => println!("Duration:   {:.2}s", secs),
        None => println!("Duration:   unknown"),
    }

    let choice = engine::select_profile(&info, settings.profile, settings.color_depth);
    match choice.describe(settings.profile, &info) {
        Some(message) => println!("Profile:    {} ({})", choice.profile, message),
        None => println!("Profile:    {}", choice.profile),
    }
    Ok(())
}

fn handle_dry_run(paths: &[PathBuf], overrides: &SettingsOverrides) -> Result<()> {
    let settings = load_settings(overrides)?;
    let inputs = engine::collect_inputs(paths).context("Error scanning inputs")?;
    if inputs.is_empty() {
        println!("No video files found");
        return Ok(());
    }

    let runner = JobRunner::new(system_tools(), Arc::new(NullSink), Arc::new(NullSink));
    for job in engine::build_jobs(inputs, &settings) {
        if !settings.overwrite && job.output_path.exists() {
            println!("# skip {} (output exists)", job.file_name());
            continue;
        }
        let plan = runner.plan(&job, &settings);
        println!("{}", engine::format_command("ffmpeg", &plan.args));
    }
    Ok(())
}

fn handle_convert(paths: &[PathBuf], overrides: &SettingsOverrides, debug_log: bool) -> Result<()> {
    let settings = load_settings(overrides)?;
    let inputs = engine::collect_inputs(paths).context("Error scanning inputs")?;
    if inputs.is_empty() {
        println!("No video files found");
        return Ok(());
    }
    let jobs = engine::build_jobs(inputs, &settings);

    let sink = Arc::new(TracingSink);
    let scheduler = Arc::new(
        BatchScheduler::new(system_tools(), sink.clone(), sink).with_debug_log(debug_log),
    );

    // Stop after the current file when the user types `q`
    let state = scheduler.state();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines().map_while(|line| line.ok()) {
            if line.trim().eq_ignore_ascii_case("q") {
                state.request_stop();
                println!("Stopping after the current file...");
                break;
            }
        }
    });

    let handle = scheduler
        .spawn(jobs, settings)
        .context("Failed to start worker thread")?;
    let result = handle
        .join()
        .map_err(|_| anyhow::anyhow!("Worker thread panicked"))?;

    println!(
        "{} succeeded, {} failed, {} skipped",
        result.succeeded,
        result.failed(),
        result.skipped()
    );
    for job in result.jobs.iter().filter(|j| j.outcome == JobOutcome::Failed) {
        println!("  failed: {}", job.input_path.display());
    }

    if result.failed() > 0 {
        process::exit(1);
    }
    Ok(())
}

fn handle_init_config() -> Result<()> {
    let path = Config::config_path()?;
    if Config::exists() {
        let cfg = Config::load_from(&path)?;
        println!("Config loaded successfully from {}", path.display());
        println!("{:#?}", cfg);
    } else {
        Config::ensure_default()?;
        println!("Default config saved to {}", path.display());
    }
    Ok(())
}

fn handle_reset_config() -> Result<()> {
    Config::reset()?;
    println!(
        "Config reset to defaults at {}",
        Config::config_path()?.display()
    );
    Ok(())
}
