use std::path::{Path, PathBuf};
use std::process;

use anyhow::anyhow;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use voxlift_core::{
    CancelToken, EngineConfig, NullSink, OutputFormat, PipelineExecutor, Preset, PresetStore,
    ProcessingOptions, ProgressEvent, ProgressSink,
};

#[derive(Parser)]
#[command(name = "voxlift")]
#[command(about = "AI-assisted vocal isolation and enhancement", long_about = None)]
#[command(version)]
struct Cli {
    /// Engine configuration file (defaults to ./voxlift.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Preset store location
    #[arg(long, global = true, default_value = "presets.yaml")]
    presets: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a single audio file
    Process {
        #[arg(short, long)]
        input: PathBuf,

        /// Render only the configured preview snippet
        #[arg(long)]
        preview: bool,

        #[command(flatten)]
        chain: ChainArgs,

        /// Save the effective chain settings under this preset name
        #[arg(long)]
        save_preset: Option<String>,

        /// Show raw separator output while it runs
        #[arg(short, long)]
        verbose: bool,

        #[arg(short, long)]
        quiet: bool,
    },

    /// Apply the same settings to every audio file in a folder
    Batch {
        #[arg(short, long)]
        folder: PathBuf,

        #[command(flatten)]
        chain: ChainArgs,

        #[arg(short, long)]
        verbose: bool,

        #[arg(short, long)]
        quiet: bool,
    },

    /// List the configured separation models
    Models,

    /// List or delete saved presets
    Presets {
        #[command(subcommand)]
        action: PresetAction,
    },
}

#[derive(Subcommand)]
enum PresetAction {
    List,
    Delete { name: String },
}

#[derive(Args)]
struct ChainArgs {
    /// Start from a saved preset instead of the flags below
    #[arg(long)]
    preset: Option<String>,

    /// Disable AI vocal separation
    #[arg(long)]
    no_separation: bool,

    /// Separation model key from the configuration
    #[arg(short, long, default_value = "htdemucs")]
    model: String,

    /// Prefer the GPU for model inference
    #[arg(long)]
    gpu: bool,

    /// Remove dead air before the other effects
    #[arg(long)]
    trim: bool,

    /// Low-band EQ gain in dB
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    eq_low: f32,

    /// Mid-band EQ gain in dB
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    eq_mid: f32,

    /// High-band EQ gain in dB
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    eq_high: f32,

    /// Disable the noise gate
    #[arg(long)]
    no_gate: bool,

    /// Gate threshold in dBFS (default from the configuration)
    #[arg(long, allow_negative_numbers = true)]
    gate_threshold: Option<f32>,

    /// Disable dynamic-range compression
    #[arg(long)]
    no_compression: bool,

    /// Chunked parallel separation for long inputs
    #[arg(long)]
    parallel: bool,

    /// Keep memory low (disables the chunked strategy)
    #[arg(long)]
    low_memory: bool,

    /// Output format: wav, flac or mp3
    #[arg(long, default_value = "wav")]
    format: String,
}

impl ChainArgs {
    fn to_options(
        &self,
        config: &EngineConfig,
        store: &PresetStore,
    ) -> anyhow::Result<ProcessingOptions> {
        let format: OutputFormat = self.format.parse()?;
        let base = ProcessingOptions {
            use_separation: !self.no_separation,
            separation_model: self.model.clone(),
            use_accelerator: self.gpu,
            trim_silence: self.trim,
            use_eq: self.eq_low != 0.0 || self.eq_mid != 0.0 || self.eq_high != 0.0,
            eq_low_db: self.eq_low,
            eq_mid_db: self.eq_mid,
            eq_high_db: self.eq_high,
            use_gate: !self.no_gate,
            gate_threshold_dbfs: self
                .gate_threshold
                .unwrap_or(config.defaults.gate_threshold_dbfs),
            use_compression: !self.no_compression,
            parallel_processing: self.parallel,
            low_memory: self.low_memory,
            output_format: format,
        };

        if let Some(name) = &self.preset {
            let preset = store
                .get(name)?
                .ok_or_else(|| anyhow!("no preset named `{name}`"))?;
            Ok(preset.apply_to(&base))
        } else {
            Ok(base)
        }
    }
}

/// Renders progress events as an indicatif bar.
struct CliSink {
    bar: ProgressBar,
    verbose: bool,
}

impl CliSink {
    fn new(verbose: bool) -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );
        Self { bar, verbose }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for CliSink {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Status { message, percent } => {
                self.bar.set_message(message);
                if let Some(p) = percent {
                    self.bar.set_position(p.round() as u64);
                }
            }
            ProgressEvent::Progress(p) => self.bar.set_position(p.round() as u64),
            ProgressEvent::RawOutput(line) => {
                if self.verbose {
                    self.bar.println(line);
                }
            }
            ProgressEvent::Error(message) => self.bar.println(format!("error: {message}")),
            ProgressEvent::Success(message) => self.bar.println(message),
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let store = PresetStore::new(&cli.presets);

    match cli.command {
        Commands::Process {
            input,
            preview,
            chain,
            save_preset,
            verbose,
            quiet,
        } => {
            let options = chain.to_options(&config, &store)?;
            if let Some(name) = save_preset {
                store.save(&name, &Preset::from(&options))?;
                eprintln!("Preset `{name}` saved.");
            }

            let executor = PipelineExecutor::new(config);
            let cancel = CancelToken::new();

            let output = if quiet {
                if preview {
                    executor.run_preview(&input, &options, &NullSink, &cancel)?
                } else {
                    executor.run(&input, &options, &NullSink, &cancel)?
                }
            } else {
                let sink = CliSink::new(verbose);
                let result = if preview {
                    executor.run_preview(&input, &options, &sink, &cancel)
                } else {
                    executor.run(&input, &options, &sink, &cancel)
                };
                sink.finish();
                result?
            };

            println!("{}", output.display());
        }

        Commands::Batch {
            folder,
            chain,
            verbose,
            quiet,
        } => {
            let options = chain.to_options(&config, &store)?;
            let executor = PipelineExecutor::new(config);
            let cancel = CancelToken::new();

            let report = if quiet {
                executor.run_batch(&folder, &options, &NullSink, &cancel)?
            } else {
                let sink = CliSink::new(verbose);
                let result = executor.run_batch(&folder, &options, &sink, &cancel);
                sink.finish();
                result?
            };

            eprintln!("Batch finished: {} processed", report.processed.len());
            for (path, reason) in &report.failed {
                eprintln!("  failed: {}: {reason}", path.display());
            }
            for path in &report.processed {
                println!("{}", path.display());
            }
        }

        Commands::Models => {
            println!("Configured separation models:");
            for (key, spec) in &config.separation_models {
                println!("  {key:<16} {}", spec.display_name);
            }
        }

        Commands::Presets { action } => match action {
            PresetAction::List => {
                let names = store.names()?;
                if names.is_empty() {
                    eprintln!("No presets saved.");
                } else {
                    for name in names {
                        println!("{name}");
                    }
                }
            }
            PresetAction::Delete { name } => {
                if store.delete(&name)? {
                    eprintln!("Preset `{name}` deleted.");
                } else {
                    eprintln!("No preset named `{name}`.");
                }
            }
        },
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    if let Some(path) = path {
        return Ok(EngineConfig::load(path)?);
    }
    // Auto-detect a local config the way the desktop app ships one.
    let local = Path::new("voxlift.yaml");
    if local.exists() {
        log::info!("loading config from {}", local.display());
        return Ok(EngineConfig::load(local)?);
    }
    Ok(EngineConfig::default())
}
