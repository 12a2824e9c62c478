use clap::{Parser, Subcommand};
use renditions::config::{self, EngineConfig};
use renditions::imaging::supported_input_extensions;
use renditions::ppoi::Ppoi;
use renditions::source::SourceImage;
use renditions::warmer::{Specifiers, WarmTarget, Warmer};
use renditions::{RenditionEngine, output};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "renditions")]
#[command(about = "Resized, cropped and filtered image renditions, created on demand")]
#[command(long_about = "\
Resized, cropped and filtered image renditions, created on demand

Every rendition of a source image is addressed by a specifier and stored at
a path derived from the source name, so a rendition is generated once and
served from storage afterwards:

  url                              the source itself
  thumbnail__100x100               fit inside 100x100
  crop__400x300                    exactly 400x300, centred on the focal point
  filters__invert                  filtered at full size
  filters__invert__crop__100x100   filtered, then cropped

Renditions live next to the sources under media_root:

  media/
  ├── photos/dawn.jpg
  ├── __sized__/photos/dawn-thumbnail-100x100.jpg
  ├── __sized__/photos/dawn-crop-c0-5__0-5-400x300.jpg
  └── __filtered__/photos/dawn__invert__.jpg

Run 'renditions gen-config' to generate a documented renditions.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file (stock defaults when absent)
    #[arg(long, default_value = "renditions.toml", global = true)]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Shared flags selecting which renditions to produce.
#[derive(clap::Args, Clone)]
struct SpecifierArgs {
    /// Configured rendition key set
    #[arg(long, conflicts_with = "key")]
    key_set: Option<String>,

    /// Literal specifier, as `attr=spec` or just `spec` (repeatable)
    #[arg(long, required_unless_present = "key_set")]
    key: Vec<String>,
}

impl SpecifierArgs {
    fn specifiers(&self) -> Specifiers {
        match &self.key_set {
            Some(name) => Specifiers::KeySet(name.clone()),
            None => Specifiers::Literal(self.key.iter().map(|k| split_key_arg(k)).collect()),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Pre-generate renditions for a batch of records or every image in media_root
    Warm {
        /// JSON file with one record or an array of records
        #[arg(required_unless_present = "scan")]
        records: Option<PathBuf>,

        /// Warm every supported image under media_root instead
        #[arg(long, conflicts_with = "records")]
        scan: bool,

        /// Record field holding the image
        #[arg(long, default_value = "image")]
        attr: String,

        #[command(flatten)]
        specifiers: SpecifierArgs,
    },
    /// Print rendition URLs for one source image
    Url {
        /// Storage name of the source, relative to media_root
        source: String,

        /// Specifiers to resolve
        #[arg(required = true)]
        specs: Vec<String>,

        /// Primary point of interest, `<x>x<y>`
        #[arg(long, default_value_t = Ppoi::CENTER)]
        ppoi: Ppoi,
    },
    /// Print a key set's URLs for one source image as JSON
    Serialize {
        /// Storage name of the source, relative to media_root
        source: String,

        #[arg(long)]
        key_set: String,

        /// Primary point of interest, `<x>x<y>`
        #[arg(long, default_value_t = Ppoi::CENTER)]
        ppoi: Ppoi,
    },
    /// Validate the configuration and list key sets
    Check,
    /// Print a stock renditions.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let engine_config = config::load_config(&cli.config)?;
    let base_dir = config_dir(&cli.config);
    let engine = engine_config.build_engine(&base_dir);

    match cli.command {
        Command::Warm {
            records,
            scan,
            attr,
            specifiers,
        } => {
            let target = if scan {
                WarmTarget::Many(scan_sources(&engine_config, &base_dir))
            } else {
                let path = records.ok_or("either a records file or --scan is required")?;
                let content = std::fs::read_to_string(&path)?;
                let value: serde_json::Value = serde_json::from_str(&content)?;
                WarmTarget::from_json(&value, &attr)?
            };
            init_thread_pool(&engine_config.processing);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_warm_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = Warmer::new(&engine)
                .with_events(tx)
                .warm(&target, &specifiers.specifiers());
            printer.join().map_err(|_| "output thread panicked")?;
            let result = result?;
            output::print_warm_summary(&result);
            if !result.failures.is_empty() {
                std::process::exit(1);
            }
        }
        Command::Url {
            source,
            specs,
            ppoi,
        } => {
            let source = engine.source(source).with_ppoi(ppoi);
            let urls = specs
                .iter()
                .map(|spec| Ok((spec.clone(), engine.resolve_key(&source, spec)?.url)))
                .collect::<Result<Vec<_>, renditions::RenditionError>>()?;
            output::print_urls(&urls);
        }
        Command::Serialize {
            source,
            key_set,
            ppoi,
        } => {
            let source = engine.source(source).with_ppoi(ppoi);
            let set = engine.key_set(&key_set)?;
            let json = serialize_urls(&engine, &source, &set)?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Command::Check => {
            println!("==> Checking {}", cli.config.display());
            let registry = engine_config.key_set_registry();
            let sets = registry
                .names()
                .map(|name| registry.get(name))
                .collect::<Result<Vec<_>, _>>()?;
            output::print_check_output(&engine_config, &sets);
            println!("==> Configuration is valid");
        }
        Command::GenConfig => unreachable!("handled before loading config"),
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "renditions=info",
        _ => "renditions=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores — user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Directory a relative `media_root` is resolved against.
fn config_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// `attr=spec` → `(attr, spec)`; a bare spec is its own attribute.
fn split_key_arg(arg: &str) -> (String, String) {
    match arg.split_once('=') {
        Some((attr, spec)) => (attr.to_string(), spec.to_string()),
        None => (arg.to_string(), arg.to_string()),
    }
}

/// Every supported image under `media_root`, skipping rendition directories.
fn scan_sources(config: &EngineConfig, base_dir: &Path) -> Vec<SourceImage> {
    let root = base_dir.join(&config.media_root);
    let skip = [config.sized_dirname.as_str(), config.filtered_dirname.as_str()];
    let extensions = supported_input_extensions();

    let mut sources: Vec<SourceImage> = WalkDir::new(&root)
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            entry.depth() != 1 || !skip.iter().any(|dir| name == *dir)
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| extensions.contains(&e.to_ascii_lowercase().as_str()))
        })
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(&root).ok()?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            Some(SourceImage::new(name))
        })
        .collect();
    sources.sort_by(|a, b| a.name().cmp(&b.name()));
    sources
}

fn serialize_urls(
    engine: &RenditionEngine,
    source: &SourceImage,
    set: &renditions::keys::RenditionKeySet,
) -> Result<serde_json::Value, renditions::RenditionError> {
    let urls = engine.key_set_urls(source, set)?;
    Ok(serde_json::Value::Object(
        urls.into_iter()
            .map(|(attr, url)| (attr, serde_json::Value::String(url)))
            .collect(),
    ))
}
