//! CLI for NanoBanana - Gemini 3 Pro Image generation.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use nanobanana::report::{failure_report, success_report};
use nanobanana::{
    AspectRatio, ChangeToken, ImageTensor, NanoBananaNode, NodeInputs, NodeSchema, NodeSettings,
    Resolution,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nanobanana")]
#[command(about = "Generate images with NanoBanana Pro (Gemini 3 Pro Image)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an image from a prompt and optional reference images
    Generate(GenerateArgs),

    /// Print the node parameter schema
    Schema,

    /// Print the change-detection value for a seed
    Changed {
        /// Seed (0 forces re-execution)
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the image
    prompt: String,

    /// Output file path (format from extension)
    #[arg(short, long)]
    output: PathBuf,

    /// Reference images, highest priority first (all must share dimensions)
    #[arg(short, long = "image")]
    images: Vec<PathBuf>,

    /// Aspect ratio
    #[arg(long, value_enum, default_value = "auto")]
    aspect_ratio: AspectRatioArg,

    /// Output resolution tier
    #[arg(short, long, value_enum, default_value = "2K")]
    resolution: ResolutionArg,

    /// Seed (informational; 0 means always regenerate)
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// API key; falls back to NANOBANANA_API_KEY, then the saved key file
    #[arg(long)]
    api_key: Option<String>,

    /// Key file location
    #[arg(long)]
    key_file: Option<PathBuf>,

    /// Full generateContent endpoint URL
    #[arg(long)]
    endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AspectRatioArg {
    #[value(name = "auto")]
    Auto,
    #[value(name = "1:1")]
    Square,
    #[value(name = "16:9")]
    Landscape,
    #[value(name = "9:16")]
    Portrait,
    #[value(name = "4:3")]
    Standard,
    #[value(name = "3:4")]
    StandardPortrait,
    #[value(name = "3:2")]
    Photo,
    #[value(name = "2:3")]
    PhotoPortrait,
    #[value(name = "21:9")]
    Ultrawide,
    #[value(name = "5:4")]
    LargeFormat,
    #[value(name = "4:5")]
    LargeFormatPortrait,
}

impl From<AspectRatioArg> for AspectRatio {
    fn from(arg: AspectRatioArg) -> Self {
        match arg {
            AspectRatioArg::Auto => AspectRatio::Auto,
            AspectRatioArg::Square => AspectRatio::Square,
            AspectRatioArg::Landscape => AspectRatio::Landscape,
            AspectRatioArg::Portrait => AspectRatio::Portrait,
            AspectRatioArg::Standard => AspectRatio::Standard,
            AspectRatioArg::StandardPortrait => AspectRatio::StandardPortrait,
            AspectRatioArg::Photo => AspectRatio::Photo,
            AspectRatioArg::PhotoPortrait => AspectRatio::PhotoPortrait,
            AspectRatioArg::Ultrawide => AspectRatio::Ultrawide,
            AspectRatioArg::LargeFormat => AspectRatio::LargeFormat,
            AspectRatioArg::LargeFormatPortrait => AspectRatio::LargeFormatPortrait,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ResolutionArg {
    #[value(name = "1K")]
    OneK,
    #[value(name = "2K")]
    TwoK,
    #[value(name = "4K")]
    FourK,
}

impl From<ResolutionArg> for Resolution {
    fn from(arg: ResolutionArg) -> Self {
        match arg {
            ResolutionArg::OneK => Resolution::OneK,
            ResolutionArg::TwoK => Resolution::TwoK,
            ResolutionArg::FourK => Resolution::FourK,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nanobanana=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => {
            generate_image(args, cli.json).await?;
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&NodeSchema::describe())?);
        }
        Commands::Changed { seed } => {
            print_change_token(seed, cli.json)?;
        }
    }

    Ok(())
}

fn load_batch(paths: &[PathBuf]) -> anyhow::Result<Option<ImageTensor>> {
    if paths.is_empty() {
        return Ok(None);
    }
    let frames = paths
        .iter()
        .map(|path| {
            let image = image::open(path)
                .with_context(|| format!("failed to read image {}", path.display()))?;
            Ok(ImageTensor::from_rgb8(&image.to_rgb8()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Some(ImageTensor::stack(frames)?))
}

fn save_tensor(tensor: &ImageTensor, path: &Path) -> anyhow::Result<()> {
    let rgb = tensor
        .to_rgb8(0)
        .context("generated image has no frames")?;
    rgb.save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

async fn generate_image(args: GenerateArgs, json_output: bool) -> anyhow::Result<()> {
    let mut settings = NodeSettings::from_env();
    if let Some(endpoint) = args.endpoint {
        settings = settings.with_endpoint(endpoint);
    }
    if let Some(key_file) = args.key_file {
        settings = settings.with_key_file(key_file);
    }
    let node = NanoBananaNode::new(settings)?;

    let api_key = args
        .api_key
        .or_else(|| std::env::var("NANOBANANA_API_KEY").ok())
        .unwrap_or_default();

    let inputs = NodeInputs {
        api_key,
        prompt: args.prompt,
        aspect_ratio: args.aspect_ratio.into(),
        resolution: args.resolution.into(),
        estimated_time: String::new(),
        seed: args.seed,
        image: load_batch(&args.images)?,
    };

    match node.execute(&inputs).await {
        Ok(success) => {
            save_tensor(&success.image, &args.output)?;
            let (_, height, width, _) = success.image.shape();

            if json_output {
                let result = serde_json::json!({
                    "success": true,
                    "output": args.output.display().to_string(),
                    "width": width,
                    "height": height,
                    "log": success.log.lines(),
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", success_report(&success.log));
                println!(
                    "\nGenerated image: {} ({}x{})",
                    args.output.display(),
                    width,
                    height
                );
            }
            Ok(())
        }
        Err(failure) => {
            if json_output {
                let result = serde_json::json!({
                    "success": false,
                    "kind": format!("{:?}", failure.kind()),
                    "error": failure.error.to_string(),
                    "log": failure.log.lines(),
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", failure_report(&failure.error, &failure.log));
            }
            anyhow::bail!("generation failed: {}", failure.error)
        }
    }
}

fn print_change_token(seed: u64, json_output: bool) -> anyhow::Result<()> {
    let token = ChangeToken::for_seed(seed);
    if json_output {
        let value = match token {
            ChangeToken::Random(v) => serde_json::json!({ "random": v }),
            ChangeToken::Seed(s) => serde_json::json!({ "seed": s }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        match token {
            ChangeToken::Random(v) => println!("{v}"),
            ChangeToken::Seed(s) => println!("{s}"),
        }
    }
    Ok(())
}
