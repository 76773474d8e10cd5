use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use frame_sampler::api::sampling::{FrameSampler, OutputTarget};
use frame_sampler::core::io::{extract_and_copy_frames, read_descriptor_file, FrameNaming};
use frame_sampler::core::sampling::{DescriptorKind, SamplingConfig, SamplingMode};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "frame-sampler")]
#[command(version)]
#[command(about = "Group video frames by descriptor similarity and sample them")]
struct Cli {
    /// JSON5 配置文件
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 相似分组后按组采样
    Group(RunArgs),
    /// 整体随机采样
    Random(RunArgs),
    /// 固定节奏采样
    Cadence(RunArgs),
    /// 导出全部描述子
    FullSet(RunArgs),
    /// 把样本点文件映射回帧图片
    CopyFrames(CopyArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// 描述子文件（HOG / ORB / CNN）
    input: PathBuf,

    /// 点文件输出目录
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// 输出文件名前缀
    #[arg(long, default_value = "amostra")]
    stem: String,

    /// 覆盖按文件名推断的描述子类型
    #[arg(long, value_parser = parse_kind)]
    kind: Option<DescriptorKind>,

    #[arg(short, long)]
    threshold: Option<f64>,

    #[arg(short, long)]
    percentage: Option<f64>,

    #[arg(long)]
    parallel: bool,

    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct CopyArgs {
    /// 全集点文件
    full_points: PathBuf,
    /// 样本点文件
    sample_points: PathBuf,
    /// 帧图片目录
    frames_dir: PathBuf,
    /// 结果目录
    result_dir: PathBuf,
    /// 帧图片文件名前缀（`<prefix> (<n>).png`）
    #[arg(long, default_value = "frame")]
    frame_prefix: String,
    /// P0 对应的帧图片编号
    #[arg(long, default_value = "0")]
    first_frame_number: usize,
}

fn parse_kind(s: &str) -> Result<DescriptorKind, String> {
    match s.to_ascii_lowercase().as_str() {
        "hog" | "vector" => Ok(DescriptorKind::Vector),
        "orb" | "matrix" => Ok(DescriptorKind::Matrix),
        "cnn" | "embedding" => Ok(DescriptorKind::Embedding),
        other => Err(format!("unknown descriptor kind `{}`", other)),
    }
}

fn load_config(path: Option<&PathBuf>, args: &RunArgs) -> anyhow::Result<SamplingConfig> {
    let mut config = match path {
        Some(path) => SamplingConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SamplingConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.similarity_threshold = threshold;
    }
    if let Some(percentage) = args.percentage {
        config.sampling_percentage = percentage;
    }
    if args.parallel {
        config.parallel = true;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    frame_sampler::init_logging();

    let (mode, args) = match cli.command {
        Command::CopyFrames(copy) => {
            let report = extract_and_copy_frames(
                &copy.full_points,
                &copy.sample_points,
                &copy.frames_dir,
                &copy.result_dir,
                &FrameNaming::new(copy.frame_prefix.as_str(), copy.first_frame_number),
            )
            .context("Failed to copy sample frames")?;
            return print_json(&report);
        }
        Command::Group(args) => (Some(SamplingMode::Extremity), args),
        Command::Random(args) => (Some(SamplingMode::Random), args),
        Command::Cadence(args) => (Some(SamplingMode::Cadence), args),
        Command::FullSet(args) => (None, args),
    };

    let config = load_config(cli.config.as_ref(), &args)?;
    let sampler = FrameSampler::create(config).context("Invalid sampling parameters")?;
    let target = OutputTarget::new(&args.output_dir, args.stem.as_str());

    let report = match mode {
        Some(mode) => sampler.sample_file(mode, &args.input, args.kind, &target),
        None => read_descriptor_file(&args.input, args.kind)
            .and_then(|(_, descriptors)| sampler.full_set(descriptors, &target)),
    }
    .with_context(|| format!("Failed to process {}", args.input.display()))?;

    print_json(&report)
}
