use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "visionserve")]
#[command(author, version, about = "Serve a pre-trained image classifier over HTTP", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "visionserve.yaml")]
    pub config: String,

    /// Local safetensors weights (overrides the configured model source)
    #[arg(short, long)]
    pub weights: Option<PathBuf>,

    /// Label file, one class per line
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// Network architecture (resnet18, resnet34, resnet50, resnet101, resnet152)
    #[arg(short, long)]
    pub architecture: Option<String>,

    /// Listen address
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
