use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "diffract-header")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Print beam, goniometer, detector and scan models and total counts of diffraction images", long_about = None)]
pub struct Cli {
    /// Image files to report on, in order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}
