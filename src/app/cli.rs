use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "store_walkthrough",
    version,
    about = "Sign a device into the app store and install apps, unattended"
)]
pub struct Cli {
    /// Account username
    #[arg(long)]
    pub username: String,

    /// Account password
    #[arg(long)]
    pub password: String,

    /// Store app names to install, e.g. 'Google Maps' 'Facebook'
    #[arg(long, num_args = 1.., required = true)]
    pub apps: Vec<String>,

    /// Succeed only if every app opens after installing. Without it, reaching the download
    /// step is enough.
    #[arg(long)]
    pub verify_installation: bool,

    /// Device to drive when more than one is connected
    #[arg(long, env = "ANDROID_SERIAL")]
    pub serial: Option<String>,

    /// JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Overall time budget, replacing the one computed from the app count
    #[arg(long)]
    pub budget_secs: Option<u64>,
}
