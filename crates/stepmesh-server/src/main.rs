//! stepmesh - STEP to STL/GLB conversion server
//!
//! Runs the HTTP service, or converts a single file from the command line.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use stepmesh_kernel::MeshFormat;
use stepmesh_server::{telemetry, ConversionService, KernelConverter, MeshConverter, ServiceConfig};
use tracing::info;

#[derive(Parser)]
#[command(name = "stepmesh")]
#[command(about = "Convert STEP models to STL/GLB meshes over HTTP", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Bind address
        #[arg(long)]
        host: Option<IpAddr>,
        /// Port (0 picks a free one)
        #[arg(short, long)]
        port: Option<u16>,
        /// Directory for uploads and converted meshes
        #[arg(long)]
        scratch_dir: Option<PathBuf>,
    },
    /// Convert one STEP file without starting the server
    Convert {
        /// Input STEP file (.step or .stp)
        input: PathBuf,
        /// Output file (format determined by extension: .stl, .glb)
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_json)?;

    let mut config = match &cli.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };

    match cli.command {
        Some(Commands::Serve {
            host,
            port,
            scratch_dir,
        }) => {
            if let Some(host) = host {
                config.http.host = host;
            }
            if let Some(port) = port {
                config.http.port = port;
            }
            if let Some(dir) = scratch_dir {
                config.storage.scratch_dir = dir;
            }
            serve(config).await?;
        }
        Some(Commands::Convert { input, output }) => {
            convert_file(&config, &input, &output).await?;
        }
        None => serve(config).await?,
    }

    Ok(())
}

async fn serve(config: ServiceConfig) -> Result<()> {
    let service = ConversionService::new(config).context("failed to initialize service")?;
    service.start().await?;
    Ok(())
}

async fn convert_file(config: &ServiceConfig, input: &Path, output: &Path) -> Result<()> {
    let format = output
        .extension()
        .and_then(|e| e.to_str())
        .and_then(MeshFormat::from_extension);
    let Some(format) = format else {
        bail!(
            "unsupported output format: {} (expected .stl or .glb)",
            output.display()
        );
    };
    config.validate()?;
    let params = config.tessellation_params()?;

    let (input, output) = (input.to_path_buf(), output.to_path_buf());
    let summary = tokio::task::spawn_blocking(move || {
        KernelConverter.convert(&input, &output, &params, format)
    })
    .await??;

    info!(
        solids = summary.solids,
        triangles = summary.triangles,
        bytes = summary.bytes,
        "Converted"
    );
    Ok(())
}
