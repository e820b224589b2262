use anyhow::Result;
use clap::Parser;
use tinyimg::compressor::Compressor;
use tinyimg::models::{Asset, FolderRef};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "tinyimg")]
#[command(about = "Compress an uploaded image through the remote optimizer")]
struct CliArgs {
    /// Storage identifier of the asset, e.g. /user_upload/photo.png
    identifier: String,

    /// Public URL of the asset; relative to the site root for local storage.
    #[arg(long)]
    public_url: String,

    /// File extension. Defaults to the identifier's extension.
    #[arg(long)]
    extension: Option<String>,

    /// Storage driver of the asset's parent folder.
    #[arg(long, default_value = "Local")]
    driver: String,

    /// A file already occupies the target path.
    #[arg(long)]
    parent_occupied: bool,
}

fn build_asset(args: &CliArgs) -> Asset {
    let parent_folder = if args.parent_occupied {
        let path = args
            .identifier
            .rsplit_once('/')
            .map(|(dir, _)| format!("{}/", dir))
            .unwrap_or_else(|| "/".to_string());
        FolderRef::ExistingPath { path }
    } else {
        FolderRef::Live {
            driver_type: args.driver.clone(),
        }
    };

    let mut asset = Asset::from_identifier(&args.identifier, &args.public_url, parent_folder);
    if let Some(ext) = &args.extension {
        asset.extension = ext.clone();
    }
    asset
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tinyimg=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();
    let mut asset = build_asset(&args);

    match Compressor::from_env().await {
        Ok(compressor) => match compressor.process(&mut asset).await {
            Ok(outcome) => {
                info!("Processed {}: {:?}", asset.identifier, outcome);
                println!("{}", serde_json::to_string(&outcome)?);
                Ok(())
            }
            Err(e) => {
                error!("Processing {} failed: {}", asset.identifier, e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!("Failed to initialize compressor: {}", e);
            std::process::exit(1);
        }
    }
}
