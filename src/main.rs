use anyhow::{Context, Result};
use clap::Parser;
use imgindex::{
    cli::{Cli, Commands, PlatformArgs},
    config::Config,
    digest::Digest,
    index::{AddOptions, ImageIndex, IndexOptions, PushOptions},
    layout::LayoutPath,
    manifest::IndexFormat,
    registry::digest_reference,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging to stderr
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("imgindex {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load().context("Failed to load config")?;
    let mut options = IndexOptions::from_config(&config)?.pull_insecure(cli.insecure);
    if let Some(path) = &cli.xdg_path {
        options = options.with_xdg_path(path);
    }

    match cli.command {
        Commands::Create { index, format } => {
            let format = match format {
                Some(format) => format.parse::<IndexFormat>()?,
                None => config.index_format()?,
            };
            let mut image_index = ImageIndex::new(&index, options.with_format(format))?;
            if LayoutPath::exists(image_index.layout_path()) {
                anyhow::bail!("Index {} already exists", index);
            }
            image_index.save()?;
            info!("Created index {}", index);
        }
        Commands::Add {
            index,
            image,
            all,
            platform,
        } => {
            let mut image_index = open(&index, options)?;
            image_index
                .add(&image, add_options(all, &platform))
                .await
                .with_context(|| format!("Failed to add {} to {}", image, index))?;
            image_index.save()?;
        }
        Commands::Annotate {
            index,
            digest,
            platform,
            urls,
        } => {
            let mut image_index = open(&index, options)?;
            let digest: Digest = digest.parse()?;
            annotate(&image_index, &digest, &platform, &urls)?;
            image_index.save()?;
        }
        Commands::Remove { index, image } => {
            let mut image_index = open(&index, options)?;
            image_index
                .remove(&image)
                .await
                .with_context(|| format!("Failed to remove {} from {}", image, index))?;
            image_index.save()?;
        }
        Commands::Inspect { index } => {
            let image_index = open(&index, options)?;
            println!("{}", image_index.inspect()?);
        }
        Commands::Push {
            index,
            tags,
            format,
            purge,
        } => {
            let mut image_index = open(&index, options)?;
            let mut push = PushOptions::new()
                .with_tags(tags)
                .with_insecure(cli.insecure)
                .with_purge(purge);
            if let Some(format) = format {
                push = push.with_format(format.parse()?);
            }

            let digest = image_index
                .push(push)
                .await
                .with_context(|| format!("Failed to push {}", index))?;

            // Print only the digest reference to stdout
            println!("{}", digest_reference(&index, &digest)?);
        }
        Commands::Delete { index } => {
            open(&index, options)?.delete()?;
        }
        Commands::Version => {}
    }

    Ok(())
}

fn open(index: &str, options: IndexOptions) -> Result<ImageIndex> {
    ImageIndex::from_layout(index, options)
        .with_context(|| format!("Failed to open index {}", index))
}

fn add_options(all: bool, platform: &PlatformArgs) -> AddOptions {
    let mut options = AddOptions::new()
        .with_all(all)
        .with_features(platform.features.clone())
        .with_os_features(platform.os_features.clone())
        .with_annotations(platform.annotation_map());
    if let Some(os) = &platform.os {
        options = options.with_os(os);
    }
    if let Some(arch) = &platform.arch {
        options = options.with_architecture(arch);
    }
    if let Some(variant) = &platform.variant {
        options = options.with_variant(variant);
    }
    if let Some(os_version) = &platform.os_version {
        options = options.with_os_version(os_version);
    }
    options
}

fn annotate(
    index: &ImageIndex,
    digest: &Digest,
    platform: &PlatformArgs,
    urls: &[String],
) -> Result<()> {
    if let Some(os) = &platform.os {
        index.set_os(digest, os)?;
    }
    if let Some(arch) = &platform.arch {
        index.set_architecture(digest, arch)?;
    }
    if let Some(variant) = &platform.variant {
        index.set_variant(digest, variant)?;
    }
    if let Some(os_version) = &platform.os_version {
        index.set_os_version(digest, os_version)?;
    }
    if !platform.features.is_empty() {
        index.set_features(digest, &platform.features)?;
    }
    if !platform.os_features.is_empty() {
        index.set_os_features(digest, &platform.os_features)?;
    }
    if !urls.is_empty() {
        index.set_urls(digest, urls)?;
    }
    if !platform.annotations.is_empty() {
        index.set_annotations(digest, &platform.annotation_map())?;
    }
    Ok(())
}
