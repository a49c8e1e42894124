use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use knowledge_harvest::catalog::{RecordingId, RecordingQuery};
use knowledge_harvest::commands::{library, recording, ListFilter, MetadataArgs};
use knowledge_harvest::config::HarvestConfig;
use knowledge_harvest::upload::{parse_tags, HttpStorageClient, UploadCoordinator, Workspace};
use knowledge_harvest::utils::{AppError, ErrorResponse};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "harvest")]
#[command(version)]
#[command(about = "Record your screen and share it with the knowledge library")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "HARVEST_CONFIG")]
    config: Option<PathBuf>,

    /// Recordings service base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Print errors as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct MetadataOpts {
    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    description: Option<String>,

    /// Comma-separated tags
    #[arg(long)]
    tags: Option<String>,
}

impl From<MetadataOpts> for MetadataArgs {
    fn from(opts: MetadataOpts) -> Self {
        MetadataArgs {
            title: opts.title,
            description: opts.description,
            tags: opts.tags,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Record the screen, then save the recording to the library
    Record {
        #[command(flatten)]
        metadata: MetadataOpts,

        /// Also keep a local copy of the capture
        #[arg(long)]
        keep: Option<PathBuf>,
    },
    /// Upload an existing WebM file
    Upload {
        file: PathBuf,

        /// Recorded length in seconds
        #[arg(long, default_value_t = 0)]
        duration_secs: u64,

        #[command(flatten)]
        metadata: MetadataOpts,
    },
    /// List recordings
    List {
        /// Server-side search over title and description
        #[arg(long)]
        search: Option<String>,

        /// Server-side tag filter
        #[arg(long)]
        tag: Option<String>,

        #[arg(long)]
        creator: Option<String>,

        /// Local match on title or creator
        #[arg(long, default_value = "")]
        filter: String,

        /// Keep recordings carrying any of these comma-separated tags
        #[arg(long, default_value = "")]
        any_tag: String,
    },
    /// Show one recording
    Show { id: String },
    /// Delete a recording
    Delete { id: String },
    /// Download a recording's media
    Download {
        id: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List tags in use
    Tags,
    /// Check the recordings service is reachable
    Health,
}

#[tokio::main]
async fn main() {
    knowledge_harvest::init_tracing();

    let cli = Cli::parse();
    let json = cli.json;

    if let Err(e) = run(cli).await {
        tracing::debug!("{:?}", e);
        match e.downcast::<AppError>() {
            Ok(app_error) if json => {
                let response = ErrorResponse::from(app_error);
                eprintln!(
                    "{}",
                    serde_json::to_string(&response).unwrap_or_else(|_| response.message.clone())
                );
            }
            Ok(app_error) => eprintln!("error: {}", app_error),
            Err(other) => eprintln!("error: {:#}", other),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = HarvestConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
        config.validate()?;
    }

    tracing::info!("Knowledge Harvest v{} using {}", env!("CARGO_PKG_VERSION"), config.api_url);

    let client = Arc::new(HttpStorageClient::new(&config.api_url, config.request_timeout())?);
    let uploader = UploadCoordinator::new(client.clone()).with_max_upload_bytes(config.max_upload_bytes);
    let mut workspace = Workspace::new(uploader);

    match cli.command {
        Command::Record { metadata, keep } => {
            recording::record(&config, &mut workspace, metadata.into(), keep).await?;
        }
        Command::Upload {
            file,
            duration_secs,
            metadata,
        } => {
            library::upload(&config, &mut workspace, &file, duration_secs, metadata.into()).await?;
        }
        Command::List {
            search,
            tag,
            creator,
            filter,
            any_tag,
        } => {
            let query = RecordingQuery { search, tag, creator };
            let filter = ListFilter {
                text: filter,
                tags: parse_tags(&any_tag),
            };
            library::list(&mut workspace, &query, &filter, cli.json).await?;
        }
        Command::Show { id } => library::show(&workspace, &RecordingId::new(id), cli.json).await?,
        Command::Delete { id } => library::delete(&mut workspace, &RecordingId::new(id)).await?,
        Command::Download { id, output } => {
            library::download(&workspace, &RecordingId::new(id), output).await?;
        }
        Command::Tags => library::tags(&mut workspace).await?,
        Command::Health => {
            library::health(&client).await?;
        }
    }

    Ok(())
}
