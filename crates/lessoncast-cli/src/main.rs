//! lessoncast: command-line client for lesson videos.
//!
//! Set LESSONCAST_API_URL (or API_URL) and LESSONCAST_TOKEN (or API_TOKEN).

use anyhow::Context;
use clap::{Parser, Subcommand};
use lessoncast_api_client::{ApiClient, HttpObjectTransport};
use lessoncast_cli::{init_tracing, is_settled, progress_line, status_line};
use lessoncast_core::{
    LessonId, LessonVideoApi, ReferenceShape, StreamingUrlProvider, UploadFile,
};
use lessoncast_upload::{
    ContainerDurationProbe, FfprobeDurationProbe, PollOptions, StatusPoller, UploadCoordinator,
    UploadOptions,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "lessoncast", about = "Lesson video upload and streaming CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a video file to a lesson
    Upload {
        lesson: LessonId,
        file: PathBuf,
        /// Keep polling until processing finishes
        #[arg(long)]
        wait: bool,
        /// ffprobe binary used for containers other than MP4/MOV
        #[arg(long, default_value = "ffprobe")]
        ffprobe: PathBuf,
    },
    /// Show the lesson's video asset
    Status { lesson: LessonId },
    /// Poll until processing reaches READY or FAILED
    Watch { lesson: LessonId },
    /// Print a streaming reference for a READY video
    StreamUrl {
        lesson: LessonId,
        /// Print the embedded HLS manifest instead of the data URI
        #[arg(long)]
        decode: bool,
    },
    /// Remove the lesson's video
    Delete { lesson: LessonId },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

async fn wait_for_processing(
    api: Arc<dyn LessonVideoApi>,
    lesson: LessonId,
) -> anyhow::Result<()> {
    let poller = StatusPoller::new(api, PollOptions::default());
    let asset = poller
        .wait_for_terminal(lesson, |asset| eprintln!("{}", status_line(asset)))
        .await?;
    print_json(&asset)
}

async fn upload(
    client: Arc<ApiClient>,
    lesson: LessonId,
    path: PathBuf,
    wait: bool,
    ffprobe: PathBuf,
) -> anyhow::Result<()> {
    let size = tokio::fs::metadata(&path)
        .await
        .with_context(|| format!("Cannot read {}", path.display()))?
        .len();
    let file = UploadFile::new(path, size, None);
    tracing::debug!(
        lesson,
        file = %file.file_name,
        content_type = %file.content_type,
        size_bytes = size,
        "Starting upload"
    );

    let coordinator = UploadCoordinator::new(
        client.clone(),
        Arc::new(HttpObjectTransport::new()?),
        Arc::new(ContainerDurationProbe::new(FfprobeDurationProbe::new(ffprobe))),
        UploadOptions::default(),
    );

    let mut updates = coordinator.subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let session = updates.borrow_and_update().clone();
            eprint!("\r{}", progress_line(&session));
            if is_settled(&session) {
                eprintln!();
                break;
            }
        }
    });

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let result = coordinator.upload(lesson, &file, cancel).await;
    drop(coordinator);
    let _ = printer.await;

    let asset = result.map_err(|e| anyhow::anyhow!("{} ({})", e.user_message(), e))?;
    print_json(&asset)?;

    if wait {
        wait_for_processing(client, lesson).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let client = Arc::new(ApiClient::from_env().context(
        "Failed to create API client. Set LESSONCAST_TOKEN and LESSONCAST_API_URL (or API_URL)",
    )?);

    let cli = Cli::parse();

    match cli.command {
        Commands::Upload {
            lesson,
            file,
            wait,
            ffprobe,
        } => upload(client, lesson, file, wait, ffprobe).await?,
        Commands::Status { lesson } => {
            let asset = client.video_status(lesson).await?;
            print_json(&asset)?;
        }
        Commands::Watch { lesson } => wait_for_processing(client, lesson).await?,
        Commands::StreamUrl { lesson, decode } => {
            let reference = client.streaming_reference(lesson).await?;
            match reference.classify() {
                ReferenceShape::EmbeddedManifest { .. } if decode => {
                    let manifest = reference
                        .decode_manifest()
                        .context("Decode embedded manifest")?;
                    print!("{}", manifest);
                }
                _ => println!("{}", reference),
            }
        }
        Commands::Delete { lesson } => {
            let asset = client.delete_video(lesson).await?;
            print_json(&asset)?;
        }
    }

    Ok(())
}
