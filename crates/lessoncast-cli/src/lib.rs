use lessoncast_core::{UploadSession, UploadState, VideoAsset};

const BAR_WIDTH: usize = 30;

/// Renders `[#####.....]  42% uploading`.
pub fn progress_line(session: &UploadSession) -> String {
    let percent = session.progress().min(100) as usize;
    let filled = percent * BAR_WIDTH / 100;
    format!(
        "[{}{}] {:>3}% {}",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        percent,
        session.state()
    )
}

/// One line per observed asset, e.g. `lesson 12: Processing (125s)`.
pub fn status_line(asset: &VideoAsset) -> String {
    let mut line = format!("lesson {}: {}", asset.lesson_id, asset.status.badge());
    if let Some(seconds) = asset.duration_seconds {
        line.push_str(&format!(" ({}s)", seconds));
    }
    if let Some(reason) = &asset.failure_reason {
        line.push_str(&format!(" - {}", reason));
    }
    line
}

/// Whether the progress printer has anything left to show.
pub fn is_settled(session: &UploadSession) -> bool {
    matches!(
        session.state(),
        UploadState::Success | UploadState::Error | UploadState::Idle
    )
}

/// Initialize tracing for the CLI. Logs go to stderr so stdout stays JSON.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}
