use crate::{api::AppState, files, images};
use tokio::time::{interval, Duration};
use tracing::{info, warn};

/// Files younger than this are never swept, so an upload whose metadata row
/// is still being written keeps its file.
pub const ORPHAN_GRACE: Duration = Duration::from_secs(600);

/// Delete uploaded files that no image row references any more.
pub async fn sweep_once(state: &AppState, grace: Duration) -> anyhow::Result<usize> {
    let keep = state
        .with_conn(images::all_filenames)
        .await?;
    files::cleanup_orphans(&state.upload_dir, &keep, grace).await
}

/// Periodically remove orphaned files from the upload directory.
pub fn spawn_housekeeping(state: AppState, every: Duration) {
    tokio::spawn(async move {
        let mut tick = interval(every);
        loop {
            tick.tick().await;
            match sweep_once(&state, ORPHAN_GRACE).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "swept orphaned uploads"),
                Err(e) => warn!(error = ?e, "orphan sweep failed"),
            }
        }
    });
}
