mod config;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};
use watchtower_core::{Dashboard, DisplayImage, ImageKind, NotificationLevel};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,watchtower_core=info,dashboard=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        target = "dashboard_demo",
        "Starting threat-detection dashboard demo"
    );

    let cfg = config::load();
    let dashboard = Dashboard::new(cfg);
    let mut notifications = dashboard.notifier().subscribe();
    let handles = dashboard.start().await?;

    info!(
        target = "dashboard_demo",
        prompts = ?handles.selector.catalog(),
        "prompt catalog loaded"
    );

    // Panel observers: stand-ins for the two-pane layout, one log line per
    // state transition.
    let mut photo = handles.photo.clone();
    tokio::spawn(async move {
        while photo.changed().await.is_ok() {
            let view = photo.borrow().clone();
            match view {
                DisplayImage::Blank => info!(target = "dashboard_demo", "photo: blank"),
                DisplayImage::Frame { kind, base64 } => info!(
                    target = "dashboard_demo",
                    kind = ?kind,
                    encoded_len = base64.len(),
                    "photo frame updated"
                ),
            }
        }
    });

    let mut timestamp = handles.timestamp.clone();
    tokio::spawn(async move {
        while timestamp.changed().await.is_ok() {
            let label = timestamp.borrow().clone();
            info!(target = "dashboard_demo", time = %label, "capture timestamp");
        }
    });

    let mut response = handles.response.clone();
    tokio::spawn(async move {
        while response.changed().await.is_ok() {
            let view = response.borrow().clone();
            if view.loading {
                info!(target = "dashboard_demo", "analysis in progress...");
            } else {
                info!(target = "dashboard_demo", response = %view.response, "analysis");
            }
        }
    });

    tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(note) => match note.level {
                    NotificationLevel::Error => {
                        error!(target = "dashboard_demo", "{}", note.message)
                    }
                    _ => info!(target = "dashboard_demo", "{}", note.message),
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Console stand-ins for the checkbox and the dropdown.
    let toggle = handles.photo_toggle.clone();
    let mut selector = handles.selector;
    let console = async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match line.trim() {
                "" => continue,
                "annotated" => {
                    let _ = toggle.select(ImageKind::Annotated).await;
                }
                "raw" => {
                    let _ = toggle.select(ImageKind::Raw).await;
                }
                "prompts" => info!(
                    target = "dashboard_demo",
                    catalog = ?selector.catalog(),
                    "available prompts"
                ),
                other => {
                    if let Some(prompt) = other.strip_prefix("prompt ") {
                        selector.select(prompt.trim()).await;
                    } else {
                        warn!(
                            target = "dashboard_demo",
                            input = %other,
                            "unknown command (annotated | raw | prompts | prompt <id>)"
                        );
                    }
                }
            }
        }
    };

    tokio::select! {
        _ = console => {}
        _ = signal::ctrl_c() => {
            info!(target = "dashboard_demo", "shutting down");
        }
    }

    for task in handles.tasks {
        task.abort();
    }
    Ok(())
}
