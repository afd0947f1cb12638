//! Implementations of the CLI subcommands.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{HttpTrainingApi, TrainingApi};
use crate::protocol::TrainingConfig;
use crate::settings::Settings;
use crate::store::SessionStore;

fn http_api(settings: &Settings) -> Result<Arc<dyn TrainingApi>> {
    Ok(Arc::new(HttpTrainingApi::new(&settings.backend)?))
}

/// Start a session and stream its updates to the terminal.
pub async fn watch(settings: Settings, config: TrainingConfig) -> Result<()> {
    let api = http_api(&settings)?;
    let store = Arc::new(SessionStore::new(api, &settings));

    let session_id = store.start_session(config).await?;
    info!("session {session_id} started; press Ctrl-C to stop");

    let mut revisions = store.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("stopping session {session_id}");
                store.stop_session().await;
                break;
            }
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = store.snapshot();
                if let Some(latest) = &snapshot.latest {
                    println!(
                        "episode {:>5}  step {:>5}  reward {:>10.3}  cumulative {:>10.3}",
                        latest.episode, latest.step, latest.reward, latest.cumulative_reward
                    );
                }
                if snapshot.connection_lost {
                    warn!("connection to the backend lost; giving up");
                    break;
                }
                if !snapshot.is_running {
                    let metrics = &snapshot.metrics;
                    let total: f64 = metrics.episode_rewards.iter().sum();
                    println!(
                        "training completed: {} updates folded, reward sum over window {:.3}",
                        snapshot.history_len, total
                    );
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Print the backend's status record for a session.
pub async fn status(settings: Settings, session_id: String) -> Result<()> {
    let api = http_api(&settings)?;
    let status = api.training_status(&session_id).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

/// Ask the backend to stop a session.
pub async fn stop(settings: Settings, session_id: String) -> Result<()> {
    let api = http_api(&settings)?;
    let ack = api.stop_training(&session_id).await?;
    println!("{}", serde_json::to_string_pretty(&ack)?);
    Ok(())
}

/// Delete a session on the backend.
pub async fn delete(settings: Settings, session_id: String) -> Result<()> {
    let api = http_api(&settings)?;
    let ack = api.delete_session(&session_id).await?;
    println!("{}", serde_json::to_string_pretty(&ack)?);
    Ok(())
}

/// Print the environment catalog, or a single entry.
pub async fn environments(settings: Settings, id: Option<String>) -> Result<()> {
    let api = http_api(&settings)?;
    match id {
        Some(id) => {
            let environment = api.environment(&id).await?;
            println!("{}", serde_json::to_string_pretty(&environment)?);
        }
        None => {
            let environments = api.environments().await?;
            println!("{}", serde_json::to_string_pretty(&environments)?);
        }
    }
    Ok(())
}

/// Print the algorithm catalog, or a single entry.
pub async fn algorithms(settings: Settings, id: Option<String>) -> Result<()> {
    let api = http_api(&settings)?;
    match id {
        Some(id) => {
            let algorithm = api.algorithm(&id).await?;
            println!("{}", serde_json::to_string_pretty(&algorithm)?);
        }
        None => {
            let algorithms = api.algorithms().await?;
            println!("{}", serde_json::to_string_pretty(&algorithms)?);
        }
    }
    Ok(())
}
