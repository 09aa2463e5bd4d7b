//! Task-created events fed from JSON-lines input
//!
//! The binary uses this to replay a file or stdin into the bus. Feeding stops
//! early when the stop flag is raised, so a shutdown never waits on input that
//! will not arrive or on tasks that will not finish.

use std::io::BufRead;
use std::time::Duration;

use shared::{service_debug, service_info, subjects};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

use crate::core::MatchingMetrics;
use crate::error::OrchestratorResult;
use crate::pipeline::cancelled;
use crate::traits::EventBus;

const LINE_BUFFER: usize = 256;
const HANDLED_POLL: Duration = Duration::from_millis(25);

/// Stream lines from a file path, or from stdin when `source` is `-`
///
/// Stdin is read on a plain thread so a pending read never holds up runtime
/// shutdown.
pub async fn open_lines(source: &str) -> OrchestratorResult<mpsc::Receiver<std::io::Result<String>>> {
    let (tx, rx) = mpsc::channel(LINE_BUFFER);

    if source == "-" {
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        });
    } else {
        let file = tokio::fs::File::open(source).await?;
        tokio::spawn(async move {
            let mut lines = BufReader::new(file).lines();
            loop {
                let next = match lines.next_line().await {
                    Ok(Some(line)) => Ok(line),
                    Ok(None) => break,
                    Err(e) => Err(e),
                };
                let failed = next.is_err();
                if tx.send(next).await.is_err() || failed {
                    break;
                }
            }
        });
    }

    Ok(rx)
}

/// Publish every non-empty line as a task-created event, then wait until all were handled
///
/// # Returns
/// The number of events published, which is smaller than the input when
/// `stop` interrupted the feed.
pub async fn feed_events<B: EventBus>(
    mut lines: mpsc::Receiver<std::io::Result<String>>,
    bus: &B,
    metrics: &MatchingMetrics,
    stop: watch::Receiver<bool>,
) -> OrchestratorResult<u64> {
    let stopped = cancelled(stop);
    tokio::pin!(stopped);

    let baseline = metrics.snapshot().tasks_handled();
    let mut published = 0u64;

    loop {
        let line = tokio::select! {
            next = lines.recv() => match next {
                Some(line) => line?,
                None => break,
            },
            _ = &mut stopped => {
                service_info!(published, "Event feed stopped before the input ended");
                return Ok(published);
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        tokio::select! {
            sent = bus.publish(subjects::TASK_CREATED, line.as_bytes().to_vec()) => sent?,
            _ = &mut stopped => return Ok(published),
        }
        published += 1;
    }
    service_debug!(published, "All task events published, waiting for completion");

    let target = baseline + published;
    while metrics.snapshot().tasks_handled() < target {
        tokio::select! {
            _ = tokio::time::sleep(HANDLED_POLL) => {}
            _ = &mut stopped => {
                service_info!(
                    published,
                    handled = metrics.snapshot().tasks_handled().saturating_sub(baseline),
                    "Event feed stopped before every task was handled"
                );
                break;
            }
        }
    }
    Ok(published)
}
