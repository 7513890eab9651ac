use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;

use gt_core::message::RuntimeMessage;
use gt_core::schedule::UpdateTrigger;

use crate::applier::RuleApplier;
use crate::fetcher::Transport;
use crate::pipeline::{UpdateOutcome, UpdatePipeline};
use crate::scheduler::now_ms;

/// Map one stdin line to a trigger. Unknown messages are ignored.
pub fn trigger_for_line(line: &str) -> Option<UpdateTrigger> {
    if line.trim().is_empty() {
        return None;
    }
    match RuntimeMessage::parse(line) {
        Some(RuntimeMessage::ForceUpdate) => Some(UpdateTrigger::Manual),
        None => {
            log::debug!("Ignoring message: {}", line.trim());
            None
        }
    }
}

/// Run the startup check, then a periodic check every `check_interval`, plus
/// forced updates from runtime messages on stdin, until Ctrl-C.
pub async fn run<T, A>(pipeline: Arc<UpdatePipeline<T, A>>, check_interval: Duration)
where
    T: Transport + 'static,
    A: RuleApplier + 'static,
{
    let stdin = BufReader::new(tokio::io::stdin());
    serve(pipeline, check_interval, stdin, tokio::signal::ctrl_c()).await;
}

/// Daemon loop over `input` lines until `shutdown` resolves. Runs still in
/// flight at shutdown are awaited before returning.
pub async fn serve<T, A, R, S>(
    pipeline: Arc<UpdatePipeline<T, A>>,
    check_interval: Duration,
    input: R,
    shutdown: S,
) where
    T: Transport + 'static,
    A: RuleApplier + 'static,
    R: AsyncBufRead + Unpin,
    S: Future<Output = io::Result<()>>,
{
    let mut tasks = JoinSet::new();
    spawn_trigger(&mut tasks, &pipeline, UpdateTrigger::Startup);

    let mut ticker = tokio::time::interval_at(
        tokio::time::Instant::now() + check_interval,
        check_interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut lines = input.lines();
    let mut input_open = true;

    tokio::pin!(shutdown);

    log::info!("Daemon started, checking every {}s", check_interval.as_secs());

    loop {
        tokio::select! {
            _ = ticker.tick() => spawn_trigger(&mut tasks, &pipeline, UpdateTrigger::Elapsed),
            line = lines.next_line(), if input_open => match line {
                Ok(Some(line)) => {
                    if let Some(trigger) = trigger_for_line(&line) {
                        spawn_trigger(&mut tasks, &pipeline, trigger);
                    }
                }
                Ok(None) => {
                    log::debug!("stdin closed, manual triggers disabled");
                    input_open = false;
                }
                Err(e) => {
                    log::warn!("Failed to read stdin: {}", e);
                    input_open = false;
                }
            },
            Some(result) = tasks.join_next(), if !tasks.is_empty() => log_join(result),
            result = &mut shutdown => {
                if let Err(e) = result {
                    log::warn!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
        }
    }

    if !tasks.is_empty() {
        log::info!("Shutting down, waiting for {} running update(s)", tasks.len());
    } else {
        log::info!("Shutting down");
    }
    while let Some(result) = tasks.join_next().await {
        log_join(result);
    }
}

fn log_join(result: Result<(), JoinError>) {
    if let Err(e) = result {
        log::error!("Update task failed: {}", e);
    }
}

/// Reply to a forced update, in the runtime's sendResponse shape.
fn manual_reply(outcome: &UpdateOutcome) -> String {
    let success = matches!(outcome, UpdateOutcome::Applied(_));
    serde_json::json!({ "success": success }).to_string()
}

fn spawn_trigger<T, A>(
    tasks: &mut JoinSet<()>,
    pipeline: &Arc<UpdatePipeline<T, A>>,
    trigger: UpdateTrigger,
) where
    T: Transport + 'static,
    A: RuleApplier + 'static,
{
    let pipeline = Arc::clone(pipeline);
    tasks.spawn(async move {
        let outcome = pipeline.trigger(trigger, now_ms()).await;
        if trigger == UpdateTrigger::Manual {
            println!("{}", manual_reply(&outcome));
        }
        if let UpdateOutcome::Applied(report) = outcome {
            log::info!("{} rules active", report.active);
        }
    });
}
