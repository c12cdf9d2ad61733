//! taskq CLI: drive synthetic workloads through a bounded task queue.

use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use taskq::config::Config;
use taskq::telemetry::{TelemetryConfig, init_telemetry};
use taskq::{BoundedTaskQueue, TaskError};

#[derive(Parser)]
#[command(name = "taskq", about = "Bounded-concurrency async task queue")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run N sleep tasks through the queue and report how each settled
    Run {
        /// Number of tasks to submit
        #[arg(long, default_value_t = 5)]
        tasks: usize,
        /// How long each task sleeps
        #[arg(long, default_value_t = 50)]
        delay_ms: u64,
        /// Override TASKQ_MAX_CONCURRENT
        #[arg(long)]
        max_concurrent: Option<usize>,
        /// Per-task timeout (0 = none); overrides TASKQ_DEFAULT_TIMEOUT_MS
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Make every Kth task fail
        #[arg(long)]
        fail_every: Option<usize>,
        /// Make every Sth task sleep four times as long
        #[arg(long)]
        slow_every: Option<usize>,
        /// Print queue events as JSON lines
        #[arg(long)]
        events: bool,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Command::Run {
            tasks,
            delay_ms,
            max_concurrent,
            timeout_ms,
            fail_every,
            slow_every,
            events,
        } => {
            let _guard = init_telemetry(TelemetryConfig {
                endpoint: config.otel_endpoint.clone(),
                service_name: "taskq".to_string(),
                log_level: config.log_level.clone(),
            })?;

            let mut queue_config = config.queue;
            if let Some(n) = max_concurrent {
                queue_config.max_concurrent = n;
            }
            if let Some(ms) = timeout_ms {
                queue_config.default_timeout_ms = Some(ms);
            }

            cmd_run(
                BoundedTaskQueue::from_config(&queue_config)?,
                RunPlan {
                    tasks,
                    delay: Duration::from_millis(delay_ms),
                    fail_every,
                    slow_every,
                    events,
                },
            )
            .await
        }
    }
}

struct RunPlan {
    tasks: usize,
    delay: Duration,
    fail_every: Option<usize>,
    slow_every: Option<usize>,
    events: bool,
}

async fn cmd_run(queue: BoundedTaskQueue, plan: RunPlan) -> anyhow::Result<()> {
    let printer = plan.events.then(|| {
        let mut rx = queue.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Ok(line) = serde_json::to_string(&event) {
                            println!("{line}");
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        eprintln!("event printer lagged, {missed} event(s) lost")
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    });

    let is_nth = |every: Option<usize>, n: usize| every.is_some_and(|k| k > 0 && n % k == 0);

    let handles: Vec<_> = (1..=plan.tasks)
        .map(|n| {
            let fail = is_nth(plan.fail_every, n);
            let delay = if is_nth(plan.slow_every, n) {
                plan.delay * 4
            } else {
                plan.delay
            };
            let handle = queue.submit(move || async move {
                tokio::time::sleep(delay).await;
                if fail {
                    Err(format!("task {n} failed on purpose"))
                } else {
                    Ok(format!("task {n} done"))
                }
            });
            (n, handle)
        })
        .collect();

    println!("submitted {} task(s): {:?}", plan.tasks, queue.status());

    for (n, handle) in handles {
        match handle.await {
            Ok(value) => println!("#{n:<4} ok        {value}"),
            Err(TaskError::Failed(err)) => println!("#{n:<4} failed    {err}"),
            Err(err @ TaskError::Timeout { .. }) => println!("#{n:<4} timeout   {err}"),
            Err(err) => println!("#{n:<4} error     {err}"),
        }
    }

    queue.wait_idle().await;
    println!("final status: {}", serde_json::to_string(&queue.status())?);

    // The channel closes once the last queue reference is gone; the
    // printer then drains what is buffered and exits.
    drop(queue);
    if let Some(printer) = printer {
        printer.await?;
    }
    Ok(())
}
