//! # Example: Polling a remote build
//!
//! Demonstrates a three-stage automation driven by a pooled processor:
//! - `trigger`  asks the (simulated) CI server to start a build and remembers its id
//! - `await`    polls the build status, rescheduling itself until the build finishes
//! - `collect`  fetches the test summary of the finished build
//!
//! Progress is printed from the processor's event bus; engine internals log through
//! `tracing` (try `RUST_LOG=stepvisor=debug`).
//!
//! Run with: `cargo run --example poll_remote_build`

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use stepvisor::{
    BackoffPolicy, EventKind, JitterPolicy, LogListener, PooledScheduler, Processor, Step,
    StepError, StepExt, StepList, TaskError,
};
use tracing_subscriber::EnvFilter;

/// Simulated CI server: a build passes on its fourth status query.
#[derive(Default)]
struct RemoteCi {
    next_id: u32,
    queries: HashMap<u32, u32>,
}

impl RemoteCi {
    fn start_build(&mut self) -> u32 {
        self.next_id += 1;
        self.queries.insert(self.next_id, 0);
        self.next_id
    }

    fn status(&mut self, id: u32) -> Option<&'static str> {
        let queries = self.queries.get_mut(&id)?;
        *queries += 1;
        Some(if *queries <= 3 { "running" } else { "passed" })
    }
}

type Ci = Arc<Mutex<RemoteCi>>;
type BuildId = Arc<Mutex<Option<u32>>>;

struct Trigger {
    ci: Ci,
    build: BuildId,
}

#[async_trait]
impl Step for Trigger {
    fn name(&self) -> &str {
        "trigger"
    }

    async fn perform(&mut self) -> Result<(), StepError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let id = self.ci.lock().unwrap().start_build();
        println!("[trigger] started build #{id}");
        *self.build.lock().unwrap() = Some(id);
        Ok(())
    }

    fn needs_rescheduling(&self) -> bool {
        false
    }
}

struct AwaitBuild {
    ci: Ci,
    build: BuildId,
    finished: bool,
}

#[async_trait]
impl Step for AwaitBuild {
    fn name(&self) -> &str {
        "await"
    }

    async fn perform(&mut self) -> Result<(), StepError> {
        let id = self.build.lock().unwrap().ok_or_else(|| TaskError::Fatal {
            reason: "no build was triggered".into(),
        })?;
        let status = self.ci.lock().unwrap().status(id);
        match status {
            Some("running") => self.finished = false,
            Some("passed") => self.finished = true,
            other => {
                return Err(Box::new(TaskError::Fail {
                    reason: format!("build #{id} ended as {other:?}"),
                }));
            }
        }
        println!("[await] build #{id} finished: {}", self.finished);
        Ok(())
    }

    fn needs_rescheduling(&self) -> bool {
        !self.finished
    }

    fn reset(&mut self) {
        self.finished = false;
    }
}

struct Collect {
    build: BuildId,
}

#[async_trait]
impl Step for Collect {
    fn name(&self) -> &str {
        "collect"
    }

    async fn perform(&mut self) -> Result<(), StepError> {
        let id = self.build.lock().unwrap().unwrap_or_default();
        println!("[collect] build #{id}: 412 passed, 0 failed");
        Ok(())
    }

    fn needs_rescheduling(&self) -> bool {
        false
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let ci: Ci = Arc::default();
    let build: BuildId = Arc::default();

    let steps: StepList = vec![
        Trigger {
            ci: Arc::clone(&ci),
            build: Arc::clone(&build),
        }
        .boxed(),
        AwaitBuild {
            ci: Arc::clone(&ci),
            build: Arc::clone(&build),
            finished: false,
        }
        .observe(Arc::new(LogListener::new()))
        .boxed(),
        Collect {
            build: Arc::clone(&build),
        }
        .boxed(),
    ]
    .into_iter()
    .collect();

    let processor = Processor::builder(steps)
        .name("nightly-build")
        .scheduler(PooledScheduler::current()?)
        .backoff(BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_millis(800),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        })
        .max_reschedules(10)
        .publish_events()
        .build();

    let mut events = processor
        .subscribe()
        .ok_or_else(|| anyhow::anyhow!("event bus not configured"))?;
    let printer = tokio::spawn(async move {
        while let Ok(ev) = events.recv().await {
            match ev.kind {
                EventKind::StepRescheduled => println!(
                    "  ~ {} again in {}ms",
                    ev.step.as_deref().unwrap_or("?"),
                    ev.delay_ms.unwrap_or_default()
                ),
                kind if ev.is_terminal() => {
                    println!("  = run ended: {kind:?}");
                    break;
                }
                _ => {}
            }
        }
    });

    processor.run()?;
    let report = processor.wait().await;
    let _ = printer.await;

    println!(
        "{} finished as {} after {} performs in {:?}",
        report.processor, report.state, report.performs, report.elapsed
    );
    for step in &report.steps {
        println!(
            "  - {:<8} x{} {:?}",
            step.name, step.invocations, step.outcome
        );
    }
    Ok(())
}
