//! End-to-end behavior of processors across drive modes and schedulers.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use stepvisor::{
    BoxStep, DriveMode, EventKind, PooledScheduler, Processor, ProcessorBuilder, RunReport,
    RunState, SameThreadScheduler, Scheduler, SequenceFn, Step, StepError, StepExt, StepList,
    StepListener, StepNotice, StepOutcome, TaskError,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Setup {
    BlockingSameThread,
    BlockingPooled,
    CallbackSameThread,
    CallbackPooled,
}

const ALL: [Setup; 4] = [
    Setup::BlockingSameThread,
    Setup::BlockingPooled,
    Setup::CallbackSameThread,
    Setup::CallbackPooled,
];

static NEXT_ID: AtomicU32 = AtomicU32::new(0);

#[derive(Clone, Debug, PartialEq, Eq)]
struct Entry {
    step: &'static str,
    instance: u32,
    poll: u32,
}

type CancelFn = Box<dyn Fn() + Send>;

/// State shared by all probes of one run.
#[derive(Clone, Default)]
struct Shared {
    log: Arc<Mutex<Vec<Entry>>>,
    busy: Arc<AtomicBool>,
    overlaps: Arc<AtomicU32>,
    cancel: Arc<Mutex<Option<CancelFn>>>,
}

impl Shared {
    fn entries(&self) -> Vec<Entry> {
        self.log.lock().unwrap().clone()
    }

    fn names(&self) -> Vec<&'static str> {
        self.entries().into_iter().map(|e| e.step).collect()
    }

    fn cancel_run(&self) {
        if let Some(cancel) = self.cancel.lock().unwrap().as_ref() {
            cancel();
        }
    }
}

/// Polling step that records every invocation.
struct Probe {
    instance: u32,
    name: &'static str,
    reschedules: u32,
    polls: u32,
    work: Duration,
    interval: Option<Duration>,
    cancel_after: Option<u32>,
    shared: Shared,
}

impl Probe {
    fn new(shared: &Shared, name: &'static str, reschedules: u32) -> Self {
        Self {
            instance: NEXT_ID.fetch_add(1, Ordering::SeqCst),
            name,
            reschedules,
            polls: 0,
            work: Duration::ZERO,
            interval: None,
            cancel_after: None,
            shared: shared.clone(),
        }
    }

    fn working(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }

    fn every(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    fn cancel_after(mut self, polls: u32) -> Self {
        self.cancel_after = Some(polls);
        self
    }
}

#[async_trait]
impl Step for Probe {
    fn name(&self) -> &str {
        self.name
    }

    async fn perform(&mut self) -> Result<(), StepError> {
        if self.shared.busy.swap(true, Ordering::SeqCst) {
            self.shared.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.polls += 1;
        if !self.work.is_zero() {
            std::thread::sleep(self.work);
        }
        self.shared.log.lock().unwrap().push(Entry {
            step: self.name,
            instance: self.instance,
            poll: self.polls,
        });
        self.shared.busy.store(false, Ordering::SeqCst);

        if self.cancel_after == Some(self.polls) {
            self.shared.cancel_run();
        }
        Ok(())
    }

    fn needs_rescheduling(&self) -> bool {
        self.polls <= self.reschedules
    }

    fn suggested_interval(&self) -> Option<Duration> {
        self.interval
    }
}

/// Step failing with the error produced by `make`.
struct Failing {
    make: fn() -> StepError,
}

#[async_trait]
impl Step for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    async fn perform(&mut self) -> Result<(), StepError> {
        Err((self.make)())
    }

    fn needs_rescheduling(&self) -> bool {
        false
    }
}

fn list(steps: Vec<BoxStep>) -> StepList {
    steps.into_iter().collect()
}

fn pooled() -> PooledScheduler {
    PooledScheduler::current().expect("tests run inside a tokio runtime")
}

async fn drive<S: Scheduler>(p: Processor<S>, shared: &Shared) -> Result<RunReport, TaskError> {
    let handle = p.cancel_handle();
    *shared.cancel.lock().unwrap() = Some(Box::new(move || {
        handle.cancel();
    }));

    match p.mode() {
        DriveMode::Blocking => {
            let runner = p.clone();
            tokio::task::spawn_blocking(move || runner.run())
                .await
                .expect("blocking run panicked")
        }
        DriveMode::Callback => {
            p.run()?;
            Ok(p.wait().await)
        }
    }
}

async fn run_with(
    setup: Setup,
    builder: ProcessorBuilder<SameThreadScheduler>,
    shared: &Shared,
) -> Result<RunReport, TaskError> {
    match setup {
        Setup::BlockingSameThread => drive(builder.mode(DriveMode::Blocking).build(), shared).await,
        Setup::BlockingPooled => {
            let p = builder.mode(DriveMode::Blocking).scheduler(pooled()).build();
            drive(p, shared).await
        }
        Setup::CallbackSameThread => drive(builder.mode(DriveMode::Callback).build(), shared).await,
        Setup::CallbackPooled => {
            let p = builder.mode(DriveMode::Callback).scheduler(pooled()).build();
            drive(p, shared).await
        }
    }
}

async fn wait_for_state<S: Scheduler>(p: &Processor<S>, state: RunState) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while p.state() != state {
        assert!(Instant::now() < deadline, "never reached {state}");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn every_step_runs_once_in_order() {
    for setup in ALL {
        let shared = Shared::default();
        let steps = ["a", "b", "c", "d", "e"]
            .into_iter()
            .map(|name| Probe::new(&shared, name, 0).boxed())
            .collect();

        let report = run_with(setup, Processor::builder(list(steps)), &shared)
            .await
            .unwrap();

        assert_eq!(report.state, RunState::Done, "{setup:?}");
        assert_eq!(report.performs, 5, "{setup:?}");
        assert_eq!(shared.names(), vec!["a", "b", "c", "d", "e"], "{setup:?}");
        assert!(
            report.steps.iter().all(|r| r.outcome == StepOutcome::Completed),
            "{setup:?}"
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rescheduled_step_reuses_its_instance() {
    for setup in ALL {
        let shared = Shared::default();
        let steps = vec![
            Probe::new(&shared, "poll", 3).boxed(),
            Probe::new(&shared, "collect", 0).boxed(),
        ];
        let builder = Processor::builder(list(steps)).default_interval(Duration::from_millis(5));

        let report = run_with(setup, builder, &shared).await.unwrap();
        assert_eq!(report.state, RunState::Done, "{setup:?}");

        let entries = shared.entries();
        assert_eq!(entries.len(), 5, "{setup:?}");
        let polls: Vec<_> = entries.iter().take(4).collect();
        assert!(polls.iter().all(|e| e.step == "poll"), "{setup:?}");
        assert!(polls.iter().all(|e| e.instance == polls[0].instance), "{setup:?}");
        assert_eq!(
            polls.iter().map(|e| e.poll).collect::<Vec<_>>(),
            vec![1, 2, 3, 4],
            "{setup:?}"
        );
        assert_eq!(entries[4].step, "collect", "{setup:?}");
        assert_eq!(report.step("poll").unwrap().invocations, 4, "{setup:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invocations_never_overlap() {
    for setup in ALL {
        let shared = Shared::default();
        let steps = (0..3)
            .map(|_| {
                Probe::new(&shared, "busy", 2)
                    .working(Duration::from_millis(3))
                    .every(Duration::from_millis(1))
                    .boxed()
            })
            .collect();

        let report = run_with(setup, Processor::builder(list(steps)), &shared)
            .await
            .unwrap();
        assert_eq!(report.performs, 9, "{setup:?}");
        assert_eq!(shared.overlaps.load(Ordering::SeqCst), 0, "{setup:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reschedule_then_advance_with_default_interval() {
    for setup in ALL {
        let shared = Shared::default();
        let steps = vec![
            Probe::new(&shared, "A", 1).boxed(),
            Probe::new(&shared, "B", 0).boxed(),
        ];
        let builder = Processor::builder(list(steps)).default_interval(Duration::from_millis(100));

        let report = run_with(setup, builder, &shared).await.unwrap();

        assert_eq!(report.state, RunState::Done, "{setup:?}");
        assert_eq!(report.performs, 3, "{setup:?}");
        assert_eq!(shared.names(), vec!["A", "A", "B"], "{setup:?}");
        if setup != Setup::CallbackSameThread {
            assert!(report.elapsed >= Duration::from_millis(100), "{setup:?}");
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_after_first_step_stops_the_run() {
    for setup in ALL {
        let shared = Shared::default();
        let steps = vec![
            Probe::new(&shared, "one", 0).cancel_after(1).boxed(),
            Probe::new(&shared, "two", 0).boxed(),
            Probe::new(&shared, "three", 0).boxed(),
        ];

        let report = run_with(setup, Processor::builder(list(steps)), &shared)
            .await
            .unwrap();

        assert_eq!(report.state, RunState::Canceled, "{setup:?}");
        assert_eq!(report.performs, 1, "{setup:?}");
        assert_eq!(shared.names(), vec!["one"], "{setup:?}");
        assert_eq!(report.step("one").unwrap().outcome, StepOutcome::Completed);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_while_rescheduled_prevents_further_performs() {
    async fn check<S: Scheduler>(p: Processor<S>, shared: Shared) {
        let runner = p.clone();
        let blocking = match p.mode() {
            DriveMode::Blocking => Some(tokio::task::spawn_blocking(move || runner.run())),
            DriveMode::Callback => {
                runner.run().unwrap();
                None
            }
        };

        wait_for_state(&p, RunState::StepNeedsReschedule).await;
        p.cancel();
        let report = p.wait().await;
        if let Some(task) = blocking {
            let final_report = task.await.unwrap().unwrap();
            assert_eq!(final_report.state, RunState::Canceled);
        }

        // well past the 200ms reschedule delay
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(report.state, RunState::Canceled);
        assert_eq!(shared.entries().len(), 1);
        assert_eq!(report.step("slow").unwrap().outcome, StepOutcome::Canceled);
    }

    let steps = |shared: &Shared| {
        list(vec![
            Probe::new(shared, "slow", u32::MAX)
                .every(Duration::from_millis(200))
                .boxed(),
        ])
    };

    let shared = Shared::default();
    let p = Processor::builder(steps(&shared))
        .mode(DriveMode::Blocking)
        .build();
    check(p, shared).await;

    let shared = Shared::default();
    let p = Processor::builder(steps(&shared))
        .mode(DriveMode::Blocking)
        .scheduler(pooled())
        .build();
    check(p, shared).await;

    let shared = Shared::default();
    let p = Processor::builder(steps(&shared))
        .scheduler(pooled())
        .build();
    check(p, shared).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_runs_return_known_errors_unchanged() {
    for setup in [Setup::BlockingSameThread, Setup::BlockingPooled] {
        let shared = Shared::default();
        let steps = list(vec![
            Box::new(Failing {
                make: || Box::new(TaskError::Fail {
                    reason: "red build".into(),
                }),
            }) as BoxStep,
            Probe::new(&shared, "never", 0).boxed(),
        ]);

        let err = run_with(setup, Processor::builder(steps), &shared)
            .await
            .unwrap_err();
        match err {
            TaskError::Fail { reason } => assert_eq!(reason, "red build", "{setup:?}"),
            other => panic!("{setup:?}: unexpected {other:?}"),
        }
        assert!(shared.entries().is_empty(), "{setup:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_runs_wrap_foreign_errors() {
    for setup in [Setup::BlockingSameThread, Setup::BlockingPooled] {
        let shared = Shared::default();
        let steps = list(vec![Box::new(Failing {
            make: || Box::new(io::Error::new(io::ErrorKind::ConnectionRefused, "ci down")),
        }) as BoxStep]);

        let err = run_with(setup, Processor::builder(steps), &shared)
            .await
            .unwrap_err();
        let TaskError::Automation { source } = &err else {
            panic!("{setup:?}: expected automation error, got {err:?}");
        };
        let io_err = source.downcast_ref::<io::Error>().expect("original error kept");
        assert_eq!(io_err.kind(), io::ErrorKind::ConnectionRefused);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn callback_failures_reach_the_handler() {
    for setup in [Setup::CallbackSameThread, Setup::CallbackPooled] {
        let shared = Shared::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let steps = list(vec![
            Probe::new(&shared, "first", 0).boxed(),
            Box::new(Failing {
                make: || Box::new(io::Error::other("socket closed")),
            }) as BoxStep,
            Probe::new(&shared, "never", 0).boxed(),
        ]);
        let builder = Processor::builder(steps)
            .name("deploy")
            .on_failure(move |name: &str, err: &TaskError| {
                sink.lock()
                    .unwrap()
                    .push(format!("{name}:{}", err.as_label()));
            });

        let report = run_with(setup, builder, &shared).await.unwrap();

        assert_eq!(report.state, RunState::Failed, "{setup:?}");
        assert_eq!(*seen.lock().unwrap(), vec!["deploy:task_automation"]);
        assert_eq!(shared.names(), vec!["first"], "{setup:?}");
        assert_eq!(report.step("failing").unwrap().outcome, StepOutcome::Failed);
        assert_eq!(report.failure.unwrap().label, "task_automation");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lazy_sequence_is_fetched_after_the_previous_step() {
    for setup in ALL {
        let shared = Shared::default();
        let seq_shared = shared.clone();
        let fetched_after = Arc::new(Mutex::new(Vec::new()));
        let fetch_log = Arc::clone(&fetched_after);

        let seq = SequenceFn::new(move |index| {
            fetch_log.lock().unwrap().push(seq_shared.entries().len());
            (index < 3).then(|| Probe::new(&seq_shared, "gen", 0).boxed())
        });

        let report = run_with(setup, Processor::builder(seq), &shared)
            .await
            .unwrap();
        assert_eq!(report.performs, 3, "{setup:?}");
        assert_eq!(*fetched_after.lock().unwrap(), vec![0, 1, 2, 3], "{setup:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn events_follow_the_transitions() {
    let shared = Shared::default();
    let steps = list(vec![
        Probe::new(&shared, "A", 1).boxed(),
        Probe::new(&shared, "B", 0).boxed(),
    ]);
    let p = Processor::builder(steps)
        .name("events")
        .mode(DriveMode::Blocking)
        .default_interval(Duration::from_millis(10))
        .publish_events()
        .build();
    let mut rx = p.subscribe().unwrap();

    drive(p, &shared).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        seen.push((ev.kind, ev.step.as_deref().map(str::to_string), ev.invocation));
    }
    let step = |s: &str| Some(s.to_string());
    assert_eq!(
        seen,
        vec![
            (EventKind::RunStarted, None, None),
            (EventKind::StepStarting, step("A"), Some(1)),
            (EventKind::StepRescheduled, step("A"), Some(1)),
            (EventKind::StepStarting, step("A"), Some(2)),
            (EventKind::StepCompleted, step("A"), Some(2)),
            (EventKind::StepStarting, step("B"), Some(1)),
            (EventKind::StepCompleted, step("B"), Some(1)),
            (EventKind::RunCompleted, None, Some(3)),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn listeners_see_every_invocation() {
    #[derive(Default)]
    struct Seen(Mutex<Vec<(u32, bool)>>);

    impl StepListener for Seen {
        fn on_complete(&self, n: &StepNotice<'_>) {
            self.0.lock().unwrap().push((n.invocation, n.rescheduling));
        }
    }

    let shared = Shared::default();
    let listener = Arc::new(Seen::default());
    let steps = list(vec![
        Probe::new(&shared, "watched", 2)
            .observe(listener.clone())
            .boxed(),
    ]);
    let builder = Processor::builder(steps).default_interval(Duration::from_millis(1));

    run_with(Setup::CallbackPooled, builder, &shared).await.unwrap();
    assert_eq!(
        *listener.0.lock().unwrap(),
        vec![(1, true), (2, true), (3, false)]
    );
}
