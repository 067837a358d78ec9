use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use rtam::{
    AppDescriptor, AppError, AppFlags, AppStatus, Config, DeferredConfig, DeferredQueue, EventKind,
    LaunchError, Lifecycle, Orchestrator, Registry, RuntimeError, Started, TerminateError,
};

// ---- helpers ---------------------------------------------------------------

/// Shared record of hook calls, e.g. `["start:storage", "start:gui"]`.
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn log(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.all()
            .into_iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }

    fn count(&self, entry: &str) -> usize {
        self.all().iter().filter(|e| *e == entry).count()
    }
}

/// Recording lifecycle with switchable failures.
struct Recorder {
    name: &'static str,
    journal: Journal,
    fail_start: bool,
    fail_suspend: bool,
    pending: bool,
    stop_takes: Option<Duration>,
    yield_in_hooks: bool,
}

impl Recorder {
    fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: journal.clone(),
            fail_start: false,
            fail_suspend: false,
            pending: false,
            stop_takes: None,
            yield_in_hooks: false,
        }
    }

    async fn hook(&self, what: &str) {
        self.journal.log(format!("{what}:{}", self.name));
        if self.yield_in_hooks {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl Lifecycle for Recorder {
    async fn start(&self) -> Result<Started, AppError> {
        self.hook("start").await;
        if self.fail_start {
            return Err(AppError::fail("boom"));
        }
        Ok(if self.pending {
            Started::Pending
        } else {
            Started::Running
        })
    }

    async fn stop(&self) -> Result<(), AppError> {
        self.hook("stop").await;
        if let Some(d) = self.stop_takes {
            tokio::time::sleep(d).await;
        }
        Ok(())
    }

    async fn suspend(&self) -> Result<(), AppError> {
        self.hook("suspend").await;
        if self.fail_suspend {
            return Err(AppError::busy("display"));
        }
        Ok(())
    }

    async fn resume(&self) -> Result<(), AppError> {
        self.hook("resume").await;
        Ok(())
    }
}

fn app(
    journal: &Journal,
    name: &'static str,
    flags: AppFlags,
    requires: &[&'static str],
    tweak: impl FnOnce(&mut Recorder),
) -> AppDescriptor {
    let mut recorder = Recorder::new(name, journal);
    tweak(&mut recorder);
    AppDescriptor::builder(name)
        .flags(flags)
        .requires(requires.iter().copied())
        .lifecycle(Arc::new(recorder))
        .build()
}

fn plain(journal: &Journal, name: &'static str, flags: AppFlags, requires: &[&'static str]) -> AppDescriptor {
    app(journal, name, flags, requires, |_| {})
}

fn no_home() -> Config {
    Config {
        home: None,
        ..Config::default()
    }
}

fn build(apps: Vec<AppDescriptor>, cfg: Config) -> Arc<Orchestrator> {
    let registry = Registry::from_descriptors(apps).unwrap();
    Orchestrator::builder(registry).with_config(cfg).build()
}

const SERVICE: AppFlags = AppFlags::SERVICE;
const BOOT_SERVICE: AppFlags = AppFlags::AUTO_START.union(AppFlags::SERVICE);
const FG: AppFlags = AppFlags::empty();
const BG: AppFlags = AppFlags::BACKGROUND_CAPABLE;

// ---- core properties -----------------------------------------------------------

#[tokio::test]
async fn launch_is_idempotent() {
    let j = Journal::default();
    let rtam = build(vec![plain(&j, "pwm", FG, &[])], no_home());

    rtam.launch("pwm").await.unwrap();
    rtam.launch("pwm").await.unwrap();

    assert_eq!(j.count("start:pwm"), 1);
    assert_eq!(rtam.get_status("pwm").await.unwrap(), AppStatus::Running);
    assert_eq!(rtam.foreground().await.as_deref(), Some("pwm"));
}

#[tokio::test]
async fn dependencies_start_in_topological_order() {
    let j = Journal::default();
    let rtam = build(
        vec![
            plain(&j, "a", SERVICE, &["b"]),
            plain(&j, "b", SERVICE, &["c"]),
            plain(&j, "c", SERVICE, &[]),
        ],
        no_home(),
    );

    rtam.launch("a").await.unwrap();
    assert_eq!(j.with_prefix("start:"), ["c", "b", "a"]);
    for name in ["a", "b", "c"] {
        assert_eq!(rtam.get_status(name).await.unwrap(), AppStatus::Running);
    }
}

#[tokio::test]
async fn cycle_is_reported_once_and_the_rest_still_boots() {
    let j = Journal::default();
    let rtam = build(
        vec![
            plain(&j, "a", BOOT_SERVICE, &["b"]),
            plain(&j, "b", BOOT_SERVICE, &["a"]),
            plain(&j, "c", BOOT_SERVICE, &[]),
        ],
        no_home(),
    );
    let mut events = rtam.subscribe();

    let report = rtam.initialize().await;

    assert_eq!(report.cycles.len(), 1);
    let mut members = report.cycles[0].clone();
    members.sort();
    assert_eq!(members, ["a", "b"]);
    assert_eq!(report.started, ["c"]);
    assert!(
        report
            .failed
            .iter()
            .all(|(_, e)| matches!(e, LaunchError::Cycle { .. }))
    );

    assert_eq!(rtam.get_status("a").await.unwrap(), AppStatus::Stopped);
    assert_eq!(rtam.get_status("b").await.unwrap(), AppStatus::Stopped);
    assert_eq!(rtam.get_status("c").await.unwrap(), AppStatus::Running);
    assert_eq!(j.with_prefix("start:"), ["c"]);

    let ps = rtam.ps().await;
    assert_eq!(ps.get("a").and_then(|r| r.reason.as_deref()), Some("dependency cycle"));

    let mut saw_cycle = false;
    while let Ok(ev) = events.try_recv() {
        saw_cycle |= ev.kind == EventKind::DependencyCycle;
    }
    assert!(saw_cycle);
}

#[tokio::test]
async fn failed_dependency_is_isolated() {
    let j = Journal::default();
    let rtam = build(
        vec![
            plain(&j, "a", SERVICE, &["b"]),
            app(&j, "b", SERVICE, &[], |p| p.fail_start = true),
            plain(&j, "unrelated", SERVICE, &[]),
        ],
        no_home(),
    );
    rtam.launch("unrelated").await.unwrap();

    let err = rtam.launch("a").await.unwrap_err();
    match &err {
        LaunchError::Dependency { app, dependency, .. } => {
            assert_eq!(app, "a");
            assert_eq!(dependency, "b");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(err.root_cause(), LaunchError::Start { app, .. } if app == "b"));

    assert_eq!(rtam.get_status("a").await.unwrap(), AppStatus::Stopped);
    assert_eq!(rtam.get_status("b").await.unwrap(), AppStatus::Stopped);
    assert_eq!(rtam.get_status("unrelated").await.unwrap(), AppStatus::Running);
    assert_eq!(j.count("start:a"), 0);

    let ps = rtam.ps().await;
    assert_eq!(ps.get("a").and_then(|r| r.reason.as_deref()), Some("dependency unmet: b"));
}

#[tokio::test]
async fn boot_isolates_a_failed_dependency() {
    let j = Journal::default();
    let rtam = build(
        vec![
            app(&j, "storage", BOOT_SERVICE, &[], |p| p.fail_start = true),
            plain(&j, "gui", BOOT_SERVICE, &["storage"]),
            plain(&j, "wifi", BOOT_SERVICE, &[]),
        ],
        no_home(),
    );

    let report = rtam.initialize().await;

    assert!(!report.is_clean());
    assert_eq!(report.started, ["wifi"]);
    let failed: Vec<&str> = report.failed.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(failed, ["storage", "gui"]);
    assert!(matches!(
        &report.failed[1].1,
        LaunchError::Dependency { dependency, .. } if dependency == "storage"
    ));
    assert!(report.cycles.is_empty());

    assert_eq!(rtam.get_status("storage").await.unwrap(), AppStatus::Stopped);
    assert_eq!(rtam.get_status("gui").await.unwrap(), AppStatus::Stopped);
    assert_eq!(rtam.get_status("wifi").await.unwrap(), AppStatus::Running);
    assert_eq!(j.count("start:gui"), 0);

    let ps = rtam.ps().await;
    assert_eq!(
        ps.get("gui").and_then(|r| r.reason.as_deref()),
        Some("dependency unmet: storage")
    );
}

#[tokio::test]
async fn dependencies_started_by_a_failed_launch_stay_up() {
    let j = Journal::default();
    let rtam = build(
        vec![
            plain(&j, "a", FG, &["c", "b"]),
            app(&j, "b", SERVICE, &[], |p| p.fail_start = true),
            plain(&j, "c", SERVICE, &[]),
        ],
        no_home(),
    );

    let err = rtam.launch("a").await.unwrap_err();

    assert!(matches!(err, LaunchError::Dependency { ref dependency, .. } if dependency == "b"));
    assert_eq!(j.with_prefix("start:"), ["c", "b"]);
    assert_eq!(rtam.get_status("c").await.unwrap(), AppStatus::Running);
    assert_eq!(rtam.get_status("b").await.unwrap(), AppStatus::Stopped);
    assert_eq!(rtam.get_status("a").await.unwrap(), AppStatus::Stopped);
    assert_eq!(j.count("stop:c"), 0);
}

#[tokio::test]
async fn device_boot_starts_services_in_order() {
    let j = Journal::default();
    let rtam = build(
        vec![
            plain(&j, "storage", BOOT_SERVICE, &[]),
            plain(&j, "gui", BOOT_SERVICE, &["storage"]),
            plain(&j, "launcher", BOOT_SERVICE, &["gui"]),
        ],
        no_home(),
    );

    let report = rtam.initialize().await;

    assert!(report.is_clean());
    assert_eq!(report.started, ["storage", "gui", "launcher"]);
    assert_eq!(j.with_prefix("start:"), ["storage", "gui", "launcher"]);
    for name in ["storage", "gui", "launcher"] {
        assert_eq!(rtam.get_status(name).await.unwrap(), AppStatus::Running);
    }
}

#[tokio::test]
async fn conflicting_apps_are_refused() {
    let j = Journal::default();
    let pwm = AppDescriptor::builder("pwm")
        .conflicts_with(["serial_debug"])
        .lifecycle(Arc::new(Recorder::new("pwm", &j)))
        .build();
    let rtam = build(vec![pwm, plain(&j, "serial_debug", FG, &[])], no_home());

    rtam.launch("pwm").await.unwrap();
    let err = rtam.launch("serial_debug").await.unwrap_err();

    assert_eq!(
        err,
        LaunchError::Conflict {
            app: "serial_debug".into(),
            running: "pwm".into()
        }
    );
    assert_eq!(rtam.get_status("pwm").await.unwrap(), AppStatus::Running);
    assert_eq!(rtam.get_status("serial_debug").await.unwrap(), AppStatus::Stopped);
    assert_eq!(j.count("start:serial_debug"), 0);

    rtam.terminate("pwm").await.unwrap();
    rtam.launch("serial_debug").await.unwrap();
}

#[tokio::test]
async fn conflict_is_refused_before_dependencies_start() {
    let j = Journal::default();
    let pwm = AppDescriptor::builder("pwm")
        .conflicts_with(["serial_debug"])
        .lifecycle(Arc::new(Recorder::new("pwm", &j)))
        .build();
    let rtam = build(
        vec![
            pwm,
            plain(&j, "uart", SERVICE, &[]),
            plain(&j, "serial_debug", FG, &["uart"]),
        ],
        no_home(),
    );

    rtam.launch("pwm").await.unwrap();
    let err = rtam.launch("serial_debug").await.unwrap_err();

    assert_eq!(
        err,
        LaunchError::Conflict {
            app: "serial_debug".into(),
            running: "pwm".into()
        }
    );
    assert_eq!(j.with_prefix("start:"), ["pwm"]);
    assert_eq!(rtam.get_status("uart").await.unwrap(), AppStatus::Stopped);
    assert_eq!(rtam.foreground().await.as_deref(), Some("pwm"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_operations_keep_one_foreground_app() {
    let j = Journal::default();
    let yielding = |p: &mut Recorder| p.yield_in_hooks = true;
    let pwm = AppDescriptor::builder("pwm")
        .conflicts_with(["serial_debug"])
        .lifecycle(Arc::new(Recorder {
            yield_in_hooks: true,
            ..Recorder::new("pwm", &j)
        }))
        .build();
    let rtam = build(
        vec![
            pwm,
            app(&j, "serial_debug", FG, &[], yielding),
            app(&j, "multimeter", BG, &[], yielding),
            app(&j, "weather", FG, &[], yielding),
        ],
        no_home(),
    );

    let done = Arc::new(AtomicBool::new(false));
    let violations = Arc::new(AtomicUsize::new(0));

    let monitor = {
        let (rtam, done, violations) = (rtam.clone(), done.clone(), violations.clone());
        tokio::spawn(async move {
            while !done.load(Ordering::SeqCst) {
                let ps = rtam.ps().await;
                let running_fg = ps
                    .rows
                    .iter()
                    .filter(|r| !r.flags.contains(AppFlags::SERVICE) && r.status == AppStatus::Running)
                    .count();
                let marked_fg = ps.rows.iter().filter(|r| r.foreground).count();
                let both = ps.get("pwm").is_some_and(|r| r.status.is_active())
                    && ps.get("serial_debug").is_some_and(|r| r.status.is_active());
                if running_fg > 1 || marked_fg > 1 || both {
                    violations.fetch_add(1, Ordering::SeqCst);
                }
                tokio::task::yield_now().await;
            }
        })
    };

    let names = ["pwm", "serial_debug", "multimeter", "weather"];
    let mut workers = Vec::new();
    for w in 0..8usize {
        let rtam = rtam.clone();
        workers.push(tokio::spawn(async move {
            for i in 0..25usize {
                let name = names[(w * 3 + i) % names.len()];
                match (w + i) % 3 {
                    0 | 1 => {
                        let _ = rtam.launch(name).await;
                    }
                    _ => {
                        let _ = rtam.exit(name).await;
                    }
                }
            }
        }));
    }
    for w in workers {
        w.await.unwrap();
    }
    done.store(true, Ordering::SeqCst);
    monitor.await.unwrap();

    assert_eq!(violations.load(Ordering::SeqCst), 0);
    let ps = rtam.ps().await;
    assert!(ps.rows.iter().filter(|r| r.foreground).count() <= 1);
}

// ---- foreground slot and navigation ---------------------------------------------

#[tokio::test]
async fn background_app_is_suspended_and_resumed_on_exit() {
    let j = Journal::default();
    let rtam = build(
        vec![plain(&j, "multimeter", BG, &[]), plain(&j, "pwm", FG, &[])],
        no_home(),
    );

    rtam.launch("multimeter").await.unwrap();
    rtam.launch("pwm").await.unwrap();
    assert_eq!(rtam.get_status("multimeter").await.unwrap(), AppStatus::Suspended);
    assert_eq!(rtam.navigation().await, ["multimeter"]);

    rtam.exit("pwm").await.unwrap();

    assert_eq!(
        j.all(),
        [
            "start:multimeter",
            "suspend:multimeter",
            "start:pwm",
            "stop:pwm",
            "resume:multimeter"
        ]
    );
    assert_eq!(rtam.foreground().await.as_deref(), Some("multimeter"));
    assert_eq!(rtam.get_status("pwm").await.unwrap(), AppStatus::Stopped);
    assert!(rtam.navigation().await.is_empty());
}

#[tokio::test]
async fn exit_sends_background_app_away_and_launch_resumes_it() {
    let j = Journal::default();
    let rtam = build(vec![plain(&j, "multimeter", BG, &[])], no_home());

    rtam.launch("multimeter").await.unwrap();
    rtam.exit("multimeter").await.unwrap();
    assert_eq!(rtam.get_status("multimeter").await.unwrap(), AppStatus::Suspended);
    assert_eq!(rtam.foreground().await, None);

    rtam.launch("multimeter").await.unwrap();
    assert_eq!(j.count("resume:multimeter"), 1);
    assert_eq!(j.count("start:multimeter"), 1);
    assert_eq!(rtam.foreground().await.as_deref(), Some("multimeter"));
}

#[tokio::test]
async fn failed_preemption_keeps_the_occupant() {
    let j = Journal::default();
    let rtam = build(
        vec![
            app(&j, "multimeter", BG, &[], |p| p.fail_suspend = true),
            plain(&j, "pwm", FG, &[]),
        ],
        no_home(),
    );

    rtam.launch("multimeter").await.unwrap();
    let err = rtam.launch("pwm").await.unwrap_err();

    assert!(matches!(
        &err,
        LaunchError::Preemption { occupant, .. } if occupant == "multimeter"
    ));
    assert_eq!(err.as_label(), "launch_preemption");
    assert_eq!(rtam.foreground().await.as_deref(), Some("multimeter"));
    assert_eq!(rtam.get_status("multimeter").await.unwrap(), AppStatus::Running);
    assert_eq!(rtam.get_status("pwm").await.unwrap(), AppStatus::Stopped);
    assert_eq!(j.count("start:pwm"), 0);
}

#[tokio::test]
async fn occupant_needed_as_a_dependency_keeps_running() {
    let j = Journal::default();
    let rtam = build(
        vec![plain(&j, "b", FG, &[]), plain(&j, "a", FG, &["b"])],
        no_home(),
    );

    rtam.launch("a").await.unwrap();

    assert_eq!(j.all(), ["start:b", "start:a"]);
    assert_eq!(rtam.get_status("b").await.unwrap(), AppStatus::Running);
    assert_eq!(rtam.get_status("a").await.unwrap(), AppStatus::Running);
    assert_eq!(rtam.foreground().await.as_deref(), Some("a"));
    assert!(rtam.navigation().await.is_empty());

    let err = rtam.terminate("b").await.unwrap_err();
    assert!(matches!(err, TerminateError::InUse { ref dependents, .. } if dependents == &["a"]));
}

#[tokio::test]
async fn failed_start_hands_the_foreground_back() {
    let j = Journal::default();
    let rtam = build(
        vec![
            plain(&j, "multimeter", BG, &[]),
            app(&j, "weather", FG, &[], |p| p.fail_start = true),
        ],
        no_home(),
    );

    rtam.launch("multimeter").await.unwrap();
    let err = rtam.launch("weather").await.unwrap_err();

    assert!(matches!(err, LaunchError::Start { .. }));
    assert_eq!(rtam.foreground().await.as_deref(), Some("multimeter"));
    assert_eq!(rtam.get_status("multimeter").await.unwrap(), AppStatus::Running);
    assert_eq!(j.count("resume:multimeter"), 1);
}

#[tokio::test]
async fn terminate_returns_to_home() {
    let j = Journal::default();
    let rtam = build(
        vec![
            plain(&j, "gui", BOOT_SERVICE, &[]),
            plain(&j, "launcher", AppFlags::AUTO_START, &["gui"]),
            plain(&j, "pwm", FG, &["gui"]),
        ],
        Config::default(),
    );
    rtam.initialize().await;
    assert_eq!(rtam.foreground().await.as_deref(), Some("launcher"));

    rtam.launch("pwm").await.unwrap();
    assert_eq!(rtam.get_status("launcher").await.unwrap(), AppStatus::Stopped);

    rtam.terminate("pwm").await.unwrap();
    assert_eq!(rtam.foreground().await.as_deref(), Some("launcher"));
    assert_eq!(j.count("start:launcher"), 2);
}

#[tokio::test]
async fn home_clears_the_navigation_stack() {
    let j = Journal::default();
    let rtam = build(
        vec![
            plain(&j, "launcher", FG, &[]),
            plain(&j, "multimeter", BG, &[]),
            plain(&j, "weather", BG, &[]),
            plain(&j, "pwm", FG, &[]),
        ],
        Config::default(),
    );

    rtam.launch("multimeter").await.unwrap();
    rtam.launch("weather").await.unwrap();
    rtam.launch("pwm").await.unwrap();
    assert_eq!(rtam.navigation().await, ["multimeter", "weather"]);

    rtam.back().await.unwrap();
    assert_eq!(rtam.foreground().await.as_deref(), Some("weather"));

    rtam.home().await.unwrap();
    assert_eq!(rtam.foreground().await.as_deref(), Some("launcher"));
    assert!(rtam.navigation().await.is_empty());
    assert_eq!(rtam.get_status("multimeter").await.unwrap(), AppStatus::Suspended);
    assert_eq!(rtam.get_status("weather").await.unwrap(), AppStatus::Suspended);
}

// ---- terminate -------------------------------------------------------------------

#[tokio::test]
async fn terminating_a_used_dependency_needs_force() {
    let j = Journal::default();
    let rtam = build(
        vec![
            plain(&j, "storage", SERVICE, &[]),
            plain(&j, "gui", SERVICE, &["storage"]),
        ],
        no_home(),
    );
    rtam.launch("gui").await.unwrap();

    let err = rtam.terminate("storage").await.unwrap_err();
    assert_eq!(
        err,
        TerminateError::InUse {
            app: "storage".into(),
            dependents: vec!["gui".into()]
        }
    );
    assert_eq!(rtam.get_status("storage").await.unwrap(), AppStatus::Running);

    rtam.force_terminate("storage").await.unwrap();
    assert_eq!(rtam.get_status("storage").await.unwrap(), AppStatus::Stopped);
    assert_eq!(rtam.get_status("gui").await.unwrap(), AppStatus::Running);

    // stopped already: no-op
    rtam.terminate("storage").await.unwrap();
    assert_eq!(j.count("stop:storage"), 1);
}

#[tokio::test]
async fn unknown_names_are_errors() {
    let rtam = build(Vec::new(), no_home());
    assert!(rtam.get_status("ghost").await.is_err());
    assert!(matches!(
        rtam.launch("ghost").await,
        Err(LaunchError::Unknown(_))
    ));
    assert!(matches!(
        rtam.terminate("ghost").await,
        Err(TerminateError::Unknown(_))
    ));
}

#[tokio::test]
async fn listing_skips_services_and_keeps_declaration_order() {
    let j = Journal::default();
    let rtam = build(
        vec![
            plain(&j, "storage", SERVICE, &[]),
            plain(&j, "pwm", FG, &[]),
            plain(&j, "multimeter", BG, &[]),
        ],
        no_home(),
    );
    let names: Vec<String> = rtam
        .list_applications()
        .iter()
        .map(|d| d.name().to_string())
        .collect();
    assert_eq!(names, ["pwm", "multimeter"]);
}

// ---- pending starts ---------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn launch_waits_for_a_pending_dependency() {
    let j = Journal::default();
    let rtam = build(
        vec![
            app(&j, "wifi", SERVICE, &[], |p| p.pending = true),
            plain(&j, "weather", FG, &["wifi"]),
        ],
        no_home(),
    );

    let reporter = {
        let rtam = rtam.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            rtam.mark_running("wifi").await.unwrap()
        })
    };

    rtam.launch("weather").await.unwrap();
    assert!(reporter.await.unwrap());
    assert_eq!(rtam.get_status("wifi").await.unwrap(), AppStatus::Running);
    assert_eq!(rtam.get_status("weather").await.unwrap(), AppStatus::Running);
}

#[tokio::test(start_paused = true)]
async fn pending_dependency_times_out_or_fails() {
    let j = Journal::default();
    let rtam = build(
        vec![
            app(&j, "wifi", SERVICE, &[], |p| p.pending = true),
            plain(&j, "weather", FG, &["wifi"]),
        ],
        no_home(),
    );

    let err = rtam.launch("weather").await.unwrap_err();
    assert_eq!(
        err,
        LaunchError::DependencyTimeout {
            app: "weather".into(),
            dependency: "wifi".into(),
            waited: Config::default().dependency_wait,
        }
    );
    assert_eq!(rtam.get_status("wifi").await.unwrap(), AppStatus::Starting);

    // Launching the pending app itself is a no-op.
    rtam.launch("wifi").await.unwrap();
    assert_eq!(j.count("start:wifi"), 1);

    let reporter = {
        let rtam = rtam.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            rtam.mark_failed("wifi", "no access point").await.unwrap()
        })
    };
    let err = rtam.launch("weather").await.unwrap_err();
    assert!(reporter.await.unwrap());
    assert!(matches!(err.root_cause(), LaunchError::Start { app, .. } if app == "wifi"));
    assert_eq!(rtam.get_status("wifi").await.unwrap(), AppStatus::Stopped);
    assert!(!rtam.mark_running("wifi").await.unwrap());
}

// ---- hooks observing the orchestrator ----------------------------------------------

struct Introspect {
    rtam: OnceLock<Weak<Orchestrator>>,
    seen: Mutex<Option<AppStatus>>,
}

#[async_trait]
impl Lifecycle for Introspect {
    async fn start(&self) -> Result<Started, AppError> {
        let rtam = self
            .rtam
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| AppError::fail("orchestrator gone"))?;
        let status = rtam
            .get_status("recorder")
            .await
            .map_err(|e| AppError::fail(e.to_string()))?;
        *self.seen.lock().unwrap() = Some(status);
        Ok(Started::Running)
    }
}

#[tokio::test]
async fn hooks_can_query_status_while_starting() {
    let hook = Arc::new(Introspect {
        rtam: OnceLock::new(),
        seen: Mutex::new(None),
    });
    let registry = Registry::from_descriptors([AppDescriptor::builder("recorder")
        .flags(SERVICE)
        .lifecycle(hook.clone())
        .build()])
    .unwrap();
    let rtam = Orchestrator::builder(registry).with_config(no_home()).build();
    hook.rtam.set(Arc::downgrade(&rtam)).unwrap();

    rtam.launch("recorder").await.unwrap();
    assert_eq!(*hook.seen.lock().unwrap(), Some(AppStatus::Starting));
}

// ---- shutdown ----------------------------------------------------------------------

#[tokio::test]
async fn shutdown_stops_dependents_before_dependencies() {
    let j = Journal::default();
    let rtam = build(
        vec![
            plain(&j, "storage", BOOT_SERVICE, &[]),
            plain(&j, "gui", BOOT_SERVICE, &["storage"]),
            plain(&j, "pwm", FG, &["gui"]),
        ],
        no_home(),
    );
    rtam.initialize().await;
    rtam.launch("pwm").await.unwrap();

    rtam.shutdown().await.unwrap();

    assert_eq!(j.with_prefix("stop:"), ["pwm", "gui", "storage"]);
    assert!(rtam.ps().await.rows.iter().all(|r| r.status == AppStatus::Stopped));
    assert_eq!(rtam.foreground().await, None);
}

#[tokio::test(start_paused = true)]
async fn shutdown_reports_apps_stuck_past_grace() {
    let j = Journal::default();
    let rtam = build(
        vec![
            plain(&j, "storage", BOOT_SERVICE, &[]),
            app(&j, "flash_writer", BOOT_SERVICE, &[], |p| {
                p.stop_takes = Some(Duration::from_secs(60))
            }),
        ],
        Config {
            grace: Duration::from_secs(1),
            ..no_home()
        },
    );
    rtam.initialize().await;

    let err = rtam.shutdown().await.unwrap_err();
    match err {
        RuntimeError::GraceExceeded { grace, stuck } => {
            assert_eq!(grace, Duration::from_secs(1));
            assert_eq!(stuck, ["storage", "flash_writer"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ---- deferred queue as a service --------------------------------------------------

#[tokio::test]
async fn deferred_queue_runs_as_a_service() {
    let queue = DeferredQueue::new(DeferredConfig::default());
    let registry = Registry::from_descriptors([AppDescriptor::builder("cpost")
        .flags(BOOT_SERVICE)
        .lifecycle(Arc::new(queue.clone()))
        .build()])
    .unwrap();
    let rtam = Orchestrator::builder(registry).with_config(no_home()).build();

    rtam.initialize().await;
    assert!(queue.is_running());

    rtam.terminate("cpost").await.unwrap();
    assert!(!queue.is_running());
}
