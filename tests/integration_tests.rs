//! Integration tests for stacksup
//!
//! These tests drive the supervisor's phase sequencing and shutdown state
//! machine against fake build/launch/configure collaborators; no processes
//! are spawned and no interfaces are touched.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nix::sys::signal::Signal;
use stacksup::{
    BuildStep, ChildHandle, InterfaceConfig, Launcher, NetConfigurer, Result, StackExit,
    Supervisor, SupervisorConfig, SupervisorError, SupervisorState,
};

static INTEGRATION_TEST_LOCK: Mutex<()> = Mutex::new(());

/// Shared record of every collaborator call the supervisor makes
#[derive(Default)]
struct Recorder {
    build_calls: AtomicU32,
    launch_calls: AtomicU32,
    exists_polls: AtomicU32,
    addresses_added: Mutex<Vec<(String, String)>>,
    links_upped: Mutex<Vec<String>>,
    sigterms: AtomicU32,
    sigkills: AtomicU32,
}

struct FakeBuild {
    recorder: Arc<Recorder>,
    fail: bool,
}

impl BuildStep for FakeBuild {
    fn build(&self) -> Result<PathBuf> {
        self.recorder.build_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(SupervisorError::Build(
                "cargo build --release exited with exit status: 101".to_string(),
            ))
        } else {
            Ok(PathBuf::from("/fake/netstack"))
        }
    }
}

/// Scripted behavior of the fake stack process
#[derive(Clone, Copy)]
enum ChildPlan {
    /// Exit on its own with this code after the given number of polls
    ExitAfterPolls { polls: u32, code: i32 },
    /// Run until signaled; optionally ignore SIGTERM so SIGKILL must follow
    RunUntilSignaled {
        polls_after_term: u32,
        ignore_term: bool,
    },
}

struct FakeChild {
    recorder: Arc<Recorder>,
    plan: ChildPlan,
    polls_seen: u32,
    term_received: bool,
    killed: bool,
    reaped: bool,
}

impl ChildHandle for FakeChild {
    fn pid(&self) -> u32 {
        4242
    }

    fn try_wait(&mut self) -> Result<Option<StackExit>> {
        if self.reaped {
            return Err(SupervisorError::NotRunning);
        }

        let exit = match self.plan {
            ChildPlan::ExitAfterPolls { polls, code } => {
                if self.polls_seen >= polls {
                    Some(StackExit::from_code(code))
                } else {
                    self.polls_seen += 1;
                    None
                }
            }
            ChildPlan::RunUntilSignaled {
                polls_after_term,
                ignore_term,
            } => {
                if self.killed {
                    Some(StackExit::from_signal(9))
                } else if self.term_received && !ignore_term {
                    if self.polls_seen >= polls_after_term {
                        Some(StackExit::from_signal(15))
                    } else {
                        self.polls_seen += 1;
                        None
                    }
                } else {
                    None
                }
            }
        };

        if exit.is_some() {
            self.reaped = true;
        }
        Ok(exit)
    }

    fn signal(&mut self, signal: Signal) -> Result<()> {
        match signal {
            Signal::SIGTERM => {
                self.recorder.sigterms.fetch_add(1, Ordering::SeqCst);
                self.term_received = true;
                self.polls_seen = 0;
            }
            Signal::SIGKILL => {
                self.recorder.sigkills.fetch_add(1, Ordering::SeqCst);
                self.killed = true;
            }
            _ => {}
        }
        Ok(())
    }
}

struct FakeLauncher {
    recorder: Arc<Recorder>,
    deny: bool,
    plan: ChildPlan,
}

impl Launcher for FakeLauncher {
    fn launch(&self, binary: &Path) -> Result<Box<dyn ChildHandle>> {
        self.recorder.launch_calls.fetch_add(1, Ordering::SeqCst);
        if self.deny {
            return Err(SupervisorError::Launch(format!(
                "permission denied executing {}",
                binary.display()
            )));
        }
        Ok(Box::new(FakeChild {
            recorder: Arc::clone(&self.recorder),
            plan: self.plan,
            polls_seen: 0,
            term_received: false,
            killed: false,
            reaped: false,
        }))
    }
}

struct FakeNet {
    recorder: Arc<Recorder>,
    /// Number of existence polls before the interface "appears"
    appears_after: u32,
}

impl NetConfigurer for FakeNet {
    fn interface_exists(&self, _name: &str) -> bool {
        let polls = self.recorder.exists_polls.fetch_add(1, Ordering::SeqCst) + 1;
        polls > self.appears_after
    }

    fn add_address(&self, config: &InterfaceConfig) -> Result<()> {
        self.recorder
            .addresses_added
            .lock()
            .unwrap()
            .push((config.name.clone(), config.cidr()));
        Ok(())
    }

    fn set_link_up(&self, name: &str) -> Result<()> {
        self.recorder.links_upped.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

fn test_config() -> SupervisorConfig {
    SupervisorConfig {
        interface: InterfaceConfig::new("tun9", "10.9.8.7".parse().unwrap(), 24),
        ready_timeout_ms: 200,
        poll_interval_ms: 1,
        term_grace_ms: 1_000,
    }
}

fn supervisor_with(
    recorder: &Arc<Recorder>,
    config: SupervisorConfig,
    build_fail: bool,
    launch_deny: bool,
    plan: ChildPlan,
    appears_after: u32,
) -> Supervisor {
    Supervisor::with_collaborators(
        config,
        Box::new(FakeBuild {
            recorder: Arc::clone(recorder),
            fail: build_fail,
        }),
        Box::new(FakeLauncher {
            recorder: Arc::clone(recorder),
            deny: launch_deny,
            plan,
        }),
        Box::new(FakeNet {
            recorder: Arc::clone(recorder),
            appears_after,
        }),
    )
}

/// Provisioning applies exactly the configured address and brings the link up
#[test]
fn test_provisioning_applies_configured_address() {
    let _lock = INTEGRATION_TEST_LOCK.lock();
    let recorder = Arc::new(Recorder::default());

    let mut supervisor = supervisor_with(
        &recorder,
        test_config(),
        false,
        false,
        ChildPlan::ExitAfterPolls { polls: 1, code: 0 },
        0,
    );

    let exit = supervisor.run().expect("run");
    assert!(exit.success());

    let addresses = recorder.addresses_added.lock().unwrap();
    assert_eq!(addresses.as_slice(), &[("tun9".to_string(), "10.9.8.7/24".to_string())]);
    let links = recorder.links_upped.lock().unwrap();
    assert_eq!(links.as_slice(), &["tun9".to_string()]);
}

/// If the build step fails, the launch step is never invoked
#[test]
fn test_failing_build_never_launches() {
    let _lock = INTEGRATION_TEST_LOCK.lock();
    let recorder = Arc::new(Recorder::default());

    let mut supervisor = supervisor_with(
        &recorder,
        test_config(),
        true,
        false,
        ChildPlan::ExitAfterPolls { polls: 0, code: 0 },
        0,
    );

    match supervisor.run() {
        Err(SupervisorError::Build(_)) => {}
        other => panic!("expected Build error, got {:?}", other.map(|e| e.status_code())),
    }

    assert_eq!(recorder.build_calls.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.launch_calls.load(Ordering::SeqCst), 0);
    assert_eq!(recorder.exists_polls.load(Ordering::SeqCst), 0);
}

/// If the child never creates the interface, provisioning fails with
/// InterfaceNotReady within the configured timeout
#[test]
fn test_interface_never_ready_times_out() {
    let _lock = INTEGRATION_TEST_LOCK.lock();
    let recorder = Arc::new(Recorder::default());

    let mut config = test_config();
    config.ready_timeout_ms = 30;
    config.term_grace_ms = 50;

    let mut supervisor = supervisor_with(
        &recorder,
        config,
        false,
        false,
        ChildPlan::RunUntilSignaled {
            polls_after_term: 0,
            ignore_term: false,
        },
        u32::MAX,
    );

    match supervisor.run() {
        Err(SupervisorError::InterfaceNotReady { name, waited }) => {
            assert_eq!(name, "tun9");
            assert!(waited >= Duration::from_millis(30));
        }
        other => panic!("expected InterfaceNotReady, got {:?}", other.map(|e| e.status_code())),
    }

    // The orphaned child was torn down, and no configuration was attempted
    assert_eq!(recorder.sigterms.load(Ordering::SeqCst), 1);
    assert!(recorder.addresses_added.lock().unwrap().is_empty());
    assert_eq!(supervisor.state(), SupervisorState::Terminated);
}

/// One shutdown signal kills the child exactly once; re-entrant deliveries
/// while shutting down add nothing
#[test]
fn test_shutdown_signal_kills_exactly_once() {
    let _lock = INTEGRATION_TEST_LOCK.lock();
    let recorder = Arc::new(Recorder::default());

    let mut supervisor = supervisor_with(
        &recorder,
        test_config(),
        false,
        false,
        ChildPlan::RunUntilSignaled {
            polls_after_term: 5,
            ignore_term: false,
        },
        0,
    );

    let shutdown = supervisor.shutdown_handle();
    shutdown.store(true, Ordering::SeqCst);
    // A second delivery of SIGINT/SIGTERM only re-sets the same flag
    shutdown.store(true, Ordering::SeqCst);

    let exit = supervisor.run().expect("run");

    assert_eq!(recorder.sigterms.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.sigkills.load(Ordering::SeqCst), 0);
    assert_eq!(exit.signal, Some(15));
    assert_eq!(exit.status_code(), 143);
    assert_eq!(supervisor.state(), SupervisorState::Terminated);
}

/// A child that ignores SIGTERM is SIGKILLed once after the grace period
#[test]
fn test_stuck_child_escalates_to_sigkill() {
    let _lock = INTEGRATION_TEST_LOCK.lock();
    let recorder = Arc::new(Recorder::default());

    let mut config = test_config();
    config.term_grace_ms = 10;

    let mut supervisor = supervisor_with(
        &recorder,
        config,
        false,
        false,
        ChildPlan::RunUntilSignaled {
            polls_after_term: 0,
            ignore_term: true,
        },
        0,
    );

    supervisor.shutdown_handle().store(true, Ordering::SeqCst);
    let exit = supervisor.run().expect("run");

    assert_eq!(recorder.sigterms.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.sigkills.load(Ordering::SeqCst), 1);
    assert_eq!(exit.status_code(), 137);
}

/// If the child exits on its own with status N, the supervisor reports N
/// without any kill step
#[test]
fn test_child_exit_status_propagates() {
    let _lock = INTEGRATION_TEST_LOCK.lock();
    let recorder = Arc::new(Recorder::default());

    let mut supervisor = supervisor_with(
        &recorder,
        test_config(),
        false,
        false,
        ChildPlan::ExitAfterPolls { polls: 2, code: 7 },
        0,
    );

    let exit = supervisor.run().expect("run");

    assert_eq!(exit.status_code(), 7);
    assert_eq!(recorder.sigterms.load(Ordering::SeqCst), 0);
    assert_eq!(recorder.sigkills.load(Ordering::SeqCst), 0);
}

/// A launch denial surfaces as Launch and performs zero
/// interface-configuration calls
#[test]
fn test_launch_denied_performs_no_net_calls() {
    let _lock = INTEGRATION_TEST_LOCK.lock();
    let recorder = Arc::new(Recorder::default());

    let mut supervisor = supervisor_with(
        &recorder,
        test_config(),
        false,
        true,
        ChildPlan::ExitAfterPolls { polls: 0, code: 0 },
        0,
    );

    match supervisor.run() {
        Err(SupervisorError::Launch(msg)) => assert!(msg.contains("permission denied")),
        other => panic!("expected Launch error, got {:?}", other.map(|e| e.status_code())),
    }

    assert_eq!(recorder.exists_polls.load(Ordering::SeqCst), 0);
    assert!(recorder.addresses_added.lock().unwrap().is_empty());
    assert!(recorder.links_upped.lock().unwrap().is_empty());
}

/// A completed run drains the child slot, so the supervisor can run again
#[test]
fn test_rerun_after_completion_is_allowed() {
    let _lock = INTEGRATION_TEST_LOCK.lock();
    let recorder = Arc::new(Recorder::default());

    let mut supervisor = supervisor_with(
        &recorder,
        test_config(),
        false,
        false,
        ChildPlan::ExitAfterPolls { polls: 0, code: 0 },
        0,
    );

    assert!(supervisor.run().expect("first run").success());
    // The child slot is drained after a completed run
    assert!(supervisor.run().expect("second run").success());
    assert_eq!(recorder.build_calls.load(Ordering::SeqCst), 2);
}
