mod utils;

use std::time::Duration;

use covtrace_engine::{Command, CoverageTable, Error, ExitStatus, Phase, Session};
use test_log::test;

#[test]
fn records_executed_and_unreached_addresses() {
    let fixture = utils::compile_fixture("hits.c");
    let (machine, addrs) = utils::resolve(&fixture, &["covered", "unreached"]);

    let mut table: CoverageTable = addrs.iter().copied().collect();

    let mut session = Session::launch(machine, &Command::new(&*fixture)).expect("launch");
    session.install(&mut table).expect("install");
    session.run(&mut table).expect("run");

    assert!(table.get(addrs[0]).unwrap().is_hit());
    assert!(!table.get(addrs[1]).unwrap().is_hit());
    assert_eq!(session.phase(), Phase::Exited);
    assert_eq!(session.exit_status(), Some(ExitStatus::Code(0)));
}

#[test]
fn detach_restores_memory_without_recording_hits() {
    let fixture = utils::compile_fixture("sleeper.c");
    let (machine, addrs) = utils::resolve(&fixture, &["never_called"]);
    let addr = addrs[0];

    let mut child = std::process::Command::new(&*fixture)
        .spawn()
        .expect("spawn sleeper");

    // Give the child time to finish exec'ing the fixture image.
    std::thread::sleep(Duration::from_millis(200));

    let pristine = utils::read_proc_word(child.id(), addr);

    let mut table: CoverageTable = [addr].into_iter().collect();

    let mut session = Session::attach(machine, child.id() as i32).expect("attach");
    session.install(&mut table).expect("install");

    let patched = session.read_word(addr).expect("read patched word");
    assert_ne!(patched, pristine);

    session.detach(&mut table).expect("detach");

    let entry = table.get(addr).unwrap();
    assert!(!entry.is_hit());
    assert_eq!(entry.original_word(), Some(pristine));
    assert_eq!(utils::read_proc_word(child.id(), addr), pristine);

    child.kill().expect("kill sleeper");
    child.wait().expect("reap sleeper");
}

#[test]
fn descendant_hits_are_recorded_until_root_exit() {
    let fixture = utils::compile_fixture("forks.c");
    let (machine, addrs) = utils::resolve(&fixture, &["in_child"]);

    let mut table: CoverageTable = addrs.iter().copied().collect();

    let mut session = Session::launch(machine, &Command::new(&*fixture)).expect("launch");
    session.install(&mut table).expect("install");
    session.run(&mut table).expect("run");

    assert!(table.get(addrs[0]).unwrap().is_hit());
    assert_eq!(session.exit_status(), Some(ExitStatus::Code(0)));
}

#[test]
fn inherited_breakpoint_copies_are_repaired_in_descendants() {
    let fixture = utils::compile_fixture("shared.c");
    let (machine, addrs) = utils::resolve(&fixture, &["shared"]);

    let mut table: CoverageTable = addrs.iter().copied().collect();

    let mut session = Session::launch(machine, &Command::new(&*fixture)).expect("launch");
    session.install(&mut table).expect("install");
    session.run(&mut table).expect("run");

    // The child traps on its inherited copy after the parent's breakpoint
    // was already cleared; dismissing that trap would leave the child's
    // program counter past the trap bytes and kill it mid-prologue, which
    // the fixture reports as exit code 42.
    assert!(table.get(addrs[0]).unwrap().is_hit());
    assert_eq!(session.exit_status(), Some(ExitStatus::Code(0)));
}

#[test]
fn stop_class_signals_are_forwarded() {
    let fixture = utils::compile_fixture("stops.c");
    let (machine, addrs) = utils::resolve(&fixture, &["after_stop"]);

    let mut table: CoverageTable = addrs.iter().copied().collect();

    let mut session = Session::launch(machine, &Command::new(&*fixture)).expect("launch");
    session.install(&mut table).expect("install");
    session.run(&mut table).expect("run");

    // The fixture catches its own SIGTSTP; a swallowed stop-class signal
    // would leave the handler flag unset and the fixture exiting nonzero.
    assert!(table.get(addrs[0]).unwrap().is_hit());
    assert_eq!(session.exit_status(), Some(ExitStatus::Code(0)));
}

#[test]
fn tracee_signals_are_forwarded() {
    let fixture = utils::compile_fixture("signals.c");
    let (machine, addrs) = utils::resolve(&fixture, &["after_signal"]);

    let mut table: CoverageTable = addrs.iter().copied().collect();

    let mut session = Session::launch(machine, &Command::new(&*fixture)).expect("launch");
    session.install(&mut table).expect("install");
    session.run(&mut table).expect("run");

    // The fixture handles its own SIGUSR1; a swallowed signal would leave
    // it stuck before the tracked function and a mishandled one would kill
    // it with a nonzero status.
    assert!(table.get(addrs[0]).unwrap().is_hit());
    assert_eq!(session.exit_status(), Some(ExitStatus::Code(0)));
}

#[test]
fn unsupported_machine_fails_before_launch() {
    let command = Command::new("/nonexistent/target");

    let err = Session::launch(0xffff, &command).err().unwrap();

    // A launch attempt would have failed on the path instead.
    assert!(matches!(err, Error::UnsupportedMachine(0xffff)));
}

#[test]
fn missing_target_fails_to_launch() {
    let command = Command::new("/nonexistent/target");

    let err = Session::launch(utils::host_machine(), &command).err().unwrap();

    assert!(matches!(err, Error::Launch { .. }));
}

#[test]
fn attach_to_missing_process_fails() {
    let err = Session::attach(utils::host_machine(), i32::MAX).err().unwrap();

    assert!(matches!(err, Error::Attach { .. }));
}
