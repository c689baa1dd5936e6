use std::sync::atomic::{AtomicBool, Ordering};

static RUNNING: AtomicBool = AtomicBool::new(true);

extern "C" fn on_terminate(_sig: libc::c_int) {
    RUNNING.store(false, Ordering::SeqCst);
}

/// Route SIGTERM/SIGINT/SIGHUP to a flag polled by the event loops. The
/// handler only touches an atomic, so it is async-signal-safe.
pub fn install_handlers() {
    let handler = on_terminate as extern "C" fn(libc::c_int);
    unsafe {
        libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        libc::signal(libc::SIGHUP, handler as libc::sighandler_t);
    }
}

/// The detached clipboard server must survive its terminal going away.
pub fn ignore_sighup() {
    unsafe {
        libc::signal(libc::SIGHUP, libc::SIG_IGN);
    }
}

pub fn should_run() -> bool {
    RUNNING.load(Ordering::SeqCst)
}
