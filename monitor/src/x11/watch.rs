use std::os::fd::AsRawFd;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use daemonize::Daemonize;
use log::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xfixes::{self, SelectionEventMask};
use x11rb::protocol::Event;

use utils::cache::CacheStore;
use utils::{io, term};

use super::{reader, Backend, Target};

/// XFixes-driven PRIMARY monitor loop.
///
/// Subscribes to ownership changes on the root window, then alternates
/// between draining the event queue and a 1 s poll on the display fd so a
/// termination signal is noticed promptly.
pub(super) fn run(backend: &Backend, cache_dir: Option<&Path>) -> anyhow::Result<()> {
    let dir = match cache_dir {
        Some(d) => d.to_path_buf(),
        None => utils::paths::default_cache_dir()
            .context("cannot determine cache directory (no XDG_RUNTIME_DIR or HOME)")?,
    };
    let cache = CacheStore::open(&dir)?;

    xfixes::query_version(&backend.conn, 5, 0)
        .context(backend.flavor.xfixes_error())?
        .reply()
        .context(backend.flavor.xfixes_error())?;
    xfixes::select_selection_input(
        &backend.conn,
        backend.root,
        backend.atoms.primary,
        SelectionEventMask::SET_SELECTION_OWNER,
    )
    .context("xfixes select_selection_input")?;
    backend.conn.flush().context("flush")?;

    // Seed the rendezvous before daemonizing so the shell never observes a
    // missing file.
    let mut seq = utils::now_secs();
    cache.publish(b"", seq).context("seed cache")?;

    Daemonize::new().start().context("daemonize")?;
    let _ = cache.write_pid();
    term::install_handlers();

    let fd = backend.conn.stream().as_raw_fd();
    'outer: while term::should_run() {
        loop {
            let ev = match backend.conn.poll_for_event() {
                Ok(Some(ev)) => ev,
                Ok(None) => break,
                Err(e) => {
                    warn!("x11 connection lost: {e}");
                    break 'outer;
                }
            };
            if let Event::XfixesSelectionNotify(n) = ev {
                if n.selection == backend.atoms.primary {
                    // One publish per ownership change; a notify consumed
                    // mid-read gets its own publish on the next turn.
                    let mut again = true;
                    while again && term::should_run() {
                        again = publish_current(backend, &cache, &mut seq);
                    }
                }
            }
        }

        if let Err(e) = io::poll_readable(fd, Duration::from_secs(1)) {
            warn!("poll on display fd failed: {e}");
            break;
        }
    }

    cache.cleanup();
    Ok(())
}

/// Read PRIMARY and publish it. Every call bumps `seq`, identical content
/// included, so re-selecting the same text is still observable.
fn publish_current(backend: &Backend, cache: &CacheStore, seq: &mut u64) -> bool {
    let fetch = match reader::fetch(backend, Target::Primary) {
        Ok(f) => f,
        Err(e) => {
            warn!("selection read failed: {e:#}");
            reader::Fetch {
                bytes: None,
                selection_dirty: false,
            }
        }
    };
    *seq += 1;
    let bytes = fetch.bytes.unwrap_or_default();
    if let Err(e) = cache.publish(&bytes, *seq) {
        warn!("cache publish failed: {e:#}");
    } else {
        debug!("published seq={} ({} bytes)", seq, bytes.len());
    }
    fetch.selection_dirty
}
