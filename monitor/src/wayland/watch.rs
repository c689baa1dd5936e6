use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use daemonize::Daemonize;
use log::{debug, warn};

use utils::cache::CacheStore;
use utils::term;

use super::{connect, offers, surface, Publisher};

/// Loop cadence: dispatch when the display fd is readable, re-read the
/// current offer on timeout.
const DISPATCH_TIMEOUT: Duration = Duration::from_millis(50);

const ONESHOT_ATTEMPTS: usize = 50;
const ONESHOT_TIMEOUT: Duration = Duration::from_millis(100);

/// Primary-selection monitor loop.
pub(super) fn run_daemon(cache_dir: Option<&Path>) -> anyhow::Result<()> {
    let mut session = connect()?;
    session.ensure_primary_device()?;

    let dir = match cache_dir {
        Some(d) => d.to_path_buf(),
        None => utils::paths::default_cache_dir()
            .context("cannot determine cache directory (no XDG_RUNTIME_DIR or HOME)")?,
    };
    let cache = CacheStore::open(&dir)?;

    // Seed the rendezvous before daemonizing so the shell never observes a
    // missing file.
    let seq = utils::now_secs();
    cache.publish(b"", seq).context("seed cache")?;

    Daemonize::new().start().context("daemonize")?;
    let _ = cache.write_pid();
    term::install_handlers();

    session.state.publisher = Some(Publisher { cache, seq });

    // Deliver any selection state that existed before we attached; the
    // selection handler publishes it.
    session.roundtrip()?;

    // Mutter only delivers PRIMARY events to clients with a mapped surface;
    // the probe stays mapped for the daemon's whole life.
    let probe = surface::map_probe_surface(&mut session)?;

    while term::should_run() && !session.state.toplevel_closed {
        match session.dispatch_for(DISPATCH_TIMEOUT) {
            Ok(true) => {}
            Ok(false) => {
                // Timeout: re-read the live offer. Catches a highlight being
                // extended, which most compositors do not report as a new
                // selection event.
                if session.state.primary_offer.is_some() && session.state.primary_has_text {
                    let conn = session.conn.clone();
                    session.state.publish_primary(&conn);
                }
            }
            Err(e) => {
                warn!("wayland event loop failed: {e:#}");
                break;
            }
        }
    }

    probe.unmap();
    let _ = session.conn.flush();
    if let Some(p) = session.state.publisher.take() {
        p.cache.cleanup();
    }
    Ok(())
}

/// Single PRIMARY read, printed to stdout. Falls back to a mapped probe
/// surface when the compositor gates selection delivery on focus.
pub(super) fn run_oneshot(cache_dir: Option<&Path>) -> anyhow::Result<ExitCode> {
    let mut session = connect()?;
    session.ensure_primary_device()?;

    // wlroots compositors deliver the selection on a bare roundtrip.
    session.roundtrip()?;

    if !session.state.selection_seen && session.state.can_map_surface() {
        match surface::map_probe_surface(&mut session) {
            Ok(_probe) => {
                for _ in 0..ONESHOT_ATTEMPTS {
                    if session.state.selection_seen {
                        break;
                    }
                    session.dispatch_for(ONESHOT_TIMEOUT)?;
                }
            }
            Err(e) => debug!("probe surface unavailable: {e:#}"),
        }
    }

    let bytes = match (&session.state.primary_offer, session.state.primary_has_text) {
        (Some(offer), true) => offers::read_primary(&session.conn, offer).unwrap_or_default(),
        _ => Vec::new(),
    };

    if let Some(dir) = cache_dir {
        // Keep the daemon-backed view in sync; on Mutter the daemon may not
        // see PRIMARY events at all and this is the correcting path.
        let cache = CacheStore::open(dir)?;
        cache.publish(&bytes, utils::now_secs())?;
    }

    if bytes.is_empty() {
        return Ok(ExitCode::FAILURE);
    }
    std::io::stdout()
        .write_all(&bytes)
        .context("write selection to stdout")?;
    Ok(ExitCode::SUCCESS)
}
