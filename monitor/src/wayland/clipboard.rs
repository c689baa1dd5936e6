use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use daemonize::Daemonize;

use utils::{io, term};

use crate::consts::{MAX_CLIPBOARD_SIZE, OFFERED_TEXT_MIMES};

use super::{connect, offers};

/// The serving child wakes at least this often to notice signals.
const SERVE_TIMEOUT: Duration = Duration::from_secs(5);

pub(super) fn get() -> anyhow::Result<ExitCode> {
    let mut session = connect()?;
    session.ensure_data_device()?;
    session.roundtrip()?;

    let bytes = match (&session.state.clipboard_offer, session.state.clipboard_has_text) {
        (Some(offer), true) => offers::read_clipboard(&session.conn, offer).unwrap_or_default(),
        _ => Vec::new(),
    };
    if bytes.is_empty() {
        return Ok(ExitCode::FAILURE);
    }
    std::io::stdout()
        .write_all(&bytes)
        .context("write clipboard to stdout")?;
    Ok(ExitCode::SUCCESS)
}

/// Publish stdin as the clipboard, then keep a detached child alive to
/// serve paste requests until another client takes the selection.
pub(super) fn copy() -> anyhow::Result<ExitCode> {
    let payload = io::read_to_cap(std::io::stdin().lock(), MAX_CLIPBOARD_SIZE)
        .context("read stdin")?
        .with_context(|| format!("stdin exceeds {MAX_CLIPBOARD_SIZE} bytes"))?;
    if payload.is_empty() {
        anyhow::bail!("empty stdin");
    }

    let mut session = connect()?;
    session.ensure_data_device()?;

    let qh = session.queue.handle();
    let manager = session
        .state
        .data_manager
        .clone()
        .context("compositor does not support wl_data_device_manager")?;
    let source = manager.create_data_source(&qh, ());
    for mime in OFFERED_TEXT_MIMES {
        source.offer(mime.to_string());
    }
    session.state.copy_payload = payload;
    session
        .state
        .data_device
        .as_ref()
        .context("no data device")?
        .set_selection(Some(&source), 0);
    session.state.copy_source = Some(source);
    session.conn.flush().context("flush")?;

    // The shell gets its prompt back immediately; the child inherits the
    // connection and serves until the compositor cancels the source.
    Daemonize::new().start().context("daemonize clipboard server")?;
    term::install_handlers();
    term::ignore_sighup();

    while term::should_run() && !session.state.copy_finished {
        if session.dispatch_for(SERVE_TIMEOUT).is_err() {
            break;
        }
    }

    // Signalled exit: withdraw the source instead of leaving a dead owner.
    if let Some(source) = session.state.copy_source.take() {
        source.destroy();
        let _ = session.conn.flush();
    }
    Ok(ExitCode::SUCCESS)
}

pub(super) fn clear_primary() -> anyhow::Result<ExitCode> {
    let mut session = connect()?;
    session.ensure_primary_device()?;
    session
        .state
        .primary_device
        .as_ref()
        .context("no primary-selection device")?
        .set_selection(None, 0);
    session.roundtrip()?;
    Ok(ExitCode::SUCCESS)
}
