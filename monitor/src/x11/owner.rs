use std::os::fd::AsRawFd;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use daemonize::Daemonize;
use log::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    self, Atom, AtomEnum, ConnectionExt, EventMask, PropMode, SelectionNotifyEvent,
    SelectionRequestEvent, Window,
};
use x11rb::protocol::Event;
use x11rb::CURRENT_TIME;

use utils::{io, term};

use crate::consts::MAX_CLIPBOARD_SIZE;

use super::Backend;

/// Server lifetime bound: 500 ticks of 100 ms (~50 s) without a request,
/// so orphaned owners do not accumulate.
const IDLE_TICKS: u32 = 500;

/// Take CLIPBOARD ownership of the bytes on stdin, then hand the connection
/// to a detached child that answers paste requests until displaced.
pub(super) fn copy_clipboard(backend: &Backend) -> anyhow::Result<ExitCode> {
    let payload = io::read_to_cap(std::io::stdin().lock(), MAX_CLIPBOARD_SIZE)
        .context("read stdin")?
        .with_context(|| format!("stdin exceeds {MAX_CLIPBOARD_SIZE} bytes"))?;
    if payload.is_empty() {
        anyhow::bail!("empty stdin");
    }

    let win = backend.create_helper_window()?;
    backend
        .conn
        .set_selection_owner(win, backend.atoms.clipboard, CURRENT_TIME)
        .context("set_selection_owner")?;
    let owner = backend
        .conn
        .get_selection_owner(backend.atoms.clipboard)
        .context("get_selection_owner")?
        .reply()
        .context("get_selection_owner reply")?
        .owner;
    if owner != win {
        anyhow::bail!("clipboard ownership was not granted");
    }
    backend.conn.flush().context("flush")?;

    // The shell gets its prompt back immediately; the child inherits the
    // connection and serves until displaced or idle too long.
    Daemonize::new().start().context("daemonize clipboard server")?;
    term::install_handlers();
    term::ignore_sighup();

    serve(backend, win, &payload);
    Ok(ExitCode::SUCCESS)
}

fn serve(backend: &Backend, win: Window, payload: &[u8]) {
    let fd = backend.conn.stream().as_raw_fd();
    let mut idle_ticks = 0u32;

    while term::should_run() && idle_ticks < IDLE_TICKS {
        let mut served = false;
        loop {
            match backend.conn.poll_for_event() {
                Ok(Some(Event::SelectionRequest(req))) => {
                    if answer_request(backend, win, &req, payload).is_err() {
                        debug!("failed to answer a selection request");
                    }
                    served = true;
                }
                Ok(Some(Event::SelectionClear(_))) => return, // displaced
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(_) => return,
            }
        }

        if served {
            idle_ticks = 0;
        } else {
            idle_ticks += 1;
        }
        if io::poll_readable(fd, Duration::from_millis(100)).is_err() {
            return;
        }
    }
}

fn answer_request(
    backend: &Backend,
    win: Window,
    req: &SelectionRequestEvent,
    payload: &[u8],
) -> anyhow::Result<()> {
    let conn = &backend.conn;
    let atoms = &backend.atoms;
    let string_atom: Atom = AtomEnum::STRING.into();

    // ICCCM: obsolete requestors may pass property None; answer on the
    // target atom instead.
    let property = if req.property == u32::from(AtomEnum::NONE) {
        req.target
    } else {
        req.property
    };

    let mut reply_property = u32::from(AtomEnum::NONE);
    if req.target == atoms.targets {
        let targets = [atoms.targets, atoms.utf8_string, string_atom];
        let bytes: Vec<u8> = targets.iter().flat_map(|a| a.to_ne_bytes()).collect();
        conn.change_property(
            PropMode::REPLACE,
            req.requestor,
            property,
            AtomEnum::ATOM,
            32,
            targets.len() as u32,
            &bytes,
        )
        .context("change_property TARGETS")?;
        reply_property = property;
    } else if req.target == atoms.utf8_string || req.target == string_atom {
        conn.change_property(
            PropMode::REPLACE,
            req.requestor,
            property,
            req.target,
            8,
            payload.len() as u32,
            payload,
        )
        .context("change_property payload")?;
        reply_property = property;
    }

    let notify = SelectionNotifyEvent {
        response_type: xproto::SELECTION_NOTIFY_EVENT,
        sequence: 0,
        time: req.time,
        requestor: req.requestor,
        selection: req.selection,
        target: req.target,
        property: reply_property,
    };
    conn.send_event(false, req.requestor, EventMask::NO_EVENT, notify)
        .context("send SelectionNotify")?;
    conn.flush().ok();

    // An unsupported target must not cost us the selection.
    if reply_property == u32::from(AtomEnum::NONE) {
        let _ = conn.set_selection_owner(win, atoms.clipboard, CURRENT_TIME);
        conn.flush().ok();
    }
    Ok(())
}
