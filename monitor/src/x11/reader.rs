use std::time::Duration;

use anyhow::Context;
use log::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{AtomEnum, ConnectionExt};
use x11rb::protocol::Event;
use x11rb::CURRENT_TIME;

use super::{Backend, Target};

pub(super) struct Fetch {
    /// `None` when there is no owner or the owner refused the transfer.
    pub bytes: Option<Vec<u8>>,
    /// A PRIMARY ownership notify was consumed while waiting; the watch loop
    /// must read again or the event would be lost.
    pub selection_dirty: bool,
}

/// One ConvertSelection round-trip against the current owner.
///
/// The answer is awaited with a staged backoff (500 us x5, 2 ms x15,
/// 5 ms x80), bounding the whole handshake to roughly 450 ms against an
/// unresponsive owner.
pub(super) fn fetch(backend: &Backend, target: Target) -> anyhow::Result<Fetch> {
    let (selection, property, cap) = target.params(&backend.atoms);
    let conn = &backend.conn;
    let mut dirty = false;

    let owner = conn
        .get_selection_owner(selection)
        .context("get_selection_owner")?
        .reply()
        .context("get_selection_owner reply")?
        .owner;
    if owner == x11rb::NONE {
        return Ok(Fetch {
            bytes: None,
            selection_dirty: false,
        });
    }

    let win = backend.create_helper_window()?;
    conn.convert_selection(win, selection, backend.atoms.utf8_string, property, CURRENT_TIME)
        .context("convert_selection")?;
    conn.flush().context("flush")?;

    let mut notify = None;
    'wait: for attempt in 0..100 {
        loop {
            match conn.poll_for_event().context("poll_for_event")? {
                Some(Event::SelectionNotify(n)) if n.requestor == win => {
                    notify = Some(n);
                    break 'wait;
                }
                Some(Event::XfixesSelectionNotify(n))
                    if n.selection == backend.atoms.primary =>
                {
                    dirty = true;
                }
                Some(_) => {}
                None => break,
            }
        }
        std::thread::sleep(backoff_delay(attempt));
    }

    let bytes = match notify {
        Some(n) if n.property != u32::from(AtomEnum::NONE) => {
            // Bounded to the cap; anything longer is silently cut off.
            let reply = conn
                .get_property(true, win, property, AtomEnum::ANY, 0, (cap / 4) as u32)
                .context("get_property")?
                .reply()
                .context("get_property reply")?;
            if reply.type_ == backend.atoms.incr {
                // A multi-round INCR transfer; treat as a refusal.
                None
            } else {
                Some(reply.value)
            }
        }
        Some(_) => None, // owner refused the target
        None => {
            debug!("selection owner did not answer ConvertSelection");
            None
        }
    };

    conn.destroy_window(win).context("destroy window")?;
    conn.flush().context("flush")?;
    Ok(Fetch {
        bytes,
        selection_dirty: dirty,
    })
}

fn backoff_delay(attempt: usize) -> Duration {
    if attempt < 5 {
        Duration::from_micros(500)
    } else if attempt < 20 {
        Duration::from_millis(2)
    } else {
        Duration::from_millis(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_stages_bound_the_worst_case_wait() {
        assert_eq!(backoff_delay(0), Duration::from_micros(500));
        assert_eq!(backoff_delay(4), Duration::from_micros(500));
        assert_eq!(backoff_delay(5), Duration::from_millis(2));
        assert_eq!(backoff_delay(19), Duration::from_millis(2));
        assert_eq!(backoff_delay(20), Duration::from_millis(5));
        assert_eq!(backoff_delay(99), Duration::from_millis(5));

        let total: Duration = (0..100).map(backoff_delay).sum();
        assert!(total < Duration::from_millis(500));
    }
}
