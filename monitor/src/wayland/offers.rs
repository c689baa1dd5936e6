use std::os::fd::AsFd;
use std::time::Duration;

use anyhow::Context;
use wayland_client::protocol::wl_data_offer::WlDataOffer;
use wayland_client::Connection;
use wayland_protocols::wp::primary_selection::zv1::client::zwp_primary_selection_offer_v1::ZwpPrimarySelectionOfferV1;

use utils::io;

use crate::consts::{MAX_CLIPBOARD_SIZE, MAX_SELECTION_SIZE, RECEIVE_MIME};

/// First wait for offer bytes; later chunks fall back to the 100 ms window
/// inside `read_with_deadline`.
const RECEIVE_TIMEOUT: Duration = Duration::from_millis(500);

pub(super) fn read_primary(
    conn: &Connection,
    offer: &ZwpPrimarySelectionOfferV1,
) -> anyhow::Result<Vec<u8>> {
    let (read_end, write_end) = io::pipe().context("create pipe")?;
    offer.receive(RECEIVE_MIME.to_string(), write_end.as_fd());
    conn.flush().context("flush receive request")?;
    // Close our write end so EOF can arrive once the source is done.
    drop(write_end);
    io::read_with_deadline(read_end, MAX_SELECTION_SIZE, RECEIVE_TIMEOUT)
        .context("read offer pipe")
}

pub(super) fn read_clipboard(conn: &Connection, offer: &WlDataOffer) -> anyhow::Result<Vec<u8>> {
    let (read_end, write_end) = io::pipe().context("create pipe")?;
    offer.receive(RECEIVE_MIME.to_string(), write_end.as_fd());
    conn.flush().context("flush receive request")?;
    drop(write_end);
    io::read_with_deadline(read_end, MAX_CLIPBOARD_SIZE, RECEIVE_TIMEOUT)
        .context("read offer pipe")
}
