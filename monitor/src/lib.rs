// Internal modules shared by the three selection-monitor binaries.
//
// Keeping these in a library crate splits the backends into smaller,
// testable units; the `src/bin/` entry points stay trivial.

pub mod cli;
pub mod consts;
pub mod wayland;
pub mod x11;
