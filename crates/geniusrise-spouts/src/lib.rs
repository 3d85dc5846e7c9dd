//! Spouts that ship with the `genius` binary.
//!
//! Each spout submits its [`TypeInfo`](geniusrise_core::TypeInfo) with
//! `inventory`, so linking this crate is enough to make it discoverable.

mod local_file;
mod test_spout;

pub use local_file::LocalFileSpout;
pub use test_spout::TestSpoutCtlSpout;

use geniusrise_core::Catalog;

/// Catalog of every type linked into the binary, including these spouts.
pub fn catalog() -> Catalog {
    let mut catalog = Catalog::linked();
    // The linker may drop unreferenced inventory submissions from an rlib.
    for info in [test_spout::TYPE_INFO, local_file::TYPE_INFO] {
        catalog.register(info);
    }
    catalog
}
