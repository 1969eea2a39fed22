//! Circuit-level passes: validation, expansion, flattening, connectivity
//! resolution, and netlist formatting.
//!
//! Each pass owns its per-compilation state (net-id counter, unconnected
//! counter, macro table) as instance fields, never as process-wide
//! statics, so independent compilations can run concurrently on separate
//! threads. Pass order matters: connection and component order determine
//! net reuse and last-write-wins terminal bindings.

mod expand;
mod flatten;
mod net;
mod netlist;
mod validate;

pub use expand::{Expander, MAX_EXPANSION_DEPTH};
pub use flatten::{Flattener, MAX_FLATTEN_DEPTH};
pub use net::{NetId, NetlistNode, NetResolver};
pub use netlist::{format_netlist, format_si};
pub use validate::validate;
