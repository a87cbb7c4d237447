//! The rewrite rules, one partial transformation each.
//!
//! Every function here returns a bare rule; the driver decides the traversal
//! (`everywhere`, `top_down_once`, `repeat`) each one runs under. Rules only
//! inspect the matched node and its direct inputs and never mutate a slot.
//!
//! | rule                   | runs under                    | measure                |
//! |------------------------|-------------------------------|------------------------|
//! | `flatten_split`        | `everywhere`                  | n/a (single pass)      |
//! | `flatten_sink`         | `repeat(top_down_once)`       | `flatten_sink_measure` |
//! | `flatten_fuse`         | `repeat(top_down_once)`       | `flatten_occurrences`  |
//! | `combine_to_par_do`    | `everywhere`                  | n/a                    |
//! | `par_do_fuse`          | `repeat(top_down_once)`, twice| `par_do_occurrences`   |
//! | `group_by_key_split`   | `everywhere`                  | n/a                    |
//! | `combine_split`        | `everywhere`                  | n/a                    |
//! | `par_do_fuse_barrier`  | `everywhere_shared`           | n/a                    |

pub mod combine;
pub mod flatten;
pub mod group_by_key;
pub mod par_do;

pub use combine::{combine_split, combine_to_par_do};
pub use flatten::{flatten_fuse, flatten_sink, flatten_split};
pub use group_by_key::group_by_key_split;
pub use par_do::{par_do_fuse, par_do_fuse_barrier};

use std::collections::HashSet;
use std::sync::Arc;

use sluice_core::id::NodeId;

/// Origins of the caller's output nodes. Membership is by origin so a rebuilt
/// or copied output is still recognised as that output.
pub type OutputSet = Arc<HashSet<NodeId>>;
