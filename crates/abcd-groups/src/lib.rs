//! # abcd-groups
//!
//! Process groups assembled from a histogram container, the style tables
//! that label and color them, and the yield tables written next to plots.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod datagroups;
pub mod styles;
pub mod yields;

pub use datagroups::{
    DATA, Datagroups, FAKE, Group, NONPROMPT_MC, Presel, RebinAction, Selection, Variation,
    select_entry,
};
pub use styles::{Styles, Supergroup};
pub use yields::{YieldRow, YieldTable};
