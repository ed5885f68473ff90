/*!

These are generic structures and algorithms: they do not depend on anything specific to this
codebase or application.

*/

mod interval_set;
mod statistics;

pub use interval_set::IntervalSet;
pub use statistics::{Statistic, Statistics};
