/*!

  This `Statistics` map is the only crate-level statistics container. The search driver's
  `Stats` struct collects into it for display; drivers print the entries one per line.

*/

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub type Statistics = HashMap<&'static str, Statistic>;

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Statistic {
  Integer(u64),
  Float(f64),
  Time(Duration),
}

impl From<u64> for Statistic {
  fn from(n: u64) -> Self {
    Statistic::Integer(n)
  }
}

impl From<usize> for Statistic {
  fn from(n: usize) -> Self {
    Statistic::Integer(n as u64)
  }
}

impl From<f64> for Statistic {
  fn from(r: f64) -> Self {
    Statistic::Float(r)
  }
}

impl From<Duration> for Statistic {
  fn from(d: Duration) -> Self {
    Statistic::Time(d)
  }
}

impl Display for Statistic {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Statistic::Integer(n) => write!(f, "{}", n),
      Statistic::Float(r)   => write!(f, "{}", r),
      Statistic::Time(d)    => write!(f, "{:.3}", d.as_secs_f64()),
    }
  }
}
