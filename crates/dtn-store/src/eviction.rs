//! Buffer eviction policies.
//!
//! | Policy                  | Victim                                   |
//! |-------------------------|------------------------------------------|
//! | `DropOldest`            | earliest received (FIFO)                 |
//! | `DropLargest`           | largest payload                          |
//! | `DropLowestPriority`    | lowest priority                          |
//! | `MostForwarded`         | highest forward count (MOFO)             |
//! | `ShortestRemainingLife` | earliest expiry deadline (SHLI)          |
//!
//! Copies that are being sent are never candidates.  Ties go to the copy
//! that comes first in buffer order.

use std::cmp::Ordering;

use crate::{BufferedCopy, MessageTable};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EvictionPolicy {
    #[default]
    DropOldest,
    DropLargest,
    DropLowestPriority,
    MostForwarded,
    ShortestRemainingLife,
}

impl EvictionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            EvictionPolicy::DropOldest            => "drop_oldest",
            EvictionPolicy::DropLargest           => "drop_largest",
            EvictionPolicy::DropLowestPriority    => "drop_lowest_priority",
            EvictionPolicy::MostForwarded         => "most_forwarded",
            EvictionPolicy::ShortestRemainingLife => "shortest_remaining_life",
        }
    }

    /// `Ordering::Less` if `a` should be evicted before `b`.
    fn compare(self, a: &BufferedCopy, b: &BufferedCopy, table: &MessageTable) -> Ordering {
        let msg = |c: &BufferedCopy| table.get(c.msg);
        match self {
            EvictionPolicy::DropOldest => a.received.cmp(&b.received),
            EvictionPolicy::DropLargest => {
                let size = |c: &BufferedCopy| msg(c).map_or(0, |m| m.size);
                size(b).cmp(&size(a))
            }
            EvictionPolicy::DropLowestPriority => {
                let prio = |c: &BufferedCopy| msg(c).map_or(i32::MIN, |m| m.priority);
                prio(a).cmp(&prio(b))
            }
            EvictionPolicy::MostForwarded => b.forwards.cmp(&a.forwards),
            EvictionPolicy::ShortestRemainingLife => {
                let deadline = |c: &BufferedCopy| msg(c).map(|m| m.expires_at());
                deadline(a).cmp(&deadline(b))
            }
        }
    }

    /// Index of the next victim among `copies`, skipping copies in transit
    /// and indices for which `skip` returns `true`.
    pub fn pick_victim(
        self,
        copies: &[BufferedCopy],
        table:  &MessageTable,
        skip:   impl Fn(usize) -> bool,
    ) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, c) in copies.iter().enumerate() {
            if c.sending || skip(i) {
                continue;
            }
            match best {
                // Strictly better only: ties keep the earlier copy.
                Some(j) if self.compare(c, &copies[j], table) != Ordering::Less => {}
                _ => best = Some(i),
            }
        }
        best
    }
}

impl std::fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
