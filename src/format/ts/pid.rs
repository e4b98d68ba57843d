use super::types::{Pid, PID_MAX};
use bitvec::prelude::*;
use lazy_static::lazy_static;
use std::fmt;

type PidBits = BitArr!(for PID_MAX, in u64, Lsb0);

lazy_static! {
    /// A PID set containing no PID.
    pub static ref NO_PID: PidSet = PidSet::none();
    /// A PID set containing all PID's.
    pub static ref ALL_PIDS: PidSet = PidSet::all();
}

/// A set of PID values, one bit per PID in the 13-bit address space.
#[derive(Clone, PartialEq, Eq)]
pub struct PidSet {
    bits: PidBits,
}

impl PidSet {
    /// Creates an empty set.
    pub fn none() -> Self {
        Self {
            bits: BitArray::ZERO,
        }
    }

    /// Creates a set containing every PID.
    pub fn all() -> Self {
        let mut bits: PidBits = BitArray::ZERO;
        bits.fill(true);
        Self { bits }
    }

    /// Creates a set from a list of PID values. Values outside the PID range are ignored.
    pub fn from_pids<I: IntoIterator<Item = Pid>>(pids: I) -> Self {
        let mut set = Self::none();
        for pid in pids {
            set.insert(pid);
        }
        set
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.bits.get(pid as usize).map(|bit| *bit).unwrap_or(false)
    }

    /// Adds a PID, returns true if it was not already present.
    pub fn insert(&mut self, pid: Pid) -> bool {
        if (pid as usize) >= PID_MAX {
            return false;
        }
        !self.bits.replace(pid as usize, true)
    }

    /// Removes a PID, returns true if it was present.
    pub fn remove(&mut self, pid: Pid) -> bool {
        if (pid as usize) >= PID_MAX {
            return false;
        }
        self.bits.replace(pid as usize, false)
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.not_any()
    }

    /// PIDs in this set, in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = Pid> + '_ {
        self.bits.iter_ones().map(|index| index as Pid)
    }

    /// PIDs in this set which are not in `other`, in increasing order.
    pub fn difference(&self, other: &PidSet) -> PidSet {
        let mut set = self.clone();
        for pid in other.iter() {
            set.remove(pid);
        }
        set
    }
}

impl Default for PidSet {
    fn default() -> Self {
        Self::none()
    }
}

impl FromIterator<Pid> for PidSet {
    fn from_iter<I: IntoIterator<Item = Pid>>(iter: I) -> Self {
        Self::from_pids(iter)
    }
}

impl fmt::Debug for PidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len() == PID_MAX {
            write!(f, "PidSet(all)")
        } else {
            f.debug_set().entries(self.iter()).finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert!(NO_PID.is_empty());
        assert_eq!(ALL_PIDS.len(), PID_MAX);
        assert!(ALL_PIDS.contains(0x1FFF));
        assert!(!NO_PID.contains(0));
    }

    #[test]
    fn test_insert_remove() {
        let mut set = PidSet::none();
        assert!(set.insert(100));
        assert!(!set.insert(100));
        assert!(!set.insert(0x2000));
        assert!(set.contains(100));
        assert!(!set.contains(0x2000));
        assert!(set.remove(100));
        assert!(!set.remove(100));
        assert!(set.is_empty());
    }

    #[test]
    fn test_difference() {
        let old: PidSet = [1, 2, 3, 8000].into_iter().collect();
        let new: PidSet = [2, 3, 4].into_iter().collect();
        let removed: Vec<Pid> = old.difference(&new).iter().collect();
        assert_eq!(removed, vec![1, 8000]);
    }
}
