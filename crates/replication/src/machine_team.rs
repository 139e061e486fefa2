//! Machine teams.
//!
//! A machine team is one combination of fault domains that replicas could be
//! spread over. Two machine teams are the same team exactly when they cover
//! the same machines, whatever order they were built in. The registry relies
//! on that equality to avoid tracking one combination twice.

use std::fmt;
use std::hash::{Hash, Hasher};

use corelib::{MachineId, TeamId};

use crate::error::{ReplicationError, Result};
use crate::machine::MachineRecord;

/// An order-normalized set of machines usable as a placement group.
///
/// # Invariants
///
/// - `machine_ids` is sorted and free of duplicates
/// - `machine_ids` and `machines` always have the same length
/// - Never changes after construction
#[derive(Debug, Clone)]
pub struct MachineTeam {
    /// Diagnostic id, unique per construction.
    id: TeamId,
    /// Sorted machine ids. Equality and hashing use only this.
    machine_ids: Vec<MachineId>,
    /// Handles on the member machines, in construction order.
    machines: Vec<MachineId>,
}

impl MachineTeam {
    /// Build a team from its member machines.
    ///
    /// Rejects an empty member list and repeated machines: duplicates are a
    /// caller error and are not collapsed.
    pub fn new(machines: &[&MachineRecord]) -> Result<Self> {
        if machines.is_empty() {
            return Err(ReplicationError::InvalidMachineTeam("no machines given".into()));
        }
        let handles: Vec<MachineId> = machines.iter().map(|machine| machine.machine_id().clone()).collect();
        let mut machine_ids = handles.clone();
        machine_ids.sort();
        if let Some(pair) = machine_ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ReplicationError::InvalidMachineTeam(format!("machine {} given twice", pair[0])));
        }
        Ok(Self {
            id: TeamId::random(),
            machine_ids,
            machines: handles,
        })
    }

    pub fn id(&self) -> TeamId {
        self.id
    }

    /// Number of machines in the team.
    ///
    /// # Panics
    ///
    /// If the id set and the backing handles disagree in length.
    pub fn size(&self) -> usize {
        assert_eq!(
            self.machines.len(),
            self.machine_ids.len(),
            "machine team {} has {} machines but {} machine ids",
            self.id,
            self.machines.len(),
            self.machine_ids.len()
        );
        self.machine_ids.len()
    }

    /// Member machine ids in sorted order.
    pub fn machine_ids(&self) -> &[MachineId] {
        &self.machine_ids
    }

    /// Member machines in construction order.
    pub fn machines(&self) -> &[MachineId] {
        &self.machines
    }

    pub fn contains_machine(&self, machine: &MachineId) -> bool {
        self.machine_ids.binary_search(machine).is_ok()
    }

    /// Space separated sorted machine ids, or `[unset]` for an empty team.
    ///
    /// There is no trailing separator: `"m1 m2 m3"`, not `"m1 m2 m3 "` as
    /// older log lines for the same team read.
    pub fn machine_ids_str(&self) -> String {
        if self.machine_ids.is_empty() {
            return "[unset]".to_string();
        }
        self.machine_ids.iter().map(MachineId::as_str).collect::<Vec<_>>().join(" ")
    }
}

impl PartialEq for MachineTeam {
    fn eq(&self, other: &Self) -> bool {
        self.machine_ids == other.machine_ids
    }
}

impl Eq for MachineTeam {}

impl Hash for MachineTeam {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.machine_ids.hash(state);
    }
}

impl fmt::Display for MachineTeam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MachineTeam(id={}, machines=[{}])", self.id, self.machine_ids_str())
    }
}
