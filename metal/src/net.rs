//! The connectivity table between component pins.

use std::collections::BTreeSet;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::id::{ComponentId, NetId};

/// Marker type for [`NetId`].
#[derive(Debug, Clone, Copy)]
pub struct Net;

/// One endpoint of a net.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetRow {
    /// The net.
    pub net_id: NetId,
    /// The component owning the pin.
    pub component_id: ComponentId,
    /// The pin name.
    pub pin_name: ArcStr,
}

/// Rows of `net_id -> (component_id, pin_name)`.
///
/// Every net joins exactly two pins. Unconnected pins have no rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetTable {
    rows: Vec<NetRow>,
    latest: NetId,
}

impl NetTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects two pins, returning the new net ID.
    ///
    /// Returns [`NetId::UNCONNECTED`] without changing the table if an
    /// argument is invalid or either pin is already connected.
    pub fn add_pins_to_table(
        &mut self,
        comp1: ComponentId,
        pin1: &str,
        comp2: ComponentId,
        pin2: &str,
    ) -> NetId {
        if pin1.is_empty() || pin2.is_empty() {
            tracing::warn!(%comp1, %comp2, "pin names must be non-empty; no net added");
            return NetId::UNCONNECTED;
        }
        if comp1 == comp2 {
            tracing::warn!(component.id = %comp1, pin1, pin2, "cannot connect a component to itself; no net added");
            return NetId::UNCONNECTED;
        }
        for (comp, pin) in [(comp1, pin1), (comp2, pin2)] {
            if let Some(net) = self.net_for_pin(comp, pin) {
                tracing::warn!(
                    component.id = %comp,
                    pin,
                    net.id = %net,
                    "pin is already connected; no net added"
                );
                return NetId::UNCONNECTED;
            }
        }

        let net_id = self.latest.alloc();
        self.rows.push(NetRow {
            net_id,
            component_id: comp1,
            pin_name: pin1.into(),
        });
        self.rows.push(NetRow {
            net_id,
            component_id: comp2,
            pin_name: pin2.into(),
        });
        tracing::debug!(net.id = %net_id, %comp1, pin1, %comp2, pin2, "added net");
        net_id
    }

    /// Removes every row of the given net.
    pub fn delete_net_id(&mut self, net_id: NetId) {
        let before = self.rows.len();
        self.rows.retain(|row| row.net_id != net_id);
        if self.rows.len() != before {
            tracing::debug!(net.id = %net_id, "deleted net");
        }
    }

    /// Removes every net that touches the given component, including the
    /// partner rows on other components. Returns the removed net IDs.
    pub fn delete_all_pins_for_component(&mut self, component_id: ComponentId) -> BTreeSet<NetId> {
        let nets: BTreeSet<NetId> = self
            .rows
            .iter()
            .filter(|row| row.component_id == component_id)
            .map(|row| row.net_id)
            .collect();
        self.rows.retain(|row| !nets.contains(&row.net_id));
        nets
    }

    /// The pins on the given net.
    pub fn get_components_and_pins_for_netid(&self, net_id: NetId) -> Vec<(ComponentId, ArcStr)> {
        self.rows
            .iter()
            .filter(|row| row.net_id == net_id)
            .map(|row| (row.component_id, row.pin_name.clone()))
            .collect()
    }

    /// The net a pin is on, if any.
    pub fn net_for_pin(&self, component_id: ComponentId, pin: &str) -> Option<NetId> {
        self.rows
            .iter()
            .find(|row| row.component_id == component_id && row.pin_name == pin)
            .map(|row| row.net_id)
    }

    /// All rows, in insertion order.
    pub fn net_info(&self) -> &[NetRow] {
        &self.rows
    }

    /// The distinct net IDs in the table.
    pub fn net_ids(&self) -> BTreeSet<NetId> {
        self.rows.iter().map(|row| row.net_id).collect()
    }

    /// The most recently allocated net ID, or zero if none has been allocated.
    pub fn qnet_latest_assigned_id(&self) -> NetId {
        self.latest
    }

    /// Returns `true` if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Removes all rows and restarts net numbering.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.latest = NetId::new();
    }

    #[cfg(test)]
    pub(crate) fn push_raw(&mut self, row: NetRow) {
        self.rows.push(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(id: u64) -> ComponentId {
        ComponentId::from_raw(id)
    }

    #[test_log::test]
    fn net_ids_are_monotonic_from_one() {
        let mut nets = NetTable::new();
        let a = nets.add_pins_to_table(c(1), "tie", c(2), "start");
        let b = nets.add_pins_to_table(c(2), "end", c(3), "tie");
        assert_eq!(a.raw(), 1);
        assert_eq!(b.raw(), 2);
        assert_eq!(nets.qnet_latest_assigned_id(), b);
        assert_eq!(nets.net_info().len(), 4);
    }

    #[test_log::test]
    fn pins_in_use_are_rejected() {
        let mut nets = NetTable::new();
        nets.add_pins_to_table(c(1), "tie", c(2), "start");
        assert_eq!(
            nets.add_pins_to_table(c(3), "tie", c(1), "tie"),
            NetId::UNCONNECTED
        );
        assert_eq!(nets.net_info().len(), 2);
    }

    #[test_log::test]
    fn invalid_arguments_are_rejected() {
        let mut nets = NetTable::new();
        assert!(nets.add_pins_to_table(c(1), "", c(2), "a").is_zero());
        assert!(nets.add_pins_to_table(c(1), "a", c(1), "b").is_zero());
        assert!(nets.is_empty());
        assert!(nets.qnet_latest_assigned_id().is_zero());
    }

    #[test]
    fn deleting_a_component_removes_partner_rows() {
        let mut nets = NetTable::new();
        let n1 = nets.add_pins_to_table(c(1), "tie", c(2), "start");
        let n2 = nets.add_pins_to_table(c(2), "end", c(3), "tie");
        let n3 = nets.add_pins_to_table(c(3), "a", c(4), "b");

        let removed = nets.delete_all_pins_for_component(c(2));
        assert_eq!(removed, BTreeSet::from([n1, n2]));
        assert_eq!(nets.net_ids(), BTreeSet::from([n3]));
        assert!(nets.net_for_pin(c(1), "tie").is_none());

        // IDs are never reused.
        let n4 = nets.add_pins_to_table(c(1), "tie", c(3), "tie");
        assert_eq!(n4.raw(), 4);
    }

    #[test]
    fn pins_for_net() {
        let mut nets = NetTable::new();
        let n = nets.add_pins_to_table(c(5), "a", c(6), "b");
        assert_eq!(
            nets.get_components_and_pins_for_netid(n),
            vec![(c(5), ArcStr::from("a")), (c(6), ArcStr::from("b"))]
        );
        nets.delete_net_id(n);
        assert!(nets.get_components_and_pins_for_netid(n).is_empty());
    }
}
