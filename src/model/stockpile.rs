use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockpileKind {
    Antivirals,
    Vaccines,
}

impl StockpileKind {
    fn index(self) -> usize {
        self as usize
    }
}

/// Daily inventory of antivirals and vaccines at one node.
pub struct Stockpile {
    amounts: Vec<[i64; 2]>,
}

impl Stockpile {
    fn new(antivirals: i64, vaccines: i64) -> Self {
        Self {
            amounts: vec![[antivirals, vaccines]],
        }
    }

    pub fn num(&self, day: usize, kind: StockpileKind) -> i64 {
        self.amounts
            .get(day)
            .map(|a| a[kind.index()])
            .unwrap_or(0)
    }

    pub fn set_num(&mut self, day: usize, kind: StockpileKind, amount: i64) {
        if let Some(slot) = self.amounts.get_mut(day) {
            slot[kind.index()] = amount.max(0);
        }
    }

    fn advance(&mut self) {
        let last = *self.amounts.last().unwrap_or(&[0, 0]);
        self.amounts.push(last);
    }
}

/// A scheduled arrival of doses at a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub node_id: u32,
    pub day: usize,
    pub kind: StockpileKind,
    pub amount: i64,
}

/// All node stockpiles plus pending deliveries. Evolved one day at a
/// time, in lockstep with the compartment store.
#[derive(Default)]
pub struct StockpileNetwork {
    stockpiles: HashMap<u32, Stockpile>,
    deliveries: Vec<Delivery>,
}

impl StockpileNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stockpile(&mut self, node_id: u32, antivirals: i64, vaccines: i64) {
        self.stockpiles
            .insert(node_id, Stockpile::new(antivirals.max(0), vaccines.max(0)));
    }

    pub fn add_delivery(&mut self, delivery: Delivery) {
        self.deliveries.push(delivery);
    }

    pub fn node_stockpile(&self, node_id: u32) -> Option<&Stockpile> {
        self.stockpiles.get(&node_id)
    }

    pub fn node_stockpile_mut(&mut self, node_id: u32) -> Option<&mut Stockpile> {
        self.stockpiles.get_mut(&node_id)
    }

    /// Copy each inventory forward into `new_day` and apply the deliveries
    /// scheduled for it.
    pub fn evolve(&mut self, new_day: usize) {
        for stockpile in self.stockpiles.values_mut() {
            stockpile.advance();
        }
        for delivery in &self.deliveries {
            if delivery.day == new_day {
                if let Some(stockpile) = self.stockpiles.get_mut(&delivery.node_id) {
                    let current = stockpile.num(new_day, delivery.kind);
                    stockpile.set_num(new_day, delivery.kind, current + delivery.amount.max(0));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evolve_copies_forward_and_delivers() {
        let mut network = StockpileNetwork::new();
        network.add_stockpile(1, 100, 0);
        network.add_delivery(Delivery {
            node_id: 1,
            day: 2,
            kind: StockpileKind::Vaccines,
            amount: 50,
        });

        network.evolve(1);
        network.evolve(2);

        let stockpile = network.node_stockpile(1).unwrap();
        assert_eq!(stockpile.num(1, StockpileKind::Antivirals), 100);
        assert_eq!(stockpile.num(1, StockpileKind::Vaccines), 0);
        assert_eq!(stockpile.num(2, StockpileKind::Vaccines), 50);
        // beyond the evolved horizon reads as empty
        assert_eq!(stockpile.num(9, StockpileKind::Antivirals), 0);
    }

    #[test]
    fn amounts_never_go_negative() {
        let mut network = StockpileNetwork::new();
        network.add_stockpile(1, 10, 10);
        let stockpile = network.node_stockpile_mut(1).unwrap();
        stockpile.set_num(0, StockpileKind::Antivirals, -5);
        assert_eq!(stockpile.num(0, StockpileKind::Antivirals), 0);
    }
}
