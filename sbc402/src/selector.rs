//! Choosing one offer out of a challenge.

use std::cmp::Ordering;

use crate::amount::{compare_atomic, to_atomic_units};
use crate::networks::{self, NetworkConfig};
use crate::proto::PaymentRequirement;

/// Caller preferences applied when selecting an offer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionPreferences {
    /// Network to pick whenever it is among the surviving offers.
    pub preferred_network: Option<String>,
    /// Spending cap in USD as a decimal string (e.g., `"0.05"`).
    pub max_usd: Option<String>,
}

impl SelectionPreferences {
    /// Prefers `network` over every other surviving offer.
    #[must_use]
    pub fn prefer(mut self, network: impl Into<String>) -> Self {
        self.preferred_network = Some(network.into());
        self
    }

    /// Drops offers priced above `usd`.
    #[must_use]
    pub fn with_budget(mut self, usd: impl Into<String>) -> Self {
        self.max_usd = Some(usd.into());
        self
    }
}

/// Picks one offer, or `None` when nothing survives filtering.
///
/// Offers on unknown networks are dropped, as are offers costing more than
/// the budget converted at their network's precision. Among the survivors the
/// preferred network wins outright, then any testnet offer, then the cheapest.
///
/// A budget that is not a decimal number rejects every offer.
#[must_use]
pub fn select_requirement<'a>(
    offers: &'a [PaymentRequirement],
    preferences: &SelectionPreferences,
) -> Option<&'a PaymentRequirement> {
    let survivors: Vec<(&PaymentRequirement, &NetworkConfig)> = offers
        .iter()
        .filter_map(|offer| networks::lookup(&offer.network).map(|n| (offer, n)))
        .filter(|(offer, network)| within_budget(offer, network, preferences.max_usd.as_deref()))
        .collect();

    if let Some(preferred) = preferences
        .preferred_network
        .as_deref()
        .and_then(networks::lookup)
    {
        if let Some((offer, _)) = survivors.iter().find(|(_, n)| n.name == preferred.name) {
            return Some(*offer);
        }
    }

    if let Some((offer, _)) = survivors.iter().find(|(_, n)| n.testnet) {
        return Some(*offer);
    }

    survivors
        .iter()
        .min_by(|(a, _), (b, _)| cheaper(a, b))
        .map(|(offer, _)| *offer)
}

fn within_budget(offer: &PaymentRequirement, network: &NetworkConfig, max_usd: Option<&str>) -> bool {
    let Some(max_usd) = max_usd else {
        return true;
    };
    to_atomic_units(max_usd, network.decimals).is_ok_and(|budget| {
        compare_atomic(&offer.max_amount_required, &budget) != Ordering::Greater
    })
}

fn cheaper(a: &PaymentRequirement, b: &PaymentRequirement) -> Ordering {
    compare_atomic(&a.max_amount_required, &b.max_amount_required)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(network: &str, amount: &str) -> PaymentRequirement {
        PaymentRequirement::for_network(network, "0xpay", amount, "https://r").unwrap()
    }

    fn unknown(amount: &str) -> PaymentRequirement {
        PaymentRequirement {
            network: "dogechain".into(),
            ..offer("base", amount)
        }
    }

    #[test]
    fn testnet_beats_cheaper_mainnet() {
        let offers = [offer("base-sepolia", "100"), offer("base", "50")];
        let chosen = select_requirement(&offers, &SelectionPreferences::default()).unwrap();
        assert_eq!(chosen.network, "base-sepolia");
    }

    #[test]
    fn preference_wins_regardless_of_price() {
        let offers = [offer("base-sepolia", "100"), offer("base", "5000")];
        let prefs = SelectionPreferences::default().prefer("base");
        assert_eq!(select_requirement(&offers, &prefs).unwrap().network, "base");
    }

    #[test]
    fn preference_matches_chain_address() {
        let offers = [offer("base-sepolia", "100"), offer("base", "5000")];
        let prefs = SelectionPreferences::default().prefer("eip155:8453");
        assert_eq!(select_requirement(&offers, &prefs).unwrap().network, "base");
    }

    #[test]
    fn absent_preference_falls_through() {
        let offers = [offer("base", "70"), offer("polygon", "60")];
        let prefs = SelectionPreferences::default().prefer("solana");
        assert_eq!(select_requirement(&offers, &prefs).unwrap().network, "polygon");
    }

    #[test]
    fn cheapest_compares_numerically() {
        let offers = [offer("base", "900"), offer("polygon", "1000")];
        let chosen = select_requirement(&offers, &SelectionPreferences::default()).unwrap();
        assert_eq!(chosen.network, "base");
    }

    #[test]
    fn unknown_networks_are_ignored() {
        let offers = [unknown("1")];
        assert!(select_requirement(&offers, &SelectionPreferences::default()).is_none());
        let offers = [unknown("1"), offer("base", "10")];
        let chosen = select_requirement(&offers, &SelectionPreferences::default()).unwrap();
        assert_eq!(chosen.network, "base");
    }

    #[test]
    fn budget_uses_each_networks_precision() {
        // 0.01 USD is 10_000 atomic at 6 decimals and 10^16 at 18 decimals.
        let offers = [offer("base-sepolia", "20000"), offer("base", "10000000000000000")];
        let prefs = SelectionPreferences::default().with_budget("0.01");
        assert_eq!(select_requirement(&offers, &prefs).unwrap().network, "base");

        let prefs = SelectionPreferences::default().with_budget("0.001");
        assert!(select_requirement(&offers, &prefs).is_none());
    }

    #[test]
    fn malformed_budget_rejects_everything() {
        let offers = [offer("base", "1")];
        let prefs = SelectionPreferences::default().with_budget("cheap");
        assert!(select_requirement(&offers, &prefs).is_none());
    }
}
