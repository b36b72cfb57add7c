use std::collections::HashMap;

use crate::config::POSTPONED_MARKER;

/// A round as delivered by the provider, before canonicalization.
#[derive(Debug, Clone)]
pub struct RawRound {
    pub id: i64,
    pub name: String,
    pub postponed: bool,
}

/// Strip the postponement marker and trim. The provider flags rescheduled
/// rounds explicitly, but display names may still embed the marker, so both
/// paths normalize to the same base name.
pub fn base_name(name: &str) -> String {
    name.replace(POSTPONED_MARKER, "").trim().to_string()
}

/// Base name → canonical round id. The canonical id of a group is the
/// minimum id among rounds sharing that base name, so a postponed duplicate
/// always collapses onto the original fixture. Order-independent: any
/// permutation of `rounds` yields the same map.
pub fn canonical_map(rounds: &[RawRound]) -> HashMap<String, i64> {
    let mut map: HashMap<String, i64> = HashMap::new();
    for round in rounds {
        map.entry(base_name(&round.name))
            .and_modify(|id| *id = (*id).min(round.id))
            .or_insert(round.id);
    }
    map
}

/// Canonical id for one round: the group minimum, or the round's own id when
/// its base name is unseen.
pub fn canonical_id(round: &RawRound, map: &HashMap<String, i64>) -> i64 {
    map.get(&base_name(&round.name)).copied().unwrap_or(round.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(id: i64, name: &str, postponed: bool) -> RawRound {
        RawRound { id, name: name.to_string(), postponed }
    }

    #[test]
    fn postponed_round_collapses_to_original() {
        let rounds = vec![
            round(5, "Jornada 5", false),
            round(25, "Jornada 5 (aplazada)", true),
        ];
        let map = canonical_map(&rounds);
        assert_eq!(canonical_id(&rounds[0], &map), 5);
        assert_eq!(canonical_id(&rounds[1], &map), 5);
    }

    #[test]
    fn order_independent() {
        let forward = vec![
            round(5, "Jornada 5", false),
            round(12, "Jornada 12", false),
            round(25, "Jornada 5 (aplazada)", true),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();
        assert_eq!(canonical_map(&forward), canonical_map(&reversed));
    }

    #[test]
    fn idempotent_over_already_canonical_input() {
        let rounds = vec![round(1, "Jornada 1", false), round(2, "Jornada 2", false)];
        let map = canonical_map(&rounds);
        for r in &rounds {
            assert_eq!(canonical_id(r, &map), r.id);
        }
    }

    #[test]
    fn unseen_base_name_defaults_to_own_id() {
        let map = canonical_map(&[round(1, "Jornada 1", false)]);
        let stray = round(99, "Copa Final", false);
        assert_eq!(canonical_id(&stray, &map), 99);
    }

    #[test]
    fn marker_stripping_trims_whitespace() {
        assert_eq!(base_name("Jornada 5 (aplazada)"), "Jornada 5");
        assert_eq!(base_name("  Jornada 5  "), "Jornada 5");
    }
}
