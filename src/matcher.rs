use crate::config::{MIN_TOKEN_LEN, NAME_STOP_WORDS};

/// A team record as seen by one provider, reduced to what matching needs.
#[derive(Debug, Clone)]
pub struct TeamRecord {
    pub id: String,
    pub name: String,
}

impl TeamRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

/// Result of matching provider-B teams against provider-A teams.
/// Unmatched entries are an expected outcome for operator review, not errors.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    /// (provider_a_id, provider_b_id)
    pub mapped: Vec<(String, String)>,
    pub unmatched: Vec<String>,
}

/// Uppercase, strip non-alphanumerics, split, drop short tokens and
/// generic club suffixes.
pub fn tokenize(name: &str) -> Vec<String> {
    name.to_uppercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|t| t.len() >= MIN_TOKEN_LEN && !NAME_STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Map each provider-B team onto the provider-A team sharing the most name
/// tokens. Greedy per B team, ties to the first-seen A candidate; a match is
/// accepted only when the overlap clears `min(2, ceil(min(|ta|,|tb|)/2))`.
pub fn match_teams(provider_a: &[TeamRecord], provider_b: &[TeamRecord]) -> MatchOutcome {
    let a_tokens: Vec<(usize, Vec<String>)> = provider_a
        .iter()
        .enumerate()
        .map(|(i, t)| (i, tokenize(&t.name)))
        .collect();

    let mut outcome = MatchOutcome::default();

    for b in provider_b {
        let b_tokens = tokenize(&b.name);
        let mut best: Option<(usize, usize)> = None; // (a_index, overlap)

        for (a_idx, tokens) in &a_tokens {
            let overlap = tokens.iter().filter(|t| b_tokens.contains(t)).count();
            match best {
                Some((_, best_overlap)) if overlap <= best_overlap => {}
                _ => best = Some((*a_idx, overlap)),
            }
        }

        // Accept the winner only if the overlap clears the pair's threshold.
        let accepted = best.filter(|&(a_idx, overlap)| {
            overlap >= required_overlap(a_tokens[a_idx].1.len(), b_tokens.len()) && overlap > 0
        });

        match accepted {
            Some((a_idx, _)) => outcome
                .mapped
                .push((provider_a[a_idx].id.clone(), b.id.clone())),
            None => outcome.unmatched.push(b.id.clone()),
        }
    }

    outcome
}

fn required_overlap(len_a: usize, len_b: usize) -> usize {
    let shorter = len_a.min(len_b);
    2.min(shorter.div_ceil(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(id: &str, name: &str) -> TeamRecord {
        TeamRecord::new(id, name)
    }

    #[test]
    fn tokenize_drops_noise() {
        assert_eq!(
            tokenize("Real Madrid Baloncesto S.A.D."),
            vec!["REAL", "MADRID"]
        );
        assert_eq!(tokenize("C.B. Gran Canaria"), vec!["GRAN", "CANARIA"]);
    }

    #[test]
    fn overlap_of_two_on_short_name_matches() {
        // ["REAL","MADRID","BALONCESTO"] vs ["REAL","MADRID"]: stop-word
        // filtering aside, a 2-token overlap always clears the threshold.
        let a = vec![team("a1", "Real Madrid Baloncesto")];
        let b = vec![team("b1", "Real Madrid")];
        let outcome = match_teams(&a, &b);
        assert_eq!(outcome.mapped, vec![("a1".to_string(), "b1".to_string())]);
        assert!(outcome.unmatched.is_empty());
    }

    #[test]
    fn disjoint_names_do_not_match() {
        let a = vec![team("a1", "Valencia Basket")];
        let b = vec![team("b1", "Unicaja Malaga")];
        let outcome = match_teams(&a, &b);
        assert!(outcome.mapped.is_empty());
        assert_eq!(outcome.unmatched, vec!["b1".to_string()]);
    }

    #[test]
    fn best_overlap_wins() {
        let a = vec![
            team("a1", "Madrid Chamberi"),
            team("a2", "Real Madrid"),
        ];
        let b = vec![team("b1", "Real Madrid Baloncesto")];
        let outcome = match_teams(&a, &b);
        assert_eq!(outcome.mapped, vec![("a2".to_string(), "b1".to_string())]);
    }

    #[test]
    fn permutation_invariant() {
        let a1 = vec![
            team("a1", "Real Madrid"),
            team("a2", "Barcelona Basquet"),
            team("a3", "Valencia Basket"),
        ];
        let mut a2 = a1.clone();
        a2.reverse();
        let b = vec![
            team("b1", "Valencia Basket Club"),
            team("b2", "Real Madrid Baloncesto"),
            team("b3", "Barcelona"),
        ];

        let mut m1 = match_teams(&a1, &b).mapped;
        let mut m2 = match_teams(&a2, &b).mapped;
        m1.sort();
        m2.sort();
        assert_eq!(m1, m2);
    }

    #[test]
    fn unmatched_is_reported_not_dropped() {
        let a = vec![team("a1", "Real Madrid")];
        let b = vec![
            team("b1", "Real Madrid"),
            team("b2", "Completely Different"),
        ];
        let outcome = match_teams(&a, &b);
        assert_eq!(outcome.mapped.len(), 1);
        assert_eq!(outcome.unmatched, vec!["b2".to_string()]);
    }
}
