// Path: crates/committee/src/selector.rs

//! Stake-weighted, diversity-constrained committee sampling.

use rand::Rng;
use std::collections::HashMap;
use swarm_types::committee::{DiversityConstraints, VerifierManifest};
use swarm_types::error::CommitteeError;
use tracing::debug;

const NS_PER_DAY: f64 = 86_400.0 * 1e9;

pub struct CommitteeSelector {
    constraints: DiversityConstraints,
}

impl CommitteeSelector {
    pub fn new(constraints: DiversityConstraints) -> Self {
        Self { constraints }
    }

    /// Sampling weight: `sqrt(stake) × reputation × recency_factor`. The
    /// square root dampens whale influence; recency decays linearly to a
    /// 0.8 floor over a year.
    pub fn weight(&self, manifest: &VerifierManifest, now_ns: u64) -> f64 {
        let age_days = now_ns.saturating_sub(manifest.registered_at_ns) as f64 / NS_PER_DAY;
        let recency = (1.0 - (age_days / 365.0).min(1.0) * 0.2).max(0.8);
        (manifest.stake as f64).sqrt() * manifest.metadata.reputation * recency
    }

    /// Weighted random sampling without replacement under running
    /// per-org/ASN/region caps of `ceil(k × max_frac)` each. Candidates
    /// are walked in verifier-id order so equal weights resolve
    /// deterministically for a seeded RNG.
    pub fn select<R: Rng>(
        &self,
        candidates: &[VerifierManifest],
        k: usize,
        min_stake: u64,
        now_ns: u64,
        rng: &mut R,
    ) -> Result<Vec<VerifierManifest>, CommitteeError> {
        let mut eligible: Vec<&VerifierManifest> = candidates
            .iter()
            .filter(|m| m.active && m.stake >= min_stake)
            .collect();
        eligible.sort_by(|a, b| a.verifier_id.cmp(&b.verifier_id));

        if eligible.len() < k {
            return Err(CommitteeError::InsufficientVerifiers {
                needed: k,
                available: eligible.len(),
            });
        }

        let org_cap = (k as f64 * self.constraints.max_org_frac).ceil() as usize;
        let asn_cap = (k as f64 * self.constraints.max_asn_frac).ceil() as usize;
        let region_cap = (k as f64 * self.constraints.max_region_frac).ceil() as usize;

        let mut org_counts: HashMap<&str, usize> = HashMap::new();
        let mut asn_counts: HashMap<&str, usize> = HashMap::new();
        let mut region_counts: HashMap<&str, usize> = HashMap::new();
        let mut selected: Vec<VerifierManifest> = Vec::with_capacity(k);
        let mut taken = vec![false; eligible.len()];

        while selected.len() < k {
            let fits = |m: &VerifierManifest| {
                org_counts.get(m.metadata.org_id.as_str()).copied().unwrap_or(0) < org_cap
                    && asn_counts.get(m.metadata.asn.as_str()).copied().unwrap_or(0) < asn_cap
                    && region_counts
                        .get(m.metadata.region.as_str())
                        .copied()
                        .unwrap_or(0)
                        < region_cap
            };

            let total: f64 = eligible
                .iter()
                .enumerate()
                .filter(|(i, m)| !taken[*i] && fits(m))
                .map(|(_, m)| self.weight(m, now_ns))
                .sum();

            if total <= 0.0 {
                return Err(CommitteeError::ConstraintsUnsatisfiable { k });
            }

            let mut draw = rng.gen_range(0.0..total);
            let mut pick = None;
            for (i, m) in eligible.iter().enumerate() {
                if taken[i] || !fits(m) {
                    continue;
                }
                let w = self.weight(m, now_ns);
                if draw < w {
                    pick = Some(i);
                    break;
                }
                draw -= w;
            }
            // Float accumulation can leave the draw epsilon past the last
            // candidate; fall back to the last eligible one.
            let pick = match pick {
                Some(i) => i,
                None => match eligible
                    .iter()
                    .enumerate()
                    .rev()
                    .find(|(i, m)| !taken[*i] && fits(m))
                {
                    Some((i, _)) => i,
                    None => return Err(CommitteeError::ConstraintsUnsatisfiable { k }),
                },
            };

            taken[pick] = true;
            let chosen = eligible[pick];
            *org_counts.entry(chosen.metadata.org_id.as_str()).or_insert(0) += 1;
            *asn_counts.entry(chosen.metadata.asn.as_str()).or_insert(0) += 1;
            *region_counts
                .entry(chosen.metadata.region.as_str())
                .or_insert(0) += 1;
            selected.push(chosen.clone());
        }

        debug!(target: "committee", k, selected = selected.len(), "committee selected");
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use swarm_types::committee::VerifierMetadata;

    fn manifest(id: &str, stake: u64, rep: f64, org: &str, asn: &str, region: &str) -> VerifierManifest {
        VerifierManifest {
            verifier_id: id.to_string(),
            stake,
            capabilities: vec![],
            metadata: VerifierMetadata {
                org_id: org.to_string(),
                asn: asn.to_string(),
                region: region.to_string(),
                reputation: rep,
            },
            pubkey: vec![0; 32],
            registered_at_ns: 0,
            active: true,
            signature: String::new(),
        }
    }

    #[test]
    fn test_weight_formula() {
        let selector = CommitteeSelector::new(DiversityConstraints::default());
        let m = manifest("v", 10_000, 0.9, "o", "a", "r");
        // sqrt(10000) * 0.9 * ~1.0 recency = 90 for a fresh registration.
        let w = selector.weight(&m, 0);
        assert!(w > 85.0 && w < 95.0);
    }

    #[test]
    fn test_sqrt_dampens_whales() {
        let selector = CommitteeSelector::new(DiversityConstraints::default());
        let small = manifest("s", 10_000, 0.9, "o", "a", "r");
        let whale = manifest("w", 40_000, 0.9, "o", "a", "r");
        let ratio = selector.weight(&whale, 0) / selector.weight(&small, 0);
        // 4x stake buys only 2x weight.
        assert!((ratio - 2.0).abs() < 0.01);
    }

    #[test]
    fn test_recency_floor() {
        let selector = CommitteeSelector::new(DiversityConstraints::default());
        let mut old = manifest("o", 10_000, 1.0, "o", "a", "r");
        old.registered_at_ns = 0;
        let now = (10.0 * 365.0 * NS_PER_DAY) as u64;
        // Ten years old: recency bottoms out at 0.8.
        let w = selector.weight(&old, now);
        assert!((w - 100.0 * 0.8).abs() < 0.01);
    }

    #[test]
    fn test_insufficient_verifiers() {
        let selector = CommitteeSelector::new(DiversityConstraints::default());
        let candidates = vec![manifest("a", 1000, 0.9, "o", "a", "r")];
        let mut rng = StdRng::seed_from_u64(7);
        assert!(matches!(
            selector.select(&candidates, 3, 100, 0, &mut rng),
            Err(CommitteeError::InsufficientVerifiers { needed: 3, available: 1 })
        ));
    }

    #[test]
    fn test_min_stake_filtering() {
        let selector = CommitteeSelector::new(DiversityConstraints::default());
        let candidates = vec![
            manifest("a", 1000, 0.9, "o1", "a1", "r1"),
            manifest("b", 50, 0.9, "o2", "a2", "r2"),
            manifest("c", 1000, 0.9, "o3", "a3", "r3"),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let picked = selector.select(&candidates, 2, 100, 0, &mut rng).unwrap();
        assert!(picked.iter().all(|m| m.stake >= 100));
    }

    #[test]
    fn test_diversity_caps_hold() {
        let constraints = DiversityConstraints {
            max_org_frac: 0.30,
            max_asn_frac: 0.40,
            max_region_frac: 0.50,
        };
        let selector = CommitteeSelector::new(constraints);

        // 12 candidates across 4 orgs, 3 ASNs, 2 regions.
        let mut candidates = Vec::new();
        for i in 0..12 {
            candidates.push(manifest(
                &format!("v{:02}", i),
                1000 + i as u64 * 100,
                0.9,
                &format!("org_{}", i % 4),
                &format!("AS{}", i % 3),
                &format!("region_{}", i % 2),
            ));
        }

        let k = 5;
        let org_cap = (k as f64 * 0.30).ceil() as usize; // 2
        let asn_cap = (k as f64 * 0.40).ceil() as usize; // 2
        let region_cap = (k as f64 * 0.50).ceil() as usize; // 3

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = selector.select(&candidates, k, 100, 0, &mut rng).unwrap();
            assert_eq!(picked.len(), k);

            let mut orgs: HashMap<&str, usize> = HashMap::new();
            let mut asns: HashMap<&str, usize> = HashMap::new();
            let mut regions: HashMap<&str, usize> = HashMap::new();
            for m in &picked {
                *orgs.entry(m.metadata.org_id.as_str()).or_insert(0) += 1;
                *asns.entry(m.metadata.asn.as_str()).or_insert(0) += 1;
                *regions.entry(m.metadata.region.as_str()).or_insert(0) += 1;
            }
            assert!(orgs.values().all(|&c| c <= org_cap), "org cap violated");
            assert!(asns.values().all(|&c| c <= asn_cap), "asn cap violated");
            assert!(regions.values().all(|&c| c <= region_cap), "region cap violated");
        }
    }

    #[test]
    fn test_high_weight_selected_more_often() {
        let selector = CommitteeSelector::new(DiversityConstraints {
            max_org_frac: 1.0,
            max_asn_frac: 1.0,
            max_region_frac: 1.0,
        });
        let mut candidates = vec![manifest("heavy", 1_000_000, 0.95, "oh", "ah", "rh")];
        for i in 0..9 {
            candidates.push(manifest(
                &format!("light{}", i),
                100,
                0.5,
                &format!("o{}", i),
                &format!("a{}", i),
                &format!("r{}", i),
            ));
        }

        let mut hits = 0;
        for seed in 0..100 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = selector.select(&candidates, 1, 1, 0, &mut rng).unwrap();
            if picked[0].verifier_id == "heavy" {
                hits += 1;
            }
        }
        assert!(hits > 50, "heavy verifier picked only {}/100 times", hits);
    }

    #[test]
    fn test_sampling_is_without_replacement() {
        let selector = CommitteeSelector::new(DiversityConstraints {
            max_org_frac: 1.0,
            max_asn_frac: 1.0,
            max_region_frac: 1.0,
        });
        let candidates: Vec<VerifierManifest> = (0..6)
            .map(|i| manifest(&format!("v{}", i), 1000, 0.9, "o", "a", "r"))
            .collect();
        let mut rng = StdRng::seed_from_u64(3);
        let picked = selector.select(&candidates, 6, 1, 0, &mut rng).unwrap();
        let mut ids: Vec<&str> = picked.iter().map(|m| m.verifier_id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 6);
    }
}
