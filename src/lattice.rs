//! Intersection of a string acceptor with a weighted language model, and
//! the cost of the resulting lattice.

use anyhow::Result;
use rustfst::algorithms::tr_compares::ILabelCompare;
use rustfst::algorithms::{connect, shortest_distance, tr_sort};
use rustfst::prelude::*;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::ops::Range;

/// A weighted language model whose transitions are sorted by input label.
pub struct LanguageModel {
    fst: VectorFst<TropicalWeight>,
}

impl LanguageModel {
    pub fn new(mut fst: VectorFst<TropicalWeight>) -> LanguageModel {
        tr_sort(&mut fst, ILabelCompare {});
        LanguageModel { fst }
    }

    pub fn fst(&self) -> &VectorFst<TropicalWeight> {
        &self.fst
    }

    pub fn num_states(&self) -> usize {
        self.fst.num_states()
    }
}

/// The run of `trs` with input label `label`. `trs` must be sorted by
/// input label.
fn matching(trs: &[Tr<TropicalWeight>], label: Label) -> Range<usize> {
    let lo = trs.partition_point(|tr| tr.ilabel < label);
    let hi = lo + trs[lo..].partition_point(|tr| tr.ilabel == label);
    lo..hi
}

/// Intersects an epsilon-free acceptor with `lm`, matching the acceptor's
/// labels against the model's input labels.
///
/// Model epsilon transitions (backoff arcs in n-gram models) are followed
/// without consuming a symbol. Only states that are both accessible and
/// coaccessible are kept, so the result has no start state when no path
/// through the model spells the string.
pub fn intersect(
    string: &VectorFst<TropicalWeight>,
    lm: &LanguageModel,
) -> Result<VectorFst<TropicalWeight>> {
    let lm = lm.fst();
    let mut lattice = VectorFst::new();
    let (string_start, lm_start) = match (string.start(), lm.start()) {
        (Some(s), Some(q)) => (s, q),
        _ => return Ok(lattice),
    };

    let mut states: HashMap<(StateId, StateId), StateId> = HashMap::new();
    let mut queue = VecDeque::new();
    let start = lattice.add_state();
    lattice.set_start(start)?;
    states.insert((string_start, lm_start), start);
    queue.push_back((string_start, lm_start, start));

    while let Some((s, q, state)) = queue.pop_front() {
        if let (Some(sw), Some(qw)) = (string.final_weight(s)?, lm.final_weight(q)?) {
            lattice.set_final(state, sw.times(&qw)?)?;
        }

        let string_trs = string.get_trs(s)?;
        let lm_trs = lm.get_trs(q)?;
        let lm_trs = lm_trs.trs();
        for lm_tr in &lm_trs[matching(lm_trs, EPS_LABEL)] {
            let next = target(&mut lattice, &mut states, &mut queue, s, lm_tr.nextstate);
            lattice.add_tr(
                state,
                Tr::new(EPS_LABEL, EPS_LABEL, lm_tr.weight.clone(), next),
            )?;
        }
        for string_tr in string_trs.trs() {
            for lm_tr in &lm_trs[matching(lm_trs, string_tr.ilabel)] {
                let weight = string_tr.weight.times(&lm_tr.weight)?;
                let next = target(
                    &mut lattice,
                    &mut states,
                    &mut queue,
                    string_tr.nextstate,
                    lm_tr.nextstate,
                );
                lattice.add_tr(
                    state,
                    Tr::new(string_tr.ilabel, string_tr.ilabel, weight, next),
                )?;
            }
        }
    }

    connect(&mut lattice)?;
    Ok(lattice)
}

fn target(
    lattice: &mut VectorFst<TropicalWeight>,
    states: &mut HashMap<(StateId, StateId), StateId>,
    queue: &mut VecDeque<(StateId, StateId, StateId)>,
    s: StateId,
    q: StateId,
) -> StateId {
    match states.entry((s, q)) {
        Entry::Occupied(entry) => *entry.get(),
        Entry::Vacant(entry) => {
            let state = lattice.add_state();
            queue.push_back((s, q, state));
            *entry.insert(state)
        }
    }
}

/// The shortest backward distance from the start state to a final state,
/// in the model's units (negative natural-log probability).
///
/// `None` when the lattice is empty.
pub fn shortest_cost(lattice: &VectorFst<TropicalWeight>) -> Result<Option<f64>> {
    let start = match lattice.start() {
        Some(start) => start,
        None => return Ok(None),
    };
    let distances = shortest_distance(lattice, true)?;
    Ok(distances
        .get(start as usize)
        .filter(|w| !w.is_zero())
        .map(|w| f64::from(*w.value())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strings::acceptor;
    use crate::test_fixtures::{backoff_lm, chain_lm, wide_unigram_lm};

    #[test]
    fn string_in_model_yields_path_cost() {
        let lm = LanguageModel::new(chain_lm(&[(97, 1.0), (98, 2.0)], 0.5));
        let lattice = intersect(&acceptor(&[97, 98]).unwrap(), &lm).unwrap();
        assert_eq!(lattice.num_states(), 3);
        let cost = shortest_cost(&lattice).unwrap().unwrap();
        assert!((cost - 3.5).abs() < 1e-6);
    }

    #[test]
    fn string_outside_model_has_no_start() {
        let lm = LanguageModel::new(chain_lm(&[(97, 1.0), (98, 2.0)], 0.0));
        let lattice = intersect(&acceptor(&[97, 99]).unwrap(), &lm).unwrap();
        assert!(lattice.start().is_none());
        assert_eq!(shortest_cost(&lattice).unwrap(), None);

        // A prefix of the model's only string is not accepted either.
        let lattice = intersect(&acceptor(&[97]).unwrap(), &lm).unwrap();
        assert!(lattice.start().is_none());
    }

    #[test]
    fn backoff_arcs_are_followed() {
        // 'b' after 'a' is only reachable through the backoff state.
        let lm = LanguageModel::new(backoff_lm());
        let lattice = intersect(&acceptor(&[97, 98]).unwrap(), &lm).unwrap();
        let cost = shortest_cost(&lattice).unwrap().unwrap();
        // a (1.0) + backoff (0.5) + b (2.0) + final (0.25)
        assert!((cost - 3.75).abs() < 1e-6);
    }

    #[test]
    fn cheapest_of_several_paths_wins() {
        // 'a' has a direct arc from the history state and, via backoff, a
        // cheaper one from the unigram state.
        let lm = LanguageModel::new(backoff_lm());
        let lattice = intersect(&acceptor(&[97, 97]).unwrap(), &lm).unwrap();
        let cost = shortest_cost(&lattice).unwrap().unwrap();
        // a (1.0) + min(direct a 3.0, backoff 0.5 + a 1.0) + final (0.25)
        assert!((cost - 2.75).abs() < 1e-6);
    }

    #[test]
    fn matching_finds_label_runs() {
        let trs: Vec<Tr<TropicalWeight>> = [0, 0, 3, 5, 5, 5, 9]
            .iter()
            .map(|&l| Tr::new(l, l, TropicalWeight::one(), 0))
            .collect();
        assert_eq!(matching(&trs, EPS_LABEL), 0..2);
        assert_eq!(matching(&trs, 5), 3..6);
        assert_eq!(matching(&trs, 4), 3..3);
        assert_eq!(matching(&trs, 10), 7..7);
    }

    #[test]
    fn wide_model_is_searched_after_sorting() {
        // Arcs are added in descending label order, with the epsilon last.
        let lm = LanguageModel::new(wide_unigram_lm(5000));
        let labels: Vec<Label> = vec![4999, 17, 2500, 1, 5000];
        let lattice = intersect(&acceptor(&labels).unwrap(), &lm).unwrap();
        let cost = shortest_cost(&lattice).unwrap().unwrap();
        let expected: f64 = labels.iter().map(|&l| f64::from(l) / 1000.0).sum();
        assert!((cost - expected).abs() < 1e-3, "{} != {}", cost, expected);

        let lattice = intersect(&acceptor(&[5001]).unwrap(), &lm).unwrap();
        assert!(lattice.start().is_none());
    }
}
