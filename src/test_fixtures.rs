//! Small hand-built language models shared by the unit tests.

use rustfst::prelude::*;

/// A model accepting exactly one string: `arcs` in sequence, then `final_cost`.
pub fn chain_lm(arcs: &[(Label, f32)], final_cost: f32) -> VectorFst<TropicalWeight> {
    let mut fst = VectorFst::new();
    let mut state = fst.add_state();
    fst.set_start(state).unwrap();
    for &(label, cost) in arcs {
        let next = fst.add_state();
        fst.add_tr(state, Tr::new(label, label, TropicalWeight::new(cost), next))
            .unwrap();
        state = next;
    }
    fst.set_final(state, TropicalWeight::new(final_cost)).unwrap();
    fst
}

/// A bigram-shaped model over `a` (97) and `b` (98).
///
/// State 0 is the unigram state, 1 remembers `a`, 2 remembers `b`. The
/// history states back off to 0 with cost 0.5 and are final with cost 0.25.
pub fn backoff_lm() -> VectorFst<TropicalWeight> {
    let mut fst = VectorFst::new();
    let unigram = fst.add_state();
    let after_a = fst.add_state();
    let after_b = fst.add_state();
    fst.set_start(unigram).unwrap();
    fst.add_tr(unigram, Tr::new(97, 97, TropicalWeight::new(1.0), after_a))
        .unwrap();
    fst.add_tr(unigram, Tr::new(98, 98, TropicalWeight::new(2.0), after_b))
        .unwrap();
    fst.add_tr(after_a, Tr::new(97, 97, TropicalWeight::new(3.0), after_a))
        .unwrap();
    for history in [after_a, after_b] {
        let backoff = Tr::new(EPS_LABEL, EPS_LABEL, TropicalWeight::new(0.5), unigram);
        fst.add_tr(history, backoff).unwrap();
        fst.set_final(history, TropicalWeight::new(0.25)).unwrap();
    }
    fst
}

/// The model under which the byte string `ab` costs ln 4 nats.
pub fn quarter_lm() -> VectorFst<TropicalWeight> {
    let half = std::f32::consts::LN_2;
    chain_lm(&[(97, half), (98, half)], 0.0)
}

/// One state looping on every label in `1..=vocab` with cost `label / 1000`,
/// plus an epsilon self-loop. Arcs are added in descending label order.
pub fn wide_unigram_lm(vocab: Label) -> VectorFst<TropicalWeight> {
    let mut fst = VectorFst::new();
    let state = fst.add_state();
    fst.set_start(state).unwrap();
    for label in (1..=vocab).rev() {
        let cost = TropicalWeight::new(label as f32 / 1000.0);
        fst.add_tr(state, Tr::new(label, label, cost, state)).unwrap();
    }
    let backoff = Tr::new(EPS_LABEL, EPS_LABEL, TropicalWeight::new(1.0), state);
    fst.add_tr(state, backoff).unwrap();
    fst.set_final(state, TropicalWeight::one()).unwrap();
    fst
}

/// A word-level symbol table: `<eps>` 0, `the` 1, `cat` 2.
pub fn word_symbols() -> SymbolTable {
    let mut table = SymbolTable::new();
    table.add_symbol("the");
    table.add_symbol("cat");
    table
}
