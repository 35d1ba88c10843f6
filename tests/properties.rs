//! Property-based checks for the book invariants, driven by random order
//! sequences rather than hand-picked scenarios.

mod common;

use axob::book::Axob;
use axob::config::EngineConfig;
use axob::messages::Msg;
use axob::types::{OrdType, Price, Qty, Side, SourceExchange, TradingPhaseMarket};
use proptest::prelude::*;

/// One random order event: a side, a price near the starting reference,
/// and a small quantity, fed during continuous AM trading.
#[derive(Debug, Clone)]
struct OrderEvent {
    side: Side,
    price: Price,
    qty: Qty,
}

fn order_event() -> impl Strategy<Value = OrderEvent> {
    (prop_oneof![Just(Side::Bid), Just(Side::Ask)], 980u32..1020, 1u64..200).prop_map(
        |(side, price, qty)| OrderEvent { side, price, qty },
    )
}

fn run_events(events: &[OrderEvent]) -> Axob {
    let instr = common::instrument(1, SourceExchange::Szse);
    let mut book = Axob::new(EngineConfig::default(), instr);
    book.on_msg(Msg::Snapshot(common::starting_snapshot(&instr, 1000, 1100, 900)))
        .unwrap();

    for (i, ev) in events.iter().enumerate() {
        let seq = (i + 1) as u32;
        book.on_msg(Msg::Order(common::order(
            &instr,
            seq,
            ev.side,
            OrdType::Limit,
            ev.price,
            ev.qty,
            seq as u64,
            TradingPhaseMarket::AMTrading,
        )))
        .unwrap();
    }
    book
}

proptest! {
    /// P1: registry qty on a side always equals that side's visible-level
    /// qty plus whatever the cage currently hides (zero here, no GEM cage).
    #[test]
    fn p1_registry_matches_visible_plus_hidden(events in prop::collection::vec(order_event(), 0..30)) {
        let book = run_events(&events);
        for side in [Side::Bid, Side::Ask] {
            prop_assert_eq!(
                book.registry_qty(side),
                book.visible_level_qty(side) + book.hidden_qty(side)
            );
        }
    }

    /// P2: a non-empty visible ladder's best entry always has positive qty,
    /// and an empty one reports the (0, 0) sentinel.
    #[test]
    fn p2_best_is_consistent_with_presence(events in prop::collection::vec(order_event(), 0..30)) {
        let book = run_events(&events);
        for side in [Side::Bid, Side::Ask] {
            let (px, qty) = book.best(side);
            if book.visible_level_qty(side) == 0 {
                prop_assert_eq!((px, qty), (0, 0));
            } else {
                prop_assert!(qty > 0);
            }
        }
    }

    /// P3: the weighted-total size always equals the sum of qty across the
    /// side's visible levels — `WeightedTotals` is just an incremental
    /// view over the same level additions/removals.
    #[test]
    fn p3_weighted_size_matches_visible_qty(events in prop::collection::vec(order_event(), 0..30)) {
        let book = run_events(&events);
        for side in [Side::Bid, Side::Ask] {
            let (size, _) = book.weighted_totals(side);
            prop_assert_eq!(size, book.visible_level_qty(side));
        }
    }

    /// P4: whenever both sides have visible liquidity, the book never
    /// rests in a crossed state — continuous trading either executes a
    /// crossing order immediately or defers it to the holding slot.
    #[test]
    fn p4_no_resting_crossed_spread(events in prop::collection::vec(order_event(), 0..30)) {
        let book = run_events(&events);
        let (bid_px, bid_qty) = book.best(Side::Bid);
        let (ask_px, ask_qty) = book.best(Side::Ask);
        if bid_qty > 0 && ask_qty > 0 {
            prop_assert!(bid_px < ask_px);
        }
    }

    /// P6: the holding slot holds at most one order, by construction —
    /// `is_holding` is a plain bool, never a count, so this just confirms
    /// the engine never panics walking a sequence that repeatedly
    /// contends for the slot.
    #[test]
    fn p6_holding_slot_stays_well_formed(events in prop::collection::vec(order_event(), 0..30)) {
        let book = run_events(&events);
        let _ = book.is_holding();
    }

    /// P5: seqnums strictly increase; replaying the exact same sequence
    /// twice through two independently built engines keeps both engines'
    /// notion of "last seqnum seen" in lockstep (observed indirectly here
    /// via P7's identical-output check, since `last_appl_seq_num` itself
    /// is private).
    ///
    /// P7: two engines fed the identical message sequence from a cold
    /// start produce bit-identical snapshots at every step.
    #[test]
    fn p7_identical_sequences_produce_identical_snapshots(events in prop::collection::vec(order_event(), 1..30)) {
        let instr = common::instrument(1, SourceExchange::Szse);
        let mut a = Axob::new(EngineConfig::default(), instr);
        let mut b = Axob::new(EngineConfig::default(), instr);
        a.on_msg(Msg::Snapshot(common::starting_snapshot(&instr, 1000, 1100, 900))).unwrap();
        b.on_msg(Msg::Snapshot(common::starting_snapshot(&instr, 1000, 1100, 900))).unwrap();

        for (i, ev) in events.iter().enumerate() {
            let seq = (i + 1) as u32;
            let msg = || Msg::Order(common::order(
                &instr, seq, ev.side, OrdType::Limit, ev.price, ev.qty, seq as u64, TradingPhaseMarket::AMTrading,
            ));
            let out_a = a.on_msg(msg()).unwrap();
            let out_b = b.on_msg(msg()).unwrap();
            prop_assert_eq!(out_a.len(), out_b.len());
            for (sa, sb) in out_a.iter().zip(out_b.iter()) {
                prop_assert_eq!(&sa.bid, &sb.bid);
                prop_assert_eq!(&sa.ask, &sb.ask);
                prop_assert_eq!(sa.num_trades, sb.num_trades);
            }
        }
    }
}
