//! Location ↔ position properties across mixed scores.

use assert_approx_eq::assert_approx_eq;
use soap_score::{Interpreter, Location, Timeline};

const MIXED: &str = "\
BAR 1 [4/4] TEMPO [1/4]=60 \"start\"
BAR 3 [6/8] TEMPO [3/8]=[1/4]
BAR 5 [7/8] TEMPO [1/8]=160 curve 1.5
BAR 8 TEMPO [1/8]=220 |3 FERMATA [1/8]=2*
BAR 9 [3s] \"drone\"
BAR 10 [2+2+3/8] TEMPO [1/8]=180 |2 FERMATA [1/4]=1.5s
BAR 12 [3/4] TEMPO [1/4]=90 |2.5 \"late\"
BAR 14 END
";

/// A fermata held across a barline, a fixed-length bar and an equivalence
/// inside a curve.
const CROSSINGS: &str = "\
BAR 1 [4/4] TEMPO [1/4]=60 |4 FERMATA [1/2]=3s
BAR 2
BAR 3 TEMPO [1/4]=60 curve
BAR 4 [3s] \"still\"
BAR 5 [4/4] |3 TEMPO [1/8]=[1/4]
BAR 6 TEMPO [1/4]=120
BAR 7 END
";

fn mixed() -> Interpreter {
    Interpreter::parse(MIXED).unwrap()
}

fn crossings() -> Interpreter {
    Interpreter::parse(CROSSINGS).unwrap()
}

fn all() -> [Interpreter; 2] {
    [mixed(), crossings()]
}

#[test]
fn reference_positions() {
    let simple = Interpreter::parse("BAR 1 [4/4] TEMPO [1/4]=60").unwrap();
    assert_approx_eq!(simple.position_at_location(1, 1.0).unwrap(), 0.0);
    assert_approx_eq!(simple.position_at_location(1, 2.0).unwrap(), 1.0);
    assert_approx_eq!(simple.position_at_location(2, 1.0).unwrap(), 4.0);

    let irregular = Interpreter::parse("BAR 1 [5/8] TEMPO [3/8]=60").unwrap();
    assert_approx_eq!(irregular.position_at_location(2, 1.0).unwrap(), 1.667, 1e-3);
}

fn end_position(i: &Interpreter) -> f64 {
    let end = i.end_location().unwrap();
    i.position_at_location(end.bar, end.beat).unwrap()
}

#[test]
fn positions_are_monotonic() {
    for i in all() {
        let positions: Vec<f64> = Timeline::new(&i).map(|infos| infos.position).collect();
        assert!(positions.windows(2).all(|w| w[1] > w[0]));

        let end = end_position(&i);
        let mut last = Location::START;
        let mut position = 0.0;
        while position <= end {
            let location = i.location_at_position(position).unwrap();
            assert!(!location.before(&last), "{location} went back from {last}");
            last = location;
            position += 0.1;
        }
    }
}

#[test]
fn location_then_position_is_identity() {
    for i in all() {
        let end = end_position(&i);
        let mut position = 0.0;
        while position < end {
            let location = i.location_at_position(position).unwrap();
            let back = i.position_at_location(location.bar, location.beat).unwrap();
            assert_approx_eq!(back, position, 1e-3);
            position += 0.37;
        }
    }
}

#[test]
fn position_then_location_is_identity() {
    for i in all() {
        for infos in Timeline::new(&i) {
            let location = i.location_at_position(infos.position).unwrap();
            assert_eq!(location.bar, infos.location.bar);
            assert_approx_eq!(location.beat, infos.location.beat, 1e-3);
        }
    }
}

#[test]
fn fermata_held_across_barline() {
    let i = crossings();
    let held = i.location_infos(1, 4.0).unwrap();
    assert_approx_eq!(held.dt, 3.0);
    let release = i.next_location_infos(1, 4.0).unwrap().unwrap();
    assert_eq!(release.location, Location::new(2, 2.0));
    assert_approx_eq!(release.position - held.position, 3.0);
    assert_approx_eq!(i.position_at_location(3, 1.0).unwrap(), 9.0);
}

#[test]
fn fixed_length_bar_inside_curve() {
    let i = crossings();
    assert_approx_eq!(
        i.position_at_location(5, 1.0).unwrap() - i.position_at_location(4, 1.0).unwrap(),
        3.0
    );
    assert_eq!(i.curve_bpm_at(4, 1.0).unwrap(), None);
    assert_eq!(i.labels(), vec!["still"]);
}

#[test]
fn equivalence_inside_curve_keeps_it_running() {
    let i = crossings();
    for beat in [1.0, 3.0, 4.0] {
        let bpm = i.curve_bpm_at(5, beat).unwrap().unwrap();
        assert!(bpm > 60.0 && bpm < 120.0, "{beat}: {bpm}");
    }
    assert!(i.curve_bpm_at(5, 4.0).unwrap() > i.curve_bpm_at(5, 1.0).unwrap());
    assert_eq!(i.curve_bpm_at(6, 1.0).unwrap(), None);
}

#[test]
fn equivalence_keeps_the_beat_length() {
    let i = mixed();
    assert_approx_eq!(i.beat_duration(2, 4.0).unwrap(), 1.0);
    // dotted quarter = quarter: 6/8 beats on the eighth, three per second
    assert_approx_eq!(i.beat_duration(3, 1.0).unwrap(), 1.0 / 3.0);
    assert_approx_eq!(
        i.position_at_location(5, 1.0).unwrap() - i.position_at_location(3, 1.0).unwrap(),
        4.0
    );
}

#[test]
fn curve_accelerates_towards_its_end() {
    let i = mixed();
    let first = i.curve_bpm_at(5, 1.0).unwrap().unwrap();
    let last = i.curve_bpm_at(7, 3.0).unwrap().unwrap();
    assert!(first > 160.0 && first < last && last < 220.0);
    assert!(i.beat_duration(7, 3.0).unwrap() < i.beat_duration(5, 1.0).unwrap());
    assert_eq!(i.curve_bpm_at(8, 1.0).unwrap(), None);
}

#[test]
fn fermata_durations() {
    let i = mixed();

    let relative = i.location_infos(8, 3.0).unwrap();
    assert!(relative.event.is_some());
    // an eighth held twice as long, inside a two-eighth beat at 220
    assert_approx_eq!(relative.duration, 2.0 * 60.0 / 220.0);
    assert_approx_eq!(relative.dt, 2.0 * 60.0 / 220.0);
    let released = i.location_infos(8, 3.5).unwrap();
    assert_approx_eq!(released.position - relative.position, relative.dt);

    let absolute = i.location_infos(10, 2.0).unwrap();
    assert_approx_eq!(absolute.dt, 1.5);
    let resumed = i.position_at_location(10, 3.0).unwrap();
    assert_approx_eq!(resumed - absolute.position, 1.5);
}

#[test]
fn duration_bar_is_one_beat() {
    let i = mixed();
    let infos = i.location_infos(9, 1.0).unwrap();
    assert_eq!((infos.unit.upper, infos.unit.lower), (1, 1));
    assert_approx_eq!(infos.duration, 3.0);
    assert_approx_eq!(
        i.position_at_location(10, 1.0).unwrap() - infos.position,
        3.0
    );
}

#[test]
fn labels_in_order() {
    let i = mixed();
    assert_eq!(i.labels(), vec!["start", "drone", "late"]);
    assert_eq!(i.label_location("late"), Some(Location::new(12, 2.5)));
    assert_approx_eq!(
        i.label_position("late").unwrap(),
        i.position_at_location(12, 2.5).unwrap()
    );
}

#[test]
fn timeline_ends_at_end_marker() {
    let i = mixed();
    let last = Timeline::new(&i).last().unwrap();
    assert_eq!(last.location, Location::new(14, 1.0));
    assert!(last.event.unwrap().end);
    assert_eq!(i.end_location(), Some(Location::new(14, 1.0)));
}

#[test]
fn queries_do_not_disturb_each_other() {
    let i = mixed();
    let before = i.position_at_location(11, 2.0).unwrap();
    let _ = i.location_at_position(-3.0);
    let _ = i.location_infos(0, 1.0);
    let _ = i.next_location_infos(13, 2.0);
    assert_approx_eq!(i.position_at_location(11, 2.0).unwrap(), before);
}

#[test]
fn interpreter_is_shared_across_threads() {
    let i = std::sync::Arc::new(mixed());
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let i = i.clone();
            std::thread::spawn(move || i.position_at_location(n + 1, 1.0).unwrap())
        })
        .collect();
    let positions: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(positions.windows(2).all(|w| w[1] > w[0]));
}
