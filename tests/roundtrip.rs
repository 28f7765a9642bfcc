//! Writer/compiler round-trip over representative scores.

use soap_score::{Soap, SoapError};

const SCORES: &[&str] = &[
    "BAR 1 [4/4] TEMPO [1/4]=60",
    "BAR 1 [4/4] TEMPO [1/4]=60\nBAR 3 [3/4]\nBAR 5 [7/8] TEMPO [1/8]=140\nBAR 9 END",
    "BAR 1 [6/8] TEMPO [3/8]=60 curve 2\nBAR 3 TEMPO [3/8]=90\nBAR 4 [2+3/8] TEMPO [1/8]=[1/8]",
    "BAR 1 [4/4] TEMPO [1/4]=72 \"intro\" |2.5 LABEL \"pickup\"\nBAR 2 [1m] \"drone\"\nBAR 3 [5/8] TEMPO [3/8]=50",
    "BAR 1 [4/4] TEMPO [1/4]=60 |2 FERMATA [1/4]=2* |4 FERMATA [1/2]=?\nBAR 3 |1 FERMATA [1/4]=4s\nBAR 4 END",
    "BAR 2 [3/4] TEMPO [1/4]=100 |3 TEMPO [1/4]=100\nBAR 4 |2 TEMPO [1/2]=[1/4] |3 \"x\"",
    "BAR 1 [4/4] TEMPO [1/4]=60 |4 FERMATA [1/2]=?\nBAR 2\nBAR 3 END",
    "BAR 1 [3/4] TEMPO [1/4]=60 |3 FERMATA [1/2]=3s\nBAR 2 |3 \"after\"\nBAR 3 [2/4]",
    "BAR 1 [4/4] TEMPO [1/4]=60 curve\nBAR 2 [3s]\nBAR 3 [4/4] TEMPO [1/4]=120",
    "BAR 1 [4/4] TEMPO [1/4]=60 curve 2\nBAR 2 |3 TEMPO [1/8]=[1/4]\nBAR 3 TEMPO [1/8]=240",
];

#[test]
fn parse_write_parse_is_stable() {
    for src in SCORES {
        let states = Soap::parse(src).unwrap();
        let written = Soap::write(&states);
        let reparsed = Soap::parse(&written)
            .unwrap_or_else(|e| panic!("rewritten score failed to parse: {e}\n{written}"));
        assert_eq!(states, reparsed, "round trip changed\n{src}\n---\n{written}");
    }
}

#[test]
fn written_text_is_a_fixed_point() {
    for src in SCORES {
        let once = Soap::write(&Soap::parse(src).unwrap());
        let twice = Soap::write(&Soap::parse(&once).unwrap());
        assert_eq!(once, twice);
    }
}

#[test]
fn normalize_is_idempotent() {
    let raw = "BAR 1 [4/4]   TEMPO [1/4] = 60 // opening\n|3 \"a\"\n\nBAR 2 END";
    let once = Soap::normalize(raw).unwrap();
    assert_eq!(Soap::normalize(&once).unwrap(), once);
}

#[test]
fn validation_failures() {
    assert!(matches!(
        Soap::parse("BAR 1 TEMPO [1/4]=60"),
        Err(SoapError::Syntax { .. })
    ));
    assert!(matches!(
        Soap::parse("BAR 1 [4/4] TEMPO [1/4]=60\nBAR 2 END\nBAR 3 \"late\""),
        Err(SoapError::PostEndEvent { .. })
    ));
    assert!(matches!(
        Soap::parse("BAR 1 [4/4] TEMPO [1/4]=60 curve 1\nBAR 2 \"x\""),
        Err(SoapError::UnterminatedCurve { .. })
    ));
    assert!(matches!(
        Soap::parse("BAR 1 [4/4] TEMPO [1/4]=60 SWING 3"),
        Err(SoapError::UnknownCommand { .. })
    ));
}

#[test]
fn errors_carry_the_offending_line() {
    let err = Soap::parse("BAR 1 [4/4] TEMPO [1/4]=60\nBAR 2 SWING").unwrap_err();
    assert!(err.source_line().is_some_and(|line| line.contains("SWING")));
}

#[test]
fn compiled_states_serialize_to_json() {
    let states = Soap::parse(SCORES[2]).unwrap();
    let json = serde_json::to_string(&states).unwrap();
    let back: Vec<soap_score::CompiledState> = serde_json::from_str(&json).unwrap();
    assert_eq!(states, back);
}
