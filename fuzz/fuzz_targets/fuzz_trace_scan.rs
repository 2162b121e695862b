#![no_main]
use filpal_core::{ParseError, TraceCfg, TraceParser};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let parser = TraceParser::new(["M104", "M140", "G1"], TraceCfg::default());
    let lines: Vec<&str> = data.lines().collect();
    match parser.scan(&lines[..]) {
        Ok(outcome) => {
            assert!(outcome.marker_line < lines.len());
            for cmd in &outcome.commands {
                for series in cmd.args.values() {
                    assert!(series.values().windows(2).all(|w| w[0] <= w[1]));
                }
            }
            // Annotation keeps every input line and adds exactly one.
            let annotated = parser.annotate(&lines[..], &outcome).unwrap();
            assert_eq!(annotated.lines().count(), lines.len() + 1);
            // Re-scanning the annotated text is always refused.
            let again: Vec<&str> = annotated.lines().collect();
            assert_eq!(parser.scan(&again[..]), Err(ParseError::AlreadyParsed));
        }
        Err(_) => {}
    }
});
