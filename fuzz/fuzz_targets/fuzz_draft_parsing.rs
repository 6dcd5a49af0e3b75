#![no_main]

use libfuzzer_sys::fuzz_target;
use tally::polls::{parse_draft_text, DraftSession, DraftToggle, MAX_OPTIONS};

/// Feeds arbitrary text through draft parsing and, when it parses, through a
/// draft session and its toggles.
///
/// This catches:
/// - Panics on odd line endings or multi-byte characters
/// - Drafts that parse but fail to build, or the reverse
/// - Quizzes that end up multi-choice
fn exercise_draft(data: &[u8]) {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    let parsed = parse_draft_text(raw, MAX_OPTIONS);
    for is_quiz in [false, true] {
        let mut session = DraftSession::new("fuzzer".into(), "chat".into(), is_quiz);
        let built = session.submit_text(raw, MAX_OPTIONS);
        assert_eq!(parsed.is_ok(), built.is_ok());

        let Ok(summary) = built else {
            continue;
        };
        assert!(summary.options.len() >= 2);
        assert!(summary.options.iter().all(|o| !o.trim().is_empty()));

        let _ = session.toggle(DraftToggle::MultiChoice);
        let _ = session.toggle(DraftToggle::Anonymous);
        if is_quiz {
            assert!(!session.summary().map(|s| s.is_multi_choice).unwrap_or(false));
        }
        assert!(session.publish().is_ok());
    }
}

fuzz_target!(|data: &[u8]| {
    exercise_draft(data);
});
