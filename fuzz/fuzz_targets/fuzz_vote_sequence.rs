#![no_main]

use libfuzzer_sys::fuzz_target;
use tally::polls::{apply_vote, Poll, PollKind, UserId};

/// Replays bytes as a sequence of votes and checks the tally after each one.
///
/// Byte 0 picks the mode (bit 0: multi-choice, bit 1: quiz); every following
/// byte encodes a voter (high nibble) and an option (low nibble, which may be
/// out of range on purpose).
fn replay_votes(data: &[u8]) {
    let Some((&mode, clicks)) = data.split_first() else {
        return;
    };

    let kind = if mode & 2 != 0 {
        PollKind::Quiz { correct_option: 0 }
    } else {
        PollKind::Poll
    };
    let options = (0..5).map(|i| format!("option {}", i)).collect();
    let Ok(mut poll) = Poll::new("creator", "chat", "fuzz?", options, kind) else {
        return;
    };
    poll.set_multi_choice(mode & 1 != 0);

    for &click in clicks {
        let voter = UserId::from(i64::from(click >> 4));
        let option = usize::from(click & 0x0f);
        let before = poll.selections_of(&voter).to_vec();

        match apply_vote(&mut poll, &voter, option) {
            Ok(_) => {}
            Err(_) => assert_eq!(poll.selections_of(&voter), before.as_slice()),
        }
        assert!(poll.tally_is_consistent());
        if !poll.is_multi_choice() {
            assert!(poll.selections_of(&voter).len() <= 1);
        }
    }
}

fuzz_target!(|data: &[u8]| {
    replay_votes(data);
});
