use std::collections::VecDeque;

use crate::models::ChatTurn;

/// Append-only turn log for one session. Once `max_turns` is reached the
/// oldest turn is dropped to make room.
#[derive(Debug)]
pub struct Transcript {
    turns: VecDeque<ChatTurn>,
    max_turns: usize,
}

impl Transcript {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_turns: max_turns.max(1),
        }
    }

    pub fn append(&mut self, turn: ChatTurn) {
        if self.turns.len() == self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    pub fn all(&self) -> Vec<ChatTurn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn starts_empty_and_keeps_order() {
        let mut transcript = Transcript::new(10);
        assert_eq!(transcript.len(), 0);

        transcript.append(ChatTurn::user("one"));
        transcript.append(ChatTurn::assistant("two"));
        transcript.append(ChatTurn::user("three"));

        let turns = transcript.all();
        let contents: Vec<_> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, ["one", "two", "three"]);
        assert_eq!(turns[1].role, Role::Assistant);
    }

    #[test]
    fn drops_oldest_beyond_cap() {
        let mut transcript = Transcript::new(2);
        for content in ["a", "b", "c"] {
            transcript.append(ChatTurn::user(content));
        }
        let contents: Vec<_> = transcript.all().into_iter().map(|t| t.content).collect();
        assert_eq!(contents, ["b", "c"]);
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn earlier_snapshots_are_unchanged_by_later_appends() {
        let mut transcript = Transcript::new(10);
        transcript.append(ChatTurn::user("first"));
        let before = transcript.all();
        transcript.append(ChatTurn::assistant("second"));
        assert_eq!(transcript.all()[0], before[0]);
    }
}
