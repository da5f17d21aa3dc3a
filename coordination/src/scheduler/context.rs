//! Bounded trailing context window for reasoning requests.

use crate::transcript::TranscriptLog;

/// Limits on the history handed to the reasoning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextWindow {
    pub max_turns: usize,
    pub max_chars: usize,
}

impl ContextWindow {
    pub fn new(max_turns: usize, max_chars: usize) -> Self {
        Self {
            max_turns: max_turns.max(1),
            max_chars: max_chars.max(1),
        }
    }

    /// Half-size window used for the retry after a bad generation.
    pub fn reduced(&self) -> Self {
        Self::new(self.max_turns / 2, self.max_chars / 2)
    }

    /// Trailing "Name: text" lines, oldest first.
    ///
    /// Lines are taken newest-first until either bound is hit, so the
    /// oldest history is the first to go. A newest line that alone exceeds
    /// the character bound is cut to fit.
    pub fn collect(&self, transcript: &TranscriptLog) -> Vec<String> {
        self.collect_before(transcript, None)
    }

    /// Like [`collect`](Self::collect), restricted to turns before `before`.
    pub fn collect_before(&self, transcript: &TranscriptLog, before: Option<u64>) -> Vec<String> {
        let mut lines: Vec<String> = Vec::new();
        let mut used = 0usize;
        let earlier = transcript
            .turns()
            .iter()
            .rev()
            .filter(|t| before.map_or(true, |seq| t.sequence < seq));
        for turn in earlier {
            if lines.len() >= self.max_turns {
                break;
            }
            let line = turn.history_line();
            let len = line.chars().count();
            if used + len > self.max_chars {
                if lines.is_empty() {
                    lines.push(line.chars().take(self.max_chars).collect());
                }
                break;
            }
            used += len;
            lines.push(line);
        }
        lines.reverse();
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::CourtRole;
    use crate::session::TrialPhase;
    use crate::transcript::Turn;

    fn log(contents: &[&str]) -> TranscriptLog {
        let mut log = TranscriptLog::new();
        for (i, c) in contents.iter().enumerate() {
            log.append(Turn::new(
                i as u64 + 1,
                TrialPhase::Opening,
                CourtRole::Prosecutor,
                "p",
                "P",
                *c,
            ))
            .unwrap();
        }
        log
    }

    #[test]
    fn test_turn_bound_drops_oldest() {
        let window = ContextWindow::new(2, 1_000);
        let lines = window.collect(&log(&["one", "two", "three"]));
        assert_eq!(lines, vec!["P: two", "P: three"]);
    }

    #[test]
    fn test_char_bound_drops_oldest() {
        // Each line is "P: xxxx" = 7 chars
        let window = ContextWindow::new(10, 15);
        let lines = window.collect(&log(&["aaaa", "bbbb", "cccc"]));
        assert_eq!(lines, vec!["P: bbbb", "P: cccc"]);
    }

    #[test]
    fn test_oversized_newest_line_is_cut() {
        let window = ContextWindow::new(10, 5);
        let lines = window.collect(&log(&["a very long line"]));
        assert_eq!(lines, vec!["P: a "]);
    }

    #[test]
    fn test_collect_before_excludes_later_turns() {
        let window = ContextWindow::new(10, 1_000);
        let lines = window.collect_before(&log(&["one", "two", "three"]), Some(3));
        assert_eq!(lines, vec!["P: one", "P: two"]);
    }

    #[test]
    fn test_reduced_halves_bounds() {
        let window = ContextWindow::new(12, 4_000).reduced();
        assert_eq!(window, ContextWindow::new(6, 2_000));
        assert_eq!(ContextWindow::new(1, 1).reduced(), ContextWindow::new(1, 1));
    }
}
