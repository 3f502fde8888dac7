//! Terminal interviewer
//!
//! Puts the questions of one batch to the human, one evidence at a time,
//! and hands every answer back to the caller.

use std::io::{BufRead, Write};

use anyhow::Result;
use tracing::debug;

use rex_core::Evidence;

/// What the human typed for one question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Yes,
    No,
    Skip,
    Stop,
}

impl Response {
    /// Parse one line of input, ignoring case and surrounding whitespace
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "y" | "yes" => Some(Self::Yes),
            "n" | "no" => Some(Self::No),
            "s" | "skip" => Some(Self::Skip),
            "stop" | "q" | "quit" => Some(Self::Stop),
            _ => None,
        }
    }
}

/// Counters of one interview
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterviewOutcome {
    pub answered: usize,
    pub skipped: usize,
    /// The human asked to end the session
    pub stopped: bool,
}

/// Line-oriented interviewer over any reader/writer pair
pub struct Interviewer<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Interviewer<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Ask every question in order, calling `on_answer` for each yes/no.
    ///
    /// End of input counts as "stop".
    pub fn interview<F>(
        &mut self,
        questions: &[Evidence],
        mut on_answer: F,
    ) -> Result<InterviewOutcome>
    where
        F: FnMut(Evidence, bool) -> Result<()>,
    {
        let mut outcome = InterviewOutcome::default();

        for (index, evidence) in questions.iter().enumerate() {
            writeln!(self.output)?;
            writeln!(
                self.output,
                "[{}/{}] {}",
                index + 1,
                questions.len(),
                evidence.segment().key()
            )?;
            writeln!(self.output, "  {}", evidence.highlighted())?;

            match self.ask(evidence)? {
                Response::Yes => {
                    on_answer(evidence.clone(), true)?;
                    outcome.answered += 1;
                }
                Response::No => {
                    on_answer(evidence.clone(), false)?;
                    outcome.answered += 1;
                }
                Response::Skip => outcome.skipped += 1,
                Response::Stop => {
                    outcome.stopped = true;
                    break;
                }
            }
        }

        debug!(
            answered = outcome.answered,
            skipped = outcome.skipped,
            stopped = outcome.stopped,
            "Interview finished"
        );
        Ok(outcome)
    }

    fn ask(&mut self, evidence: &Evidence) -> Result<Response> {
        let fact = evidence.fact();
        loop {
            write!(
                self.output,
                "{} {} {}? [y/n/s/stop] ",
                evidence.first().canonical_form(),
                fact.relation,
                evidence.second().canonical_form()
            )?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(Response::Stop);
            }
            match Response::parse(&line) {
                Some(response) => return Ok(response),
                None => writeln!(self.output, "Please answer y, n, s or stop.")?,
            }
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rex_core::{Entity, EntityInSegment, Fact, TextSegment};

    fn create_questions() -> Vec<Evidence> {
        let person = Arc::new(Entity::new("ada", "Ada", "person"));
        let london = Arc::new(Entity::new("london", "London", "location"));
        let paris = Arc::new(Entity::new("paris", "Paris", "location"));
        let tokens: Vec<String> = "Ada lived in London and Paris"
            .split(' ')
            .map(String::from)
            .collect();
        let segment = Arc::new(
            TextSegment::new(
                "doc",
                0,
                29,
                tokens,
                vec!["X".to_string(); 6],
                vec![
                    EntityInSegment::new(person.clone(), 0, 1).unwrap(),
                    EntityInSegment::new(london.clone(), 3, 4).unwrap(),
                    EntityInSegment::new(paris.clone(), 5, 6).unwrap(),
                ],
            )
            .unwrap(),
        );

        vec![
            Evidence::new(Fact::new(person.clone(), london, "lived_in"), segment.clone(), 0, 1)
                .unwrap(),
            Evidence::new(Fact::new(person, paris, "lived_in"), segment, 0, 2).unwrap(),
        ]
    }

    fn run(input: &str) -> (InterviewOutcome, Vec<(Evidence, bool)>, String) {
        let questions = create_questions();
        let mut interviewer = Interviewer::new(input.as_bytes(), Vec::new());
        let mut answers = Vec::new();
        let outcome = interviewer
            .interview(&questions, |evidence, label| {
                answers.push((evidence, label));
                Ok(())
            })
            .unwrap();
        let output = String::from_utf8(interviewer.into_output()).unwrap();
        (outcome, answers, output)
    }

    #[test]
    fn test_parse_responses() {
        assert_eq!(Response::parse("y\n"), Some(Response::Yes));
        assert_eq!(Response::parse("  NO "), Some(Response::No));
        assert_eq!(Response::parse("s"), Some(Response::Skip));
        assert_eq!(Response::parse("stop"), Some(Response::Stop));
        assert_eq!(Response::parse("maybe"), None);
    }

    #[test]
    fn test_answers_reach_callback() {
        let questions = create_questions();
        let (outcome, answers, output) = run("y\nn\n");

        assert_eq!(outcome.answered, 2);
        assert!(!outcome.stopped);
        assert_eq!(answers, vec![(questions[0].clone(), true), (questions[1].clone(), false)]);
        assert!(output.contains("{Ada} lived in [London] and Paris"));
        assert!(output.contains("Ada lived_in Paris?"));
    }

    #[test]
    fn test_skip_and_retry() {
        let (outcome, answers, output) = run("s\nwhat\ny\n");

        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.answered, 1);
        assert_eq!(answers.len(), 1);
        assert!(output.contains("Please answer"));
    }

    #[test]
    fn test_stop_ends_interview() {
        let (outcome, answers, _) = run("stop\n");
        assert!(outcome.stopped);
        assert!(answers.is_empty());
    }

    #[test]
    fn test_end_of_input_stops() {
        let (outcome, answers, _) = run("y\n");
        assert!(outcome.stopped);
        assert_eq!(answers.len(), 1);
    }
}
