use crate::session::Feedback;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use std::sync::Arc;

/// A score/feedback pair as returned by the remote scorer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Evaluation {
    pub score: f64,
    pub feedback: String,
}

impl From<Evaluation> for Feedback {
    fn from(evaluation: Evaluation) -> Self {
        Feedback::new(evaluation.score, evaluation.feedback)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    /// The scorer answered with a non-success status.
    #[error("Failed to get feedback from AI.")]
    Rejected { status: u16, message: String },
    #[error("Network error during evaluation.")]
    Network(String),
    #[error("Failed to read feedback from AI.")]
    Malformed(String),
}

pub type SharedEvaluator = Arc<dyn Evaluator + Send + Sync>;

// Scores a spoken answer. The HTTP client in `interview_api` is the production
// implementation; `OfflineEvaluator` below lets a rehearsal run without a
// backend, and tests use the generated `MockEvaluator`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Evaluator {
    async fn evaluate(
        &self,
        application_id: &str,
        question: &str,
        transcript: &str,
    ) -> Result<Evaluation, EvaluationError>;
}

/// A network-free `Evaluator`.
///
/// Scores answers with a length and structure heuristic so the whole flow can
/// be rehearsed offline. It never fails.
#[derive(Debug, Default, Clone)]
pub struct OfflineEvaluator;

const EXAMPLE_MARKERS: &[&str] = &["for example", "for instance", "such as", "e.g."];
const STRUCTURE_MARKERS: &[&str] = &["because", "first", "then", "finally", "which means"];

impl OfflineEvaluator {
    fn score(transcript: &str) -> (f64, String) {
        let lower = transcript.to_lowercase();
        let words = lower.split_whitespace().count();
        let has_example = EXAMPLE_MARKERS.iter().any(|m| lower.contains(m));
        let has_structure = STRUCTURE_MARKERS.iter().any(|m| lower.contains(m));

        let mut score: f64 = match words {
            0 => 0.0,
            1..=9 => 3.0,
            10..=29 => 5.0,
            30..=79 => 6.0,
            _ => 7.0,
        };
        if has_example {
            score += 2.0;
        }
        if has_structure {
            score += 1.0;
        }

        let feedback = if words == 0 {
            "No answer was given.".to_string()
        } else if words < 10 {
            "Your answer is quite short. Expand on it with more detail.".to_string()
        } else if !has_example {
            "Good, but add an example.".to_string()
        } else if !has_structure {
            "Nice example. Try to walk through your reasoning step by step.".to_string()
        } else {
            "Well structured answer with a concrete example.".to_string()
        };
        (score.min(10.0), feedback)
    }
}

#[async_trait]
impl Evaluator for OfflineEvaluator {
    async fn evaluate(
        &self,
        _application_id: &str,
        _question: &str,
        transcript: &str,
    ) -> Result<Evaluation, EvaluationError> {
        let (score, feedback) = Self::score(transcript);
        Ok(Evaluation { score, feedback })
    }
}
