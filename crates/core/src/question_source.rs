use crate::error::SessionError;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;

/// Failures of the remote session starter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Failed to start interview session. {message}")]
    Status { status: u16, message: String },
    #[error("Network error. Failed to start session.")]
    Network(String),
    #[error("Failed to start interview session. Unexpected response: {0}")]
    Malformed(String),
}

pub type SharedSessionStarter = Arc<dyn SessionStarter + Send + Sync>;

/// Asks the backend to open a rehearsal session and hand back its questions.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionStarter {
    async fn start_session(&self, application_id: &str) -> Result<Vec<String>, ApiError>;
}

/// Splits a pre-generated question blob into questions.
///
/// One question per line; surrounding whitespace is trimmed and blank lines
/// are dropped. Order is preserved.
pub fn parse_question_blob(blob: &str) -> Vec<String> {
    blob.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Produces the ordered question list for a session, either from a blob the
/// caller already has or from the remote starter endpoint.
pub struct QuestionSource {
    starter: SharedSessionStarter,
}

impl QuestionSource {
    pub fn new(starter: SharedSessionStarter) -> Self {
        Self { starter }
    }

    pub async fn resolve(
        &self,
        blob: Option<&str>,
        application_id: &str,
    ) -> Result<Vec<String>, SessionError> {
        let questions = match blob {
            Some(blob) => {
                tracing::debug!("Resolving questions from a supplied blob");
                parse_question_blob(blob)
            }
            None => {
                tracing::info!("Requesting a new session for application {}", application_id);
                let questions = self
                    .starter
                    .start_session(application_id)
                    .await
                    .map_err(|e| {
                        tracing::error!("Session start failed: {:?}", e);
                        SessionError::SessionStartFailed(e.to_string())
                    })?;
                // Used verbatim; only entries with nothing to say are dropped.
                questions
                    .into_iter()
                    .filter(|q| !q.trim().is_empty())
                    .collect()
            }
        };

        if questions.is_empty() {
            return Err(SessionError::NoQuestionsAvailable);
        }
        tracing::info!("Resolved {} questions", questions.len());
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_with(starter: MockSessionStarter) -> QuestionSource {
        QuestionSource::new(Arc::new(starter))
    }

    #[test]
    fn blob_is_split_trimmed_and_filtered() {
        let blob = "What is closure?\n\n   \r\n  Describe a recursive algorithm.  \r\n";
        assert_eq!(
            parse_question_blob(blob),
            vec!["What is closure?", "Describe a recursive algorithm."]
        );
    }

    #[tokio::test]
    async fn blob_takes_precedence_over_remote_start() {
        let mut starter = MockSessionStarter::new();
        starter.expect_start_session().never();

        let questions = source_with(starter)
            .resolve(Some("Q1\nQ2\n"), "app-1")
            .await
            .unwrap();
        assert_eq!(questions, vec!["Q1", "Q2"]);
    }

    #[tokio::test]
    async fn blank_blob_has_no_questions() {
        let mut starter = MockSessionStarter::new();
        starter.expect_start_session().never();

        let result = source_with(starter).resolve(Some("\n  \n\t\n"), "app-1").await;
        assert_eq!(result, Err(SessionError::NoQuestionsAvailable));
    }

    #[tokio::test]
    async fn remote_questions_are_used_in_order() {
        let mut starter = MockSessionStarter::new();
        starter
            .expect_start_session()
            .withf(|id| id == "app-9")
            .times(1)
            .returning(|_| Ok(vec!["Tell me about yourself.".into(), "Why us?".into()]));

        let questions = source_with(starter).resolve(None, "app-9").await.unwrap();
        assert_eq!(questions, vec!["Tell me about yourself.", "Why us?"]);
    }

    #[tokio::test]
    async fn remote_questions_are_kept_verbatim_without_blanks() {
        let mut starter = MockSessionStarter::new();
        starter
            .expect_start_session()
            .returning(|_| Ok(vec!["  Q1  ".into(), "".into(), " \t ".into(), "Q2".into()]));

        let questions = source_with(starter).resolve(None, "app-1").await.unwrap();
        assert_eq!(questions, vec!["  Q1  ", "Q2"]);
    }

    #[tokio::test]
    async fn blank_remote_list_has_no_questions() {
        let mut starter = MockSessionStarter::new();
        starter
            .expect_start_session()
            .returning(|_| Ok(vec!["".into(), "   ".into()]));

        let result = source_with(starter).resolve(None, "app-1").await;
        assert_eq!(result, Err(SessionError::NoQuestionsAvailable));
    }

    #[tokio::test]
    async fn empty_remote_list_has_no_questions() {
        let mut starter = MockSessionStarter::new();
        starter.expect_start_session().returning(|_| Ok(vec![]));

        let result = source_with(starter).resolve(None, "app-1").await;
        assert_eq!(result, Err(SessionError::NoQuestionsAvailable));
    }

    #[tokio::test]
    async fn remote_failure_carries_message() {
        let mut starter = MockSessionStarter::new();
        starter.expect_start_session().returning(|_| {
            Err(ApiError::Status {
                status: 404,
                message: "Application not found.".into(),
            })
        });

        let result = source_with(starter).resolve(None, "missing").await;
        let err = result.unwrap_err();
        assert_eq!(
            err,
            SessionError::SessionStartFailed(
                "Failed to start interview session. Application not found.".into()
            )
        );
        assert_eq!(
            err.to_string(),
            "Failed to start interview session. Application not found."
        );
    }
}
