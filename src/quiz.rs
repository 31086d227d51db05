//! Quiz repository interface consumed by the room core.
//!
//! The core never writes quizzes. Production deployments can substitute a
//! persistent backend behind [`QuizRepository`]; the in-memory implementation
//! covers single-process deployments and tests.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::protocol::GameError;

/// Allowed option count per question.
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 4;
/// Allowed answering window, in seconds.
pub const MIN_TIME_LIMIT_SECONDS: u32 = 5;
pub const MAX_TIME_LIMIT_SECONDS: u32 = 120;
/// Allowed base points per question.
pub const MIN_POINTS: u32 = 100;
pub const MAX_POINTS: u32 = 10_000;

/// A single question as supplied by the repository. The correct index stays
/// server-side until the round ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
    pub time_limit_seconds: u32,
    pub points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Question {
    /// Check the repository contract bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("question text cannot be empty".to_string());
        }
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&self.options.len()) {
            return Err(format!(
                "question must have {MIN_OPTIONS}-{MAX_OPTIONS} options, got {}",
                self.options.len()
            ));
        }
        if self.correct_answer_index >= self.options.len() {
            return Err(format!(
                "correct answer index {} out of range for {} options",
                self.correct_answer_index,
                self.options.len()
            ));
        }
        if !(MIN_TIME_LIMIT_SECONDS..=MAX_TIME_LIMIT_SECONDS).contains(&self.time_limit_seconds) {
            return Err(format!(
                "time limit must be {MIN_TIME_LIMIT_SECONDS}-{MAX_TIME_LIMIT_SECONDS} seconds"
            ));
        }
        if !(MIN_POINTS..=MAX_POINTS).contains(&self.points) {
            return Err(format!("points must be {MIN_POINTS}-{MAX_POINTS}"));
        }
        Ok(())
    }

    pub fn time_limit_ms(&self) -> i64 {
        i64::from(self.time_limit_seconds) * 1000
    }
}

/// A quiz with its full question list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Validate every question plus the quiz-level requirements.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("quiz title cannot be empty".to_string());
        }
        if self.questions.is_empty() {
            return Err("quiz must contain at least one question".to_string());
        }
        for (index, question) in self.questions.iter().enumerate() {
            question
                .validate()
                .map_err(|reason| format!("question {index}: {reason}"))?;
        }
        Ok(())
    }
}

/// Read-only quiz lookup consumed by room creation.
#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn find_by_id(&self, quiz_id: &Uuid) -> Result<Arc<Quiz>, GameError>;
}

/// In-memory quiz store for single-process deployments and tests.
pub struct InMemoryQuizRepository {
    quizzes: DashMap<Uuid, Arc<Quiz>>,
}

impl InMemoryQuizRepository {
    pub fn new() -> Self {
        Self {
            quizzes: DashMap::new(),
        }
    }

    /// Insert a quiz after validating it.
    pub fn insert(&self, quiz: Quiz) -> Result<Uuid, String> {
        quiz.validate()?;
        let id = quiz.id;
        self.quizzes.insert(id, Arc::new(quiz));
        Ok(id)
    }

    /// Load quizzes from a JSON file containing an array of quizzes.
    /// Invalid entries are skipped with a warning.
    pub fn load_from_file(&self, path: &Path) -> anyhow::Result<usize> {
        let raw = std::fs::read_to_string(path)?;
        let quizzes: Vec<Quiz> = serde_json::from_str(&raw)?;
        let mut loaded = 0;
        for quiz in quizzes {
            let title = quiz.title.clone();
            match self.insert(quiz) {
                Ok(id) => {
                    tracing::info!(quiz_id = %id, title = %title, "Loaded quiz");
                    loaded += 1;
                }
                Err(reason) => {
                    tracing::warn!(title = %title, %reason, "Skipping invalid quiz");
                }
            }
        }
        Ok(loaded)
    }

    pub fn len(&self) -> usize {
        self.quizzes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quizzes.is_empty()
    }
}

impl Default for InMemoryQuizRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuizRepository for InMemoryQuizRepository {
    async fn find_by_id(&self, quiz_id: &Uuid) -> Result<Arc<Quiz>, GameError> {
        self.quizzes
            .get(quiz_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(GameError::QuizNotFound)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn valid_question() -> Question {
        Question {
            text: "What is 2 + 2?".to_string(),
            options: vec!["3".to_string(), "4".to_string()],
            correct_answer_index: 1,
            time_limit_seconds: 10,
            points: 1000,
            image_url: None,
        }
    }

    #[test]
    fn question_bounds_are_enforced() {
        assert!(valid_question().validate().is_ok());

        let mut q = valid_question();
        q.options = vec!["only one".to_string()];
        assert!(q.validate().is_err());

        let mut q = valid_question();
        q.options = vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()];
        assert!(q.validate().is_err());

        let mut q = valid_question();
        q.correct_answer_index = 2;
        assert!(q.validate().is_err());

        let mut q = valid_question();
        q.time_limit_seconds = 4;
        assert!(q.validate().is_err());

        let mut q = valid_question();
        q.time_limit_seconds = 121;
        assert!(q.validate().is_err());

        let mut q = valid_question();
        q.points = 99;
        assert!(q.validate().is_err());

        let mut q = valid_question();
        q.points = 10_001;
        assert!(q.validate().is_err());
    }

    #[test]
    fn quiz_requires_at_least_one_question() {
        let quiz = Quiz {
            id: Uuid::new_v4(),
            title: "Empty".to_string(),
            questions: vec![],
        };
        assert!(quiz.validate().is_err());
    }

    #[tokio::test]
    async fn repository_lookup() {
        let repo = InMemoryQuizRepository::new();
        let quiz = test_support::sample_quiz(3, 1000, 10);
        let id = repo.insert(quiz).unwrap();

        let found = repo.find_by_id(&id).await.unwrap();
        assert_eq!(found.total_questions(), 3);
        assert_eq!(found.question(2).unwrap().points, 1000);
        assert!(found.question(3).is_none());

        let missing = repo.find_by_id(&Uuid::new_v4()).await;
        assert!(matches!(missing, Err(GameError::QuizNotFound)));
    }
}
