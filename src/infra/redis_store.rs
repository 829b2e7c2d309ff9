//! Store backed by Redis JSON documents
//!
//! Every record is one JSON string under a prefixed key. Judgement commits
//! and task completions write the document and publish it to the result
//! channel in a single `MULTI/EXEC`.
//!
//! A submission's PDG lives under its own `<submission key>:pdg` key and is
//! never part of the submission document. Saving a PDG therefore cannot
//! clobber a judgement committed in the meantime, and the other way round.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use super::redis_manager::keys;
use super::store::{apply_outcome, complete, reset, Store};
use crate::core::{
    JudgeOutcome, Language, PlagiarismOutcome, PlagiarismTask, Problem, Submission,
    SubmissionStatus,
};
use crate::plagiarism::Pdg;

fn submission_key(id: i64) -> String {
    format!("{}{}", keys::SUBMISSION_PREFIX, id)
}

fn pdg_key(id: i64) -> String {
    format!("{}:pdg", submission_key(id))
}

fn index_key(problem_id: i64, language_id: i64) -> String {
    format!("{}{}:{}", keys::SUBMISSION_INDEX_PREFIX, problem_id, language_id)
}

fn task_key(id: i64) -> String {
    format!("{}{}", keys::PLAGIARISM_PREFIX, id)
}

fn resolved_key(user_id: i64) -> String {
    format!("{}{}", keys::RESOLVED_PREFIX, user_id)
}

/// Submission JSON as stored, without its PDG
fn submission_document(submission: &Submission) -> Result<String> {
    let document = Submission {
        pdg: None,
        ..submission.clone()
    };
    Ok(serde_json::to_string(&document)?)
}

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn with_url(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;
        info!("Store connected to Redis at {}", redis_url);
        Ok(Self { conn })
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        raw.map(|json| {
            serde_json::from_str(&json).with_context(|| format!("Corrupt document at {}", key))
        })
        .transpose()
    }

    async fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, json).await?;
        Ok(())
    }

    /// The submission document alone, for status and judgement updates
    async fn load_submission(&self, id: i64) -> Result<Submission> {
        self.load(&submission_key(id))
            .await?
            .with_context(|| format!("Submission {} not found", id))
    }

    async fn save_submission(&self, submission: &Submission) -> Result<()> {
        let json = submission_document(submission)?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(submission_key(submission.id), json)
            .await?;
        Ok(())
    }

    /// Write a document and publish it in one transaction
    async fn save_and_publish(&self, key: &str, channel: &str, json: String) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .set(key, &json)
            .ignore()
            .publish(channel, &json)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get_submission(&self, id: i64) -> Result<Option<Submission>> {
        let key = submission_key(id);
        let mut conn = self.conn.clone();
        let (document, pdg): (Option<String>, Option<String>) = redis::pipe()
            .atomic()
            .get(&key)
            .get(pdg_key(id))
            .query_async(&mut conn)
            .await?;

        let Some(document) = document else {
            return Ok(None);
        };
        let mut submission: Submission = serde_json::from_str(&document)
            .with_context(|| format!("Corrupt document at {}", key))?;
        submission.pdg = pdg
            .map(|json| {
                serde_json::from_str(&json).with_context(|| format!("Corrupt PDG of submission {}", id))
            })
            .transpose()?;
        Ok(Some(submission))
    }

    async fn get_problem(&self, id: i64) -> Result<Option<Problem>> {
        self.load(&format!("{}{}", keys::PROBLEM_PREFIX, id)).await
    }

    async fn get_language(&self, id: i64) -> Result<Option<Language>> {
        self.load(&format!("{}{}", keys::LANGUAGE_PREFIX, id)).await
    }

    async fn insert_submission(&self, submission: Submission) -> Result<()> {
        let json = submission_document(&submission)?;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .set(submission_key(submission.id), json)
            .ignore()
            .sadd(
                index_key(submission.problem_id, submission.language_id),
                submission.id,
            )
            .ignore();
        if let Some(pdg) = &submission.pdg {
            pipe.set(pdg_key(submission.id), serde_json::to_string(pdg)?)
                .ignore();
        } else {
            pipe.del(pdg_key(submission.id)).ignore();
        }

        let mut conn = self.conn.clone();
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn insert_problem(&self, problem: Problem) -> Result<()> {
        self.save(&format!("{}{}", keys::PROBLEM_PREFIX, problem.id), &problem)
            .await
    }

    async fn insert_language(&self, language: Language) -> Result<()> {
        self.save(&format!("{}{}", keys::LANGUAGE_PREFIX, language.id), &language)
            .await
    }

    async fn set_status(&self, id: i64, status: SubmissionStatus) -> Result<()> {
        let mut submission = self.load_submission(id).await?;
        submission.status = status;
        self.save_submission(&submission).await
    }

    async fn commit_judgement(&self, id: i64, outcome: &JudgeOutcome) -> Result<()> {
        let mut submission = self.load_submission(id).await?;
        apply_outcome(&mut submission, outcome);
        let json = submission_document(&submission)?;
        self.save_and_publish(&submission_key(id), keys::JUDGE_RESULT_CHANNEL, json)
            .await
    }

    async fn reset_submission(&self, id: i64) -> Result<()> {
        let mut submission = self.load_submission(id).await?;
        reset(&mut submission);
        let json = submission_document(&submission)?;
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .set(submission_key(id), json)
            .ignore()
            .del(pdg_key(id))
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn save_pdg(&self, id: i64, pdg: &Pdg) -> Result<()> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(submission_key(id)).await?;
        if !exists {
            bail!("Submission {} not found", id);
        }
        self.save(&pdg_key(id), pdg).await
    }

    async fn list_submissions(&self, problem_id: i64, language_id: i64) -> Result<Vec<Submission>> {
        let mut conn = self.conn.clone();
        let mut ids: Vec<i64> = conn.smembers(index_key(problem_id, language_id)).await?;
        ids.sort_unstable();

        let mut submissions = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(submission) = self.get_submission(id).await? {
                submissions.push(submission);
            }
        }
        Ok(submissions)
    }

    async fn increment_resolved(&self, user_id: i64) -> Result<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.incr(resolved_key(user_id), 1u64).await?)
    }

    async fn resolved_count(&self, user_id: i64) -> Result<u64> {
        let mut conn = self.conn.clone();
        let count: Option<u64> = conn.get(resolved_key(user_id)).await?;
        Ok(count.unwrap_or(0))
    }

    async fn create_plagiarism_task(
        &self,
        submission_id: i64,
        problem_id: i64,
        threshold: f64,
    ) -> Result<PlagiarismTask> {
        let mut conn = self.conn.clone();
        let id: i64 = conn.incr(keys::PLAGIARISM_NEXT_ID, 1i64).await?;
        let task = PlagiarismTask::new(id, submission_id, problem_id, threshold);
        self.save(&task_key(id), &task).await?;
        Ok(task)
    }

    async fn get_plagiarism_task(&self, id: i64) -> Result<Option<PlagiarismTask>> {
        self.load(&task_key(id)).await
    }

    async fn complete_plagiarism_task(&self, id: i64, outcome: PlagiarismOutcome) -> Result<()> {
        let mut task: PlagiarismTask = self
            .load(&task_key(id))
            .await?
            .with_context(|| format!("Plagiarism task {} not found", id))?;
        complete(&mut task, outcome);
        let json = serde_json::to_string(&task)?;
        self.save_and_publish(&task_key(id), keys::PLAGIARISM_RESULT_CHANNEL, json)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TestCaseResult, Verdict};
    use crate::plagiarism::build_pdg;

    #[test]
    fn test_key_layout() {
        assert_eq!(submission_key(12), "oj:submission:12");
        assert_eq!(pdg_key(12), "oj:submission:12:pdg");
        assert_eq!(index_key(3, 1), "oj:submissions:3:1");
        assert_eq!(task_key(5), "oj:plagiarism:5");
        assert_eq!(resolved_key(9), "oj:user:resolved:9");
    }

    #[test]
    fn test_submission_document_leaves_pdg_out() {
        let mut submission = Submission::new(3, "x = 1\n", 2, 1, 7);
        submission.score = 10;
        submission.test_case_results = vec![TestCaseResult::stamped(1, Verdict::Accepted, "")];
        submission.pdg = Some(build_pdg("x = 1\n").unwrap());

        let json = submission_document(&submission).unwrap();
        let stored: Submission = serde_json::from_str(&json).unwrap();
        assert!(stored.pdg.is_none());
        assert_eq!(stored.score, 10);
        assert_eq!(stored.test_case_results.len(), 1);
        // the caller's copy keeps its PDG
        assert!(submission.pdg.is_some());
    }
}
