//! The blocking operator interaction surface. Exactly two questions are
//! ever asked per run: ranked-candidate selection during resolution and
//! the preview confirmation before commit. Modeled as a trait so a
//! terminal prompt, an HTTP callback, or a scripted test double can
//! stand in without changing pipeline logic.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::info;
use voyage_core::{ImportError, Result};

use crate::pipeline::resolve::{CandidateChoice, RankedCandidate};
use crate::preview::PreviewSummary;

#[async_trait]
pub trait OperatorChannel: Send + Sync {
    /// Present up to five ranked candidates plus an implicit create-new
    /// option for an ambiguous place name. The returned choice is final.
    async fn choose_candidate(
        &self,
        place_name: &str,
        candidates: &[RankedCandidate],
    ) -> Result<CandidateChoice>;

    /// Present the full batch preview. `false` cancels the run with zero
    /// side effects.
    async fn confirm(&self, preview: &PreviewSummary) -> Result<bool>;
}

/// Interactive terminal prompt for CLI runs.
pub struct TerminalOperator;

impl TerminalOperator {
    fn read_line() -> Result<String> {
        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .map_err(|e| ImportError::Operator(format!("stdin read failed: {}", e)))?;
        Ok(line.trim().to_string())
    }
}

#[async_trait]
impl OperatorChannel for TerminalOperator {
    async fn choose_candidate(
        &self,
        place_name: &str,
        candidates: &[RankedCandidate],
    ) -> Result<CandidateChoice> {
        println!("\nAmbiguous location: '{}'", place_name);
        for (i, c) in candidates.iter().enumerate() {
            println!("  [{}] {} (score {})", i + 1, c.name, c.score);
        }
        println!("  [n] create new location");
        loop {
            print!("Select candidate number or 'n': ");
            use std::io::Write;
            std::io::stdout()
                .flush()
                .map_err(|e| ImportError::Operator(e.to_string()))?;
            let answer = Self::read_line()?;
            if answer.eq_ignore_ascii_case("n") {
                return Ok(CandidateChoice::CreateNew);
            }
            if let Ok(idx) = answer.parse::<usize>() {
                if idx >= 1 && idx <= candidates.len() {
                    return Ok(CandidateChoice::Existing(candidates[idx - 1].location_id));
                }
            }
            println!("Invalid selection.");
        }
    }

    async fn confirm(&self, preview: &PreviewSummary) -> Result<bool> {
        println!("\n{}", preview);
        print!("Import this trip? [y/N]: ");
        use std::io::Write;
        std::io::stdout()
            .flush()
            .map_err(|e| ImportError::Operator(e.to_string()))?;
        let answer = Self::read_line()?;
        Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
    }
}

/// Non-interactive channel for unattended runs: takes the best-ranked
/// candidate when one exists (create-new otherwise) and auto-confirms
/// the preview. Every answer is still logged.
pub struct AutoOperator;

#[async_trait]
impl OperatorChannel for AutoOperator {
    async fn choose_candidate(
        &self,
        place_name: &str,
        candidates: &[RankedCandidate],
    ) -> Result<CandidateChoice> {
        match candidates.first() {
            Some(best) => {
                info!(
                    "Auto-selected '{}' (score {}) for '{}'",
                    best.name, best.score, place_name
                );
                Ok(CandidateChoice::Existing(best.location_id))
            }
            None => Ok(CandidateChoice::CreateNew),
        }
    }

    async fn confirm(&self, preview: &PreviewSummary) -> Result<bool> {
        info!("Auto-confirming preview for '{}'", preview.trip_name);
        Ok(true)
    }
}

/// Scripted channel for tests: answers candidate prompts from a queue
/// and the confirm gate with a fixed verdict.
pub struct ScriptedOperator {
    choices: Mutex<VecDeque<CandidateChoice>>,
    confirm_answer: bool,
}

impl ScriptedOperator {
    pub fn new(choices: Vec<CandidateChoice>, confirm_answer: bool) -> Self {
        Self {
            choices: Mutex::new(choices.into()),
            confirm_answer,
        }
    }
}

#[async_trait]
impl OperatorChannel for ScriptedOperator {
    async fn choose_candidate(
        &self,
        place_name: &str,
        _candidates: &[RankedCandidate],
    ) -> Result<CandidateChoice> {
        self.choices
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| {
                ImportError::Operator(format!(
                    "unexpected candidate prompt for '{}'",
                    place_name
                ))
            })
    }

    async fn confirm(&self, _preview: &PreviewSummary) -> Result<bool> {
        Ok(self.confirm_answer)
    }
}
