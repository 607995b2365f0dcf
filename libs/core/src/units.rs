//! Process unit scaling.
//!
//! Scaling is split into a pure planning step ([`scale_up_plan`],
//! [`scale_down_plan`]) and the remote calls that apply a plan. A scale-up is a
//! two-step protocol: the `PUT` that requests units, then a fresh read that
//! confirms the process reached its expected total. Either step can fail on
//! its own, and [`ScaleOutcome`] keeps the two failures apart.

use std::collections::BTreeMap;

use reqwest::header::HeaderMap;
use reqwest::Url;
use tracing::{error, info, warn};

use crate::client::{form_headers, Payload};
use crate::error::{Error, Result};
use crate::hooks::CommandRunner;
use crate::orchestrator::{BlueGreen, UnitDescriptor};
use crate::transport::{Method, Transport};

/// Units per process type.
pub type ProcessUnitCount = BTreeMap<String, u32>;

/// One per-process scaling request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleStep {
    /// Process type to scale.
    pub process: String,
    /// Units to add or remove.
    pub units: u32,
    /// Units the process should have once the step is applied.
    pub expected_total: u32,
}

/// Result of a single scale-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleOutcome {
    /// The API accepted the request and the new total was observed.
    Applied,
    /// The API answered the scale request with a non-200 status.
    Rejected { status: u16 },
    /// The request was accepted but the follow-up read disagrees.
    ///
    /// `observed` is `None` when the process is missing from the application
    /// or the follow-up read itself failed.
    VerificationFailed { expected: u32, observed: Option<u32> },
}

impl ScaleOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Steps needed to bring `current` up to `target`.
///
/// Process types already at or above their target produce no step, and
/// process types absent from `target` are left alone.
pub fn scale_up_plan(current: &ProcessUnitCount, target: &ProcessUnitCount) -> Vec<ScaleStep> {
    target
        .iter()
        .filter_map(|(process, &wanted)| {
            let have = current.get(process).copied().unwrap_or(0);
            let missing = wanted.checked_sub(have).filter(|n| *n > 0)?;
            Some(ScaleStep {
                process: process.clone(),
                units: missing,
                expected_total: wanted,
            })
        })
        .collect()
}

/// Steps needed to shrink every process in `current` down to `keep` units.
pub fn scale_down_plan(current: &ProcessUnitCount, keep: u32) -> Vec<ScaleStep> {
    current
        .iter()
        .filter_map(|(process, &have)| {
            let surplus = have.checked_sub(keep).filter(|n| *n > 0)?;
            Some(ScaleStep {
                process: process.clone(),
                units: surplus,
                expected_total: keep,
            })
        })
        .collect()
}

fn tally(units: &[UnitDescriptor]) -> ProcessUnitCount {
    let mut counts = ProcessUnitCount::new();
    for unit in units {
        *counts.entry(unit.process_name.clone()).or_insert(0) += 1;
    }
    counts
}

impl<T: Transport, R: CommandRunner> BlueGreen<T, R> {
    /// Live unit counts of `app`, read fresh from the API.
    pub fn total_units(&self, app: &str) -> Result<ProcessUnitCount> {
        let _guard = self.span.enter();

        let descriptor = self.fetch_app(app)?;
        Ok(tally(descriptor.units.as_deref().unwrap_or_default()))
    }

    /// Scale every process type of `app` down to `keep` units.
    ///
    /// All process types are attempted even when one fails; the result is
    /// `true` only if every removal succeeded.
    pub fn remove_units(&self, app: &str, keep: u32) -> Result<bool> {
        let _guard = self.span.enter();

        let Some(current) = self.current_units(app)? else {
            return Ok(false);
        };

        let mut all_removed = true;
        for step in scale_down_plan(&current, keep) {
            let response = self.client.send(
                Method::Delete,
                self.units_url(app, &step)?,
                Payload::Empty,
                form_headers(),
            )?;

            if response.is_ok() {
                info!(app, process = %step.process, units = step.units, "removed units");
            } else {
                error!(
                    app,
                    process = %step.process,
                    units = step.units,
                    status = response.status,
                    "failed to remove units; they must be removed manually"
                );
                all_removed = false;
            }
        }

        Ok(all_removed)
    }

    /// Scale `app` up until each process in `target` has its target units.
    ///
    /// Every step is verified with a fresh read before the next one starts.
    /// The result is `true` only if every attempted step was applied.
    pub fn add_units(&self, app: &str, target: &ProcessUnitCount) -> Result<bool> {
        let _guard = self.span.enter();

        let Some(current) = self.current_units(app)? else {
            return Ok(false);
        };

        let mut all_added = true;
        for step in scale_up_plan(&current, target) {
            let outcome = self.scale_up(app, &step)?;
            if !outcome.is_applied() {
                all_added = false;
            }
        }

        Ok(all_added)
    }

    /// Apply one scale-up step and verify it.
    pub fn scale_up(&self, app: &str, step: &ScaleStep) -> Result<ScaleOutcome> {
        let _guard = self.span.enter();

        let response = self.client.send(
            Method::Put,
            self.units_url(app, step)?,
            Payload::Empty,
            HeaderMap::new(),
        )?;
        if !response.is_ok() {
            error!(
                app,
                process = %step.process,
                units = step.units,
                status = response.status,
                "failed to add units"
            );
            return Ok(ScaleOutcome::Rejected {
                status: response.status,
            });
        }

        self.verify_units(app, step)
    }

    /// Re-read `app` and check that `step.process` reached its expected total.
    pub fn verify_units(&self, app: &str, step: &ScaleStep) -> Result<ScaleOutcome> {
        let _guard = self.span.enter();

        let observed = match self.total_units(app) {
            Ok(counts) => counts.get(&step.process).copied(),
            Err(Error::UnexpectedStatus { status, .. }) => {
                warn!(app, status, "could not read units back after scaling");
                None
            }
            Err(e) => return Err(e),
        };

        if observed == Some(step.expected_total) {
            info!(
                app,
                process = %step.process,
                units = step.units,
                total = step.expected_total,
                "added units"
            );
            return Ok(ScaleOutcome::Applied);
        }

        error!(
            app,
            process = %step.process,
            expected = step.expected_total,
            observed = ?observed,
            "scale request accepted but unit count did not reach the target"
        );
        Ok(ScaleOutcome::VerificationFailed {
            expected: step.expected_total,
            observed,
        })
    }

    /// Current counts, or `None` (already logged) on a non-2xx read.
    fn current_units(&self, app: &str) -> Result<Option<ProcessUnitCount>> {
        match self.total_units(app) {
            Ok(counts) => Ok(Some(counts)),
            Err(Error::UnexpectedStatus { status, .. }) => {
                error!(app, status, "could not read current units");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn units_url(&self, app: &str, step: &ScaleStep) -> Result<Url> {
        let mut url = self.app_url(app, "/units")?;
        url.query_pairs_mut()
            .append_pair("units", &step.units.to_string())
            .append_pair("process", &step.process);
        Ok(url)
    }
}
