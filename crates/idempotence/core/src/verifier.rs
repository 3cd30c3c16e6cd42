//! The idempotence verifier.
//!
//! Executes a probe `runs` times in program order and compares every
//! observation after the first successful one against it. Runs whose failure
//! is tolerated still have their watched paths and state compared.

use crate::error::{IdempotenceError, IdempotenceResult};
use crate::observation::{Divergence, Observation};
use crate::probe::Probe;
use crate::types::{Tolerance, VerifierConfig};
use crate::verdict::Verdict;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs probes and classifies them.
pub struct Verifier {
    config: VerifierConfig,
}

impl Verifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify `probe` over `runs` sequential executions.
    ///
    /// Returns `Err` only for harness problems (bad run count, spawn or
    /// snapshot errors). Misbehaving probes produce a failing [`Verdict`].
    pub fn verify(&self, probe: &mut Probe, runs: u32) -> IdempotenceResult<Verdict> {
        if runs < 2 {
            return Err(IdempotenceError::InvalidConfiguration(format!(
                "idempotence needs at least 2 runs, got {}",
                runs
            )));
        }

        if let Some(path) = probe.missing_target() {
            warn!(probe = %probe.name, path = %path.display(), "probe target not found, skipping");
            let reason = format!("target not found: {}", path.display());
            return Ok(Verdict::skipped(&probe.name, probe.category, runs, reason)
                .with_description(&probe.description));
        }

        let compare_output = probe.compare_output.unwrap_or(self.config.compare_output);
        let start = Instant::now();
        let mut baseline: Option<Observation> = None;
        // Effects of the first tolerated failure, used until a run succeeds.
        let mut first_failure: Option<Observation> = None;
        let mut warnings = Vec::new();

        info!(probe = %probe.name, runs, "verifying idempotence: {}", probe.describe());

        for run in 1..=runs {
            let observation = probe.run_once(run)?;
            debug!(
                probe = %probe.name,
                run,
                exit = %observation.exit,
                elapsed = ?observation.duration,
                "run completed"
            );

            if !observation.exit.success {
                let message = if run == 1 {
                    format!("first run failed ({})", observation.exit)
                } else {
                    format!("run {} failed ({})", run, observation.exit)
                };

                match probe.tolerance {
                    Tolerance::Strict => {
                        warn!(probe = %probe.name, run, "{}", message);
                        return Ok(Verdict::failed(&probe.name, probe.category, runs, run, message)
                            .with_description(&probe.description)
                            .with_output(observation.output_lossy())
                            .with_duration(start.elapsed()));
                    }
                    Tolerance::WarnOnFailure => {
                        warn!(probe = %probe.name, run, "tolerated failure: {}", message);
                        warnings.push(message);
                        match baseline.as_ref().or(first_failure.as_ref()) {
                            Some(reference) => {
                                if let Some(divergence) = observation.diff_effects(reference) {
                                    return Ok(diverged(probe, runs, &observation, divergence, start));
                                }
                            }
                            None => first_failure = Some(observation),
                        }
                        continue;
                    }
                }
            }

            let Some(first) = baseline.as_ref() else {
                baseline = Some(observation);
                continue;
            };

            if let Some(divergence) = observation.diff(first, compare_output) {
                return Ok(diverged(probe, runs, &observation, divergence, start));
            }
        }

        let duration = start.elapsed();
        let verdict = if warnings.is_empty() {
            info!(probe = %probe.name, "idempotent across {} runs", runs);
            Verdict::passed(&probe.name, probe.category, runs, duration)
        } else {
            Verdict::warned(&probe.name, probe.category, runs, warnings, duration)
        };
        Ok(verdict.with_description(&probe.description))
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(VerifierConfig::default())
    }
}

fn diverged(
    probe: &Probe,
    runs: u32,
    observation: &Observation,
    divergence: Divergence,
    start: Instant,
) -> Verdict {
    warn!(probe = %probe.name, "idempotence broken: {}", divergence);
    Verdict::failed(
        &probe.name,
        probe.category,
        runs,
        observation.run,
        divergence.to_string(),
    )
    .with_description(&probe.description)
    .with_output(observation.output_lossy())
    .with_divergence(divergence)
    .with_duration(start.elapsed())
}

/// Verify with the default configuration.
pub fn verify(probe: &mut Probe, runs: u32) -> IdempotenceResult<Verdict> {
    Verifier::default().verify(probe, runs)
}
