//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler, SkipReason};
use tracing::{debug, error, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::NodeSkipped { dependency, reason } => match reason {
                SkipReason::AmbiguousResolution { count } => {
                    warn!(
                        dependency = %dependency,
                        candidates = count,
                        "Dependency resolution was ambiguous, skipping deobfuscation"
                    );
                }
                SkipReason::ManifestRead { message } => {
                    warn!(
                        dependency = %dependency,
                        error = %message,
                        "Failed to read manifest for deobfuscation detection"
                    );
                }
                SkipReason::Resolve { message } => {
                    warn!(dependency = %dependency, error = %message, "Dependency resolution failed");
                }
                SkipReason::StepCollision { .. }
                | SkipReason::Unresolved
                | SkipReason::NotObfuscated => {
                    debug!(dependency = %dependency, reason = %reason, "Leaving dependency untouched");
                }
            },
            ProgressEvent::ReplacementRegistered { dependency, group } => {
                info!(dependency = %dependency, group = %group, "Registered deobfuscated replacement");
            }
            ProgressEvent::MissingSources { dependency } => {
                warn!(dependency = %dependency, "Could not find sources for dependency, decompiling");
            }
            ProgressEvent::Finalized { replacements } => {
                info!(replacements, "Bound deferred deobfuscation steps");
            }
            ProgressEvent::StepStarted { step } => {
                debug!(step = %step, "Executing step");
            }
            ProgressEvent::StepFinished { step, duration } => {
                debug!(
                    step = %step,
                    duration_ms = duration.as_millis(),
                    "Step complete"
                );
            }
            ProgressEvent::StepFailed { step, error: message } => {
                error!(step = %step, error = %message, "Step failed");
            }
        }
    }
}
