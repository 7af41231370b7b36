// Terminal rendering of session activity

use serde::Serialize;

use crate::api::ApiError;
use crate::provisioning::{
    ChainOutcome, ProvisionError, RollbackReport, SessionEvent, StepError, TeardownReport,
};

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_step_error(error: &StepError) {
    println!("      {}", error.message);
    if let Some(hint) = &error.hint {
        println!("      💡 {hint}");
    }
}

/// One status line per event; progress ticks only render at 25% steps
pub fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Cleared { run } if *run > 1 => println!("🔁 Run #{run}"),
        SessionEvent::Cleared { .. } => {}
        SessionEvent::StepStarted { step } => println!("⏳ {}...", step.label()),
        SessionEvent::StepProgress { step, progress } => {
            let quarter = progress.ticks > 0
                && progress.ticks < progress.max
                && (progress.ticks * 4) % progress.max == 0;
            if quarter {
                println!("   {} {}%", step.label(), progress.percent());
            }
        }
        SessionEvent::StepSucceeded { step } => println!("   ✅ {}: OK", step.label()),
        SessionEvent::StepFailed { step, error } => {
            println!("   ❌ {}: ERROR", step.label());
            print_step_error(error);
        }
        SessionEvent::ArtifactCreated { kind, id } => {
            println!("   📌 created {} {id}", kind.describe())
        }
        SessionEvent::ArtifactOrphaned { kind, id } => {
            println!("   ⚠️  {} {id} was left on the provider", kind.describe())
        }
        SessionEvent::RollbackStarted { artifacts } => {
            println!("↩️  Rolling back {artifacts} test artifact(s)")
        }
        SessionEvent::RollbackFinished { failures: 0 } => println!("   ✅ Rollback complete"),
        SessionEvent::RollbackFinished { failures } => {
            println!("   ⚠️  Rollback finished with {failures} failure(s)")
        }
        SessionEvent::Committed => println!("🎉 Integration added"),
        SessionEvent::Closed => println!("🔒 Session closed"),
    }
}

pub fn print_outcome(outcome: &ChainOutcome) {
    match outcome {
        ChainOutcome::Completed => println!("✅ All checks passed"),
        ChainOutcome::Halted { step, error } => {
            println!("❌ Stopped at {}", step.label());
            print_step_error(error);
        }
        ChainOutcome::Cancelled { .. } => println!("🛑 Cancelled"),
    }
}

pub fn print_rollback(report: &RollbackReport) {
    for entry in &report.entries {
        match entry.error() {
            None => println!("   🗑️  deleted {} {}", entry.handle.kind.describe(), entry.handle.id),
            Some(error) => {
                println!(
                    "   ⚠️  could not delete {} {}",
                    entry.handle.kind.describe(),
                    entry.handle.id
                );
                print_step_error(error);
            }
        }
    }
}

pub fn print_teardown(report: &TeardownReport) {
    for entry in &report.compensations {
        match &entry.error {
            None => println!("   ✅ {} {}", entry.step.label(), entry.resource_id),
            Some(error) => {
                println!("   ❌ {} {}", entry.step.label(), entry.resource_id);
                print_step_error(error);
            }
        }
    }
    if report.deleted {
        println!("🗑️  Integration deleted");
    } else {
        println!("⚠️  Integration kept: provider cleanup failed, fix access and retry");
    }
}

pub fn print_api_error(error: &ApiError) {
    eprintln!("❌ {error}");
    for tip in error.troubleshooting() {
        eprintln!("   💡 {tip}");
    }
}

pub fn print_provision_error(error: &ProvisionError) {
    match error {
        ProvisionError::Api(api) => print_api_error(api),
        ProvisionError::CommitFailed(step) => {
            eprintln!("❌ Commit failed");
            print_step_error(step);
        }
        other => eprintln!("❌ {other}"),
    }
}
