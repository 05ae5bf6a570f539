use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use esr31_core::{
    AcquisitionOptions, FieldMap, StopCondition, acquire_from_capture, make_report,
};

fn main() -> ExitCode {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> Result<(), String> {
    let root = PathBuf::from("tests").join("golden");
    let entries =
        fs::read_dir(&root).map_err(|err| format!("failed to read {}: {}", root.display(), err))?;

    for entry in entries {
        let entry = entry.map_err(|err| format!("failed to read entry: {}", err))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let input = path.join("input.txt");
        if !input.exists() {
            continue;
        }
        let output = path.join("expected_report.json");
        regenerate_one(&input, &output)?;
    }

    Ok(())
}

fn regenerate_one(input: &Path, output: &Path) -> Result<(), String> {
    let options = AcquisitionOptions {
        max_attempts: None,
        stop: StopCondition::Budget,
    };
    let result = acquire_from_capture(input, &FieldMap::esr31(), options)
        .map_err(|err| format!("acquisition failed for {}: {}", input.display(), err))?;
    let report = make_report(&input.display().to_string(), &result);
    let json = serde_json::to_string(&report)
        .map_err(|err| format!("JSON serialization failed: {}", err))?;
    fs::write(output, json)
        .map_err(|err| format!("failed to write {}: {}", output.display(), err))?;
    Ok(())
}
