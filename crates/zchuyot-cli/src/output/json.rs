use zchuyot_core::error::RightsError;
use zchuyot_core::model::ExtractionOutcome;

pub fn print(outcomes: &[ExtractionOutcome]) -> Result<(), RightsError> {
    let json = serde_json::to_string_pretty(outcomes)?;
    println!("{json}");
    Ok(())
}
