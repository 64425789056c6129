use std::path::Path;
use zchuyot_core::error::RightsError;
use zchuyot_core::vocab::{builtin, compile, load_vocabulary};

pub fn list() -> Result<(), RightsError> {
    println!("Available header vocabularies:\n");
    for name in builtin::PRESETS {
        let vocab = builtin::load_preset(name)?;
        println!("  {:<8} {} (v{})", name, vocab.name, vocab.version);
        if let Some(ref desc) = vocab.description {
            println!("           {}", desc);
        }
        println!();
    }
    Ok(())
}

pub fn show(preset: &str) -> Result<(), RightsError> {
    let vocab = builtin::load_preset(preset)?;

    println!("{} (version {})\n", vocab.name, vocab.version);
    if let Some(ref desc) = vocab.description {
        println!("{}\n", desc);
    }

    println!("Canonical fields ({}):\n", vocab.columns.len());
    let width = vocab
        .columns
        .iter()
        .map(|c| c.field.as_str().len())
        .max()
        .unwrap_or(20);
    for column in &vocab.columns {
        println!(
            "  {:<width$}  {:<8}  {}",
            column.field.as_str(),
            format!("{:?}", column.field.semantic_type()).to_lowercase(),
            column.variants.join("  |  "),
            width = width
        );
        if let Some(ref note) = column.note {
            println!("  {:<width$}  {}", "", note, width = width + 10);
        }
    }

    if !vocab.section_keywords.is_empty() {
        println!("\nSection keywords:\n");
        println!("  {}", vocab.section_keywords.join("  |  "));
    }

    if !vocab.status_keywords.is_empty() {
        println!("\nStatus keywords:\n");
        for status in &vocab.status_keywords {
            println!("  {:<9} {}", status.status, status.patterns.join("  |  "));
        }
    }
    println!();

    Ok(())
}

pub fn validate(file: &Path) -> Result<(), RightsError> {
    let vocab = load_vocabulary(file)?;
    let name = vocab.name.clone();
    let version = vocab.version.clone();
    let compiled = compile(vocab)?;
    println!(
        "OK: '{}' (v{}) with {} field(s) and {} status keyword group(s)",
        name,
        version,
        compiled.definition().columns.len(),
        compiled.definition().status_keywords.len()
    );
    Ok(())
}
