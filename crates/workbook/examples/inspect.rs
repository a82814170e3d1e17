//! Inspect a workbook - print its shortcuts and calculations
//!
//! cargo run -p workbook --example inspect -- path/to/book.twb [path.to.field]

use workbook::Document;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: inspect <workbook> [dotted.field.path]");
        std::process::exit(2);
    };

    let document = Document::load(&path)?;
    println!("Loaded {} nodes from {}", document.arena().len(), path);

    for (name, &node_id) in document.shortcuts() {
        println!("shortcut {} -> {}", name, document.arena().xpath(node_id)?);
    }

    if let Some(field) = args.next() {
        println!("{} = {}", field, document.value(&field)?);
    }

    let calculations = document.calculations();
    println!("{}", serde_json::to_string_pretty(&calculations)?);

    Ok(())
}
