//! Modules command - list the standard library.

use anyhow::Result;
use kiln_core::traits::Port;
use kiln_modules::create_standard_library;

fn ports(ports: &[Port]) -> String {
    ports
        .iter()
        .map(|p| {
            let optional = if p.optional { "?" } else { "" };
            format!("{}{}: {}", p.name, optional, p.signature_string())
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Run the modules command.
pub fn run(json: bool) -> Result<()> {
    let library = create_standard_library();
    let catalog = library.catalog();

    if json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }

    for entry in catalog {
        println!("{:<12} {}", format!("{:?}", entry.category), entry.info.key);
        if !entry.info.description.is_empty() {
            println!("             {}", entry.info.description);
        }
        println!("             in:  {}", ports(&entry.info.inputs));
        println!("             out: {}", ports(&entry.info.outputs));
    }

    Ok(())
}
