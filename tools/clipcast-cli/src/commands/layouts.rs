//! List export layouts.

use clipcast_compositor::LAYOUTS;

pub fn run(json: bool) -> anyhow::Result<()> {
    if json {
        let entries: Vec<serde_json::Value> = LAYOUTS
            .iter()
            .map(|def| {
                serde_json::json!({
                    "id": def.id,
                    "label": def.label,
                    "uses_screen": def.id.uses_screen(),
                    "uses_camera": def.id.uses_camera(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("Layouts:");
    for def in LAYOUTS.iter() {
        let sources = match (def.id.uses_screen(), def.id.uses_camera()) {
            (true, true) => "screen + camera",
            (true, false) => "screen",
            (false, true) => "camera",
            (false, false) => "background",
        };
        println!("  {:<22} {:<14} [{sources}]", def.id.as_str(), def.label);
    }
    Ok(())
}
