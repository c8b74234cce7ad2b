//! List built-in backgrounds.

use clipcast_compositor::background::gradient_colors;
use clipcast_media_model::{background_catalogue, BackgroundKind};

pub fn run(json: bool) -> anyhow::Result<()> {
    let catalogue = background_catalogue();
    if json {
        println!("{}", serde_json::to_string_pretty(&catalogue)?);
        return Ok(());
    }

    println!("Backgrounds:");
    for option in &catalogue {
        if option.kind != BackgroundKind::Gradient {
            println!("  {:<18} {}", option.id, option.label);
            continue;
        }
        let (from, to) = gradient_colors(&option.value);
        println!(
            "  {:<18} {:<12} #{:02x}{:02x}{:02x} -> #{:02x}{:02x}{:02x}",
            option.id, option.label, from[0], from[1], from[2], to[0], to[1], to[2]
        );
    }
    println!();
    println!("Any image path may also be passed as a background.");
    Ok(())
}
