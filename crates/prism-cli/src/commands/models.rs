//! Model catalog listing

use anyhow::Result;
use prism_gen::{PrismConfig, ProviderRegistry};

pub fn run(config: &PrismConfig) -> Result<()> {
    let catalog = config.catalog();
    let registry = ProviderRegistry::from_config(config);

    println!("{} model(s):\n", catalog.all().len());
    for model in catalog.all() {
        let ready = if registry.contains(&model.provider) {
            "ready"
        } else {
            "no api key"
        };
        println!(
            "  {:<36} {:<20} {:<12} {:>2} credit(s)  {} ({})",
            model.model, model.label, model.style, model.cost_credits, model.provider, ready
        );
    }
    println!("\nRegistered providers: {}", registry.names().join(", "));
    Ok(())
}
