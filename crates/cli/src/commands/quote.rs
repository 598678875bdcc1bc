use botdesk_core::{parse_feature_list, price_breakdown, PricingTable};

use crate::commands::CommandResult;

/// Prices a comma-separated feature list against the built-in table. Needs no config.
pub fn run(features: &str) -> CommandResult {
    let requested = parse_feature_list(features);
    if requested.is_empty() {
        return CommandResult::failure(
            "quote",
            "empty_selection",
            "no features given; pass a comma-separated list such as `basic_bot,api_integration`",
            2,
        );
    }

    let table = PricingTable::default();
    let breakdown = price_breakdown(&requested, &table);

    let mut lines = Vec::with_capacity(breakdown.lines.len() + 1);
    for line in &breakdown.lines {
        let note = if table.contains(&line.feature) { "" } else { " (unknown feature)" };
        lines.push(format!("{} = ${}{note}", line.feature, line.price));
    }
    lines.push(format!("total = ${}", breakdown.total));

    CommandResult::success("quote", lines.join("\n"))
}
