pub mod pricing;
pub mod script;

use self::pricing::PricingTable;
use self::script::QuoteScript;

/// Everything the session machine needs to price and drive the questionnaire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
    pub pricing: PricingTable,
    pub script: QuoteScript,
}

impl Catalog {
    pub fn new(pricing: PricingTable, script: QuoteScript) -> Self {
        Self { pricing, script }
    }
}
