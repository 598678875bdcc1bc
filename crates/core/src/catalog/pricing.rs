use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::feature::FeatureId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Billing {
    OneTime,
    Monthly,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub feature: FeatureId,
    pub price: u32,
    pub billing: Billing,
}

impl PriceEntry {
    pub fn new(feature: impl Into<String>, price: u32, billing: Billing) -> Self {
        Self { feature: FeatureId::new(feature), price, billing }
    }

    /// `$50` or `$15/month`.
    pub fn price_label(&self) -> String {
        match self.billing {
            Billing::OneTime => format!("${}", self.price),
            Billing::Monthly => format!("${}/month", self.price),
        }
    }
}

/// Feature prices in whole currency units. Entry order is the menu order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTable {
    entries: Vec<PriceEntry>,
}

impl PricingTable {
    /// Later duplicates of a feature are ignored so lookups stay unambiguous.
    pub fn new(entries: Vec<PriceEntry>) -> Self {
        let mut seen = HashSet::new();
        let entries =
            entries.into_iter().filter(|entry| seen.insert(entry.feature.clone())).collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[PriceEntry] {
        &self.entries
    }

    pub fn price_of(&self, feature: &FeatureId) -> u32 {
        self.entries
            .iter()
            .find(|entry| &entry.feature == feature)
            .map(|entry| entry.price)
            .unwrap_or(0)
    }

    pub fn contains(&self, feature: &FeatureId) -> bool {
        self.entries.iter().any(|entry| &entry.feature == feature)
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        use Billing::{Monthly, OneTime};

        Self::new(vec![
            PriceEntry::new("basic_bot", 50, OneTime),
            PriceEntry::new("api_integration", 30, OneTime),
            PriceEntry::new("automation", 40, OneTime),
            PriceEntry::new("custom_ui", 25, OneTime),
            PriceEntry::new("database_support", 35, OneTime),
            PriceEntry::new("web_dashboard", 45, OneTime),
            PriceEntry::new("payment_integration", 40, OneTime),
            PriceEntry::new("analytics", 30, OneTime),
            PriceEntry::new("hosting", 20, OneTime),
            PriceEntry::new("maintenance", 15, Monthly),
        ])
    }
}

/// Sum over unique features; unknown features count as zero.
pub fn compute_total<'a, I>(features: I, table: &PricingTable) -> u64
where
    I: IntoIterator<Item = &'a FeatureId>,
{
    let mut seen = HashSet::new();
    features
        .into_iter()
        .filter(|feature| seen.insert(*feature))
        .map(|feature| u64::from(table.price_of(feature)))
        .sum()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLine {
    pub feature: FeatureId,
    pub price: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteBreakdown {
    pub lines: Vec<QuoteLine>,
    pub total: u64,
}

impl QuoteBreakdown {
    pub fn features(&self) -> impl Iterator<Item = &FeatureId> {
        self.lines.iter().map(|line| &line.feature)
    }
}

/// Per-feature lines in first-seen order, duplicates dropped, plus the total.
pub fn price_breakdown<'a, I>(features: I, table: &PricingTable) -> QuoteBreakdown
where
    I: IntoIterator<Item = &'a FeatureId>,
{
    let mut seen = HashSet::new();
    let lines: Vec<QuoteLine> = features
        .into_iter()
        .filter(|feature| seen.insert(*feature))
        .map(|feature| QuoteLine { feature: feature.clone(), price: table.price_of(feature) })
        .collect();
    let total = lines.iter().map(|line| u64::from(line.price)).sum();

    QuoteBreakdown { lines, total }
}
