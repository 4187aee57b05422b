//! Cost Ledger: running usage/monetary total persisted across stage processes.
//!
//! Every stage process loads the total at start, adds one increment per
//! completion and saves after each call, so a crash loses at most the call in
//! flight. Missing usage counters and unpriced models count as a zero
//! monetary increment (logged with `warn!`), never an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::gateway::CompletionRecord;

/// File name of the persisted total inside an output directory.
pub const COST_FILE: &str = "accumulated_cost.json";

/// USD prices per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_million: f64,
    /// Falls back to the input price when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_input_per_million: Option<f64>,
    pub output_per_million: f64,
}

impl ModelPrice {
    pub const fn new(input: f64, cached_input: f64, output: f64) -> Self {
        Self {
            input_per_million: input,
            cached_input_per_million: Some(cached_input),
            output_per_million: output,
        }
    }

    /// Cost of one call. `cached` is a subset of `prompt`.
    pub fn cost(&self, prompt: u64, cached: u64, completion: u64) -> f64 {
        let cached = cached.min(prompt);
        let uncached = prompt - cached;
        let cached_price = self.cached_input_per_million.unwrap_or(self.input_per_million);
        (uncached as f64 * self.input_per_million
            + cached as f64 * cached_price
            + completion as f64 * self.output_per_million)
            / 1_000_000.0
    }
}

/// Model name → price, with prefix matching for dated model snapshots.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    entries: BTreeMap<String, ModelPrice>,
}

impl PriceTable {
    /// Prices for commonly used models.
    pub fn builtin() -> Self {
        let mut table = Self::default();
        for (model, price) in [
            ("o1", ModelPrice::new(15.0, 7.5, 60.0)),
            ("o1-mini", ModelPrice::new(1.10, 0.55, 4.40)),
            ("o3", ModelPrice::new(2.0, 0.5, 8.0)),
            ("o3-mini", ModelPrice::new(1.10, 0.55, 4.40)),
            ("o4-mini", ModelPrice::new(1.10, 0.275, 4.40)),
            ("gpt-4o", ModelPrice::new(2.50, 1.25, 10.0)),
            ("gpt-4o-mini", ModelPrice::new(0.15, 0.075, 0.60)),
            ("gpt-4.1", ModelPrice::new(2.0, 0.5, 8.0)),
            ("gpt-4.1-mini", ModelPrice::new(0.40, 0.10, 1.60)),
            ("gpt-4.1-nano", ModelPrice::new(0.10, 0.025, 0.40)),
        ] {
            table.insert(model, price);
        }
        table
    }

    pub fn insert(&mut self, model: &str, price: ModelPrice) {
        self.entries.insert(model.to_string(), price);
    }

    /// Exact match first, then the longest entry that prefixes `model`.
    pub fn lookup(&self, model: &str) -> Option<&ModelPrice> {
        self.entries.get(model).or_else(|| {
            self.entries
                .iter()
                .filter(|(name, _)| model.starts_with(name.as_str()))
                .max_by_key(|(name, _)| name.len())
                .map(|(_, price)| price)
        })
    }
}

/// Additive usage/cost aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    #[serde(default)]
    pub prompt_units: u64,
    #[serde(default)]
    pub completion_units: u64,
    #[serde(default)]
    pub cached_units: u64,
    #[serde(default)]
    pub monetary_cost: f64,
    #[serde(default)]
    pub calls: u64,
}

impl CostRecord {
    /// Sum of two aggregates.
    pub fn merge(&self, other: &CostRecord) -> CostRecord {
        CostRecord {
            prompt_units: self.prompt_units + other.prompt_units,
            completion_units: self.completion_units + other.completion_units,
            cached_units: self.cached_units + other.cached_units,
            monetary_cost: self.monetary_cost + other.monetary_cost,
            calls: self.calls + other.calls,
        }
    }
}

/// On-disk shapes accepted by [`load_total`].
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredCost {
    Legacy { total_accumulated_cost: f64 },
    Record(CostRecord),
}

/// Load the running total, or zero when nothing was persisted yet.
pub fn load_total(path: &Path) -> Result<CostRecord> {
    if !path.exists() {
        return Ok(CostRecord::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read cost file: {}", path.display()))?;
    let stored: StoredCost = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse cost file: {}", path.display()))?;
    Ok(match stored {
        StoredCost::Legacy {
            total_accumulated_cost,
        } => CostRecord {
            monetary_cost: total_accumulated_cost,
            ..CostRecord::default()
        },
        StoredCost::Record(record) => record,
    })
}

/// Persist the running total. Written to a sibling temp file and renamed so a
/// crash mid-write never leaves a truncated ledger.
pub fn save_total(path: &Path, total: &CostRecord) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(total).context("Failed to serialize cost total")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// Cost increment for one completion.
pub fn cost_increment(response: &CompletionRecord, model: &str, prices: &PriceTable) -> CostRecord {
    let Some(usage) = response.usage.as_ref() else {
        tracing::warn!(model, "Completion has no usage counters; counting zero cost");
        return CostRecord {
            calls: 1,
            ..CostRecord::default()
        };
    };
    if usage.prompt_tokens.is_none() && usage.completion_tokens.is_none() {
        tracing::warn!(model, "Completion usage has no token counters; counting zero cost");
    }

    let prompt = usage.prompt_tokens.unwrap_or(0);
    let completion = usage.completion_tokens.unwrap_or(0);
    let cached = usage.cached_tokens();

    let monetary_cost = match prices.lookup(model) {
        Some(price) => price.cost(prompt, cached, completion),
        None => {
            tracing::warn!(model, "No price for model; counting tokens only");
            0.0
        }
    };

    CostRecord {
        prompt_units: prompt,
        completion_units: completion,
        cached_units: cached,
        monetary_cost,
        calls: 1,
    }
}

/// Add one completion to `total`, log the increment under `stage`, and return
/// the new total.
pub fn record_cost(
    response: &CompletionRecord,
    model: &str,
    stage: &str,
    total: &CostRecord,
    prices: &PriceTable,
) -> CostRecord {
    let increment = cost_increment(response, model, prices);
    let new_total = total.merge(&increment);
    tracing::info!(
        stage,
        prompt_tokens = increment.prompt_units,
        cached_tokens = increment.cached_units,
        completion_tokens = increment.completion_units,
        cost = %format!("${:.4}", increment.monetary_cost),
        total = %format!("${:.4}", new_total.monetary_cost),
        "completion cost"
    );
    new_total
}

/// Load-record-save lifecycle bound to one output directory.
#[derive(Debug)]
pub struct CostLedger {
    path: PathBuf,
    prices: PriceTable,
    total: CostRecord,
}

impl CostLedger {
    /// Load the ledger at `output_dir/accumulated_cost.json`.
    pub fn open(output_dir: &Path, prices: PriceTable) -> Result<Self> {
        let path = output_dir.join(COST_FILE);
        let total = load_total(&path)?;
        Ok(Self {
            path,
            prices,
            total,
        })
    }

    /// Record one completion and persist immediately. Returns the increment.
    pub fn record(
        &mut self,
        response: &CompletionRecord,
        model: &str,
        stage: &str,
    ) -> Result<CostRecord> {
        let before = self.total.clone();
        self.total = record_cost(response, model, stage, &before, &self.prices);
        save_total(&self.path, &self.total)?;
        Ok(CostRecord {
            prompt_units: self.total.prompt_units - before.prompt_units,
            completion_units: self.total.completion_units - before.completion_units,
            cached_units: self.total.cached_units - before.cached_units,
            monetary_cost: self.total.monetary_cost - before.monetary_cost,
            calls: 1,
        })
    }

    pub fn save(&self) -> Result<()> {
        save_total(&self.path, &self.total)
    }

    pub fn total(&self) -> &CostRecord {
        &self.total
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
