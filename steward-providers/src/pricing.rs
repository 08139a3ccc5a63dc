//! Static pricing table and cost calculator.
//!
//! Cost is a pure function of `(provider, model, tokens_in, tokens_out)`.
//! Lookup picks the entry whose `model_prefix` is the longest prefix of
//! the model name, falls back to the provider's default entry, and
//! finally to zero — unknown models are served and recorded, never
//! rejected. Arithmetic is done in fixed-precision decimal so repeated
//! accumulation cannot drift the way binary floats do.

use crate::providers::ProviderKind;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// One row of the pricing table. Prices are USD per 1000 tokens.
/// A `model_prefix` of `None` is the provider's default entry.
#[derive(Debug, Clone, Copy)]
pub struct PricingEntry {
    pub provider: ProviderKind,
    pub model_prefix: Option<&'static str>,
    pub price_in_per_1k: Decimal,
    pub price_out_per_1k: Decimal,
}

/// Immutable after startup; extend by adding rows.
pub static PRICING_TABLE: &[PricingEntry] = &[
    PricingEntry {
        provider: ProviderKind::OpenAi,
        model_prefix: Some("gpt-4"),
        price_in_per_1k: dec!(0.03),
        price_out_per_1k: dec!(0.06),
    },
    PricingEntry {
        provider: ProviderKind::OpenAi,
        model_prefix: Some("gpt-3.5"),
        price_in_per_1k: dec!(0.0015),
        price_out_per_1k: dec!(0.002),
    },
    PricingEntry {
        provider: ProviderKind::DeepSeek,
        model_prefix: None,
        price_in_per_1k: dec!(0.00014),
        price_out_per_1k: dec!(0.00028),
    },
    PricingEntry {
        provider: ProviderKind::HuggingFace,
        model_prefix: None,
        price_in_per_1k: dec!(0),
        price_out_per_1k: dec!(0),
    },
];

fn lookup(provider: ProviderKind, model: &str) -> Option<&'static PricingEntry> {
    PRICING_TABLE
        .iter()
        .filter(|entry| entry.provider == provider)
        .filter(|entry| {
            entry
                .model_prefix
                .map(|prefix| model.starts_with(prefix))
                .unwrap_or(false)
        })
        .max_by_key(|entry| entry.model_prefix.map(|p| p.len()).unwrap_or(0))
        .or_else(|| {
            PRICING_TABLE
                .iter()
                .find(|entry| entry.provider == provider && entry.model_prefix.is_none())
        })
}

/// USD cost of one completion, unrounded.
///
/// Callers persist and report the value rounded to six decimal places.
pub fn cost(provider: ProviderKind, model: &str, tokens_in: u32, tokens_out: u32) -> Decimal {
    let Some(entry) = lookup(provider, model) else {
        return Decimal::ZERO;
    };

    let per_1k = dec!(1000);
    Decimal::from(tokens_in) / per_1k * entry.price_in_per_1k
        + Decimal::from(tokens_out) / per_1k * entry.price_out_per_1k
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpt4_prefix_pricing() {
        let usd = cost(ProviderKind::OpenAi, "gpt-4-turbo", 1000, 1000);
        assert_eq!(usd, dec!(0.09));
    }

    #[test]
    fn longest_prefix_wins() {
        // "gpt-3.5-turbo" matches the gpt-3.5 row, not gpt-4.
        let usd = cost(ProviderKind::OpenAi, "gpt-3.5-turbo", 1000, 1000);
        assert_eq!(usd, dec!(0.0035));
    }

    #[test]
    fn unknown_openai_model_costs_zero() {
        assert_eq!(cost(ProviderKind::OpenAi, "o1-preview", 5000, 5000), dec!(0));
    }

    #[test]
    fn deepseek_uses_provider_default_for_any_model() {
        let usd = cost(ProviderKind::DeepSeek, "deepseek-chat", 10, 5);
        assert_eq!(usd, dec!(0.0000028));
        assert_eq!(usd.round_dp(6), dec!(0.000003));
    }

    #[test]
    fn huggingface_is_free() {
        assert_eq!(
            cost(ProviderKind::HuggingFace, "mistralai/Mistral-7B-Instruct-v0.2", 9999, 9999),
            dec!(0)
        );
    }

    #[test]
    fn zero_tokens_cost_zero() {
        assert_eq!(cost(ProviderKind::OpenAi, "gpt-4", 0, 0), dec!(0));
    }
}
