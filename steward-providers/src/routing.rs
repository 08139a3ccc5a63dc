//! Deterministic provider routing.
//!
//! Selection is a pure function of the request hints: the first matching
//! priority rule picks the primary, and the fallback chain is the
//! remaining providers in the canonical order. Identical hints always
//! produce identical decisions, which keeps routing previewable and
//! testable.
//!
//! Priority rules, first match wins:
//!
//! 1. `task == summarization` -> deepseek
//! 2. `task == reasoning` -> huggingface
//! 3. `latency_sensitive` -> openai
//! 4. `budget == low` -> deepseek
//! 5. `budget == high` -> openai
//! 6. default -> openai

use crate::providers::{ProviderKind, FALLBACK_ORDER};
use serde::{Deserialize, Serialize};

/// Workload category hinted by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Summarization,
    Reasoning,
    General,
}

/// Spend appetite hinted by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Budget {
    Low,
    Medium,
    High,
}

/// Routing inputs extracted from one request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteHints {
    pub task: Option<TaskKind>,
    pub budget: Option<Budget>,
    pub latency_sensitive: bool,
}

/// Outcome of routing: the primary, the full ordered chain (primary
/// first), and a human-readable account of what triggered the choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub primary: ProviderKind,
    pub chain: Vec<ProviderKind>,
    pub reason: String,
}

fn select_primary(hints: &RouteHints) -> (ProviderKind, String) {
    if hints.task == Some(TaskKind::Summarization) {
        return (
            ProviderKind::DeepSeek,
            "task=summarization prefers deepseek".to_string(),
        );
    }
    if hints.task == Some(TaskKind::Reasoning) {
        return (
            ProviderKind::HuggingFace,
            "task=reasoning prefers huggingface".to_string(),
        );
    }
    if hints.latency_sensitive {
        return (
            ProviderKind::OpenAi,
            "latency_sensitive=true prefers openai".to_string(),
        );
    }
    if hints.budget == Some(Budget::Low) {
        return (
            ProviderKind::DeepSeek,
            "budget=low prefers deepseek".to_string(),
        );
    }
    if hints.budget == Some(Budget::High) {
        return (
            ProviderKind::OpenAi,
            "budget=high prefers openai".to_string(),
        );
    }
    (
        ProviderKind::OpenAi,
        "no routing hints matched; defaulting to openai".to_string(),
    )
}

/// Compute the routing decision for `hints` over the available providers.
///
/// Returns `None` when no provider is available. When the rule-selected
/// primary is unavailable the chain simply starts at the first available
/// provider in canonical order.
pub fn route(hints: &RouteHints, available: &[ProviderKind]) -> Option<RouteDecision> {
    let (preferred, reason) = select_primary(hints);

    let mut chain: Vec<ProviderKind> = Vec::with_capacity(FALLBACK_ORDER.len());
    if available.contains(&preferred) {
        chain.push(preferred);
    }
    for kind in FALLBACK_ORDER {
        if kind != preferred && available.contains(&kind) {
            chain.push(kind);
        }
    }

    let primary = *chain.first()?;
    Some(RouteDecision {
        primary,
        chain,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ProviderKind; 3] = FALLBACK_ORDER;

    fn primary_for(hints: RouteHints) -> ProviderKind {
        route(&hints, &ALL).unwrap().primary
    }

    #[test]
    fn summarization_routes_to_deepseek() {
        let decision = route(
            &RouteHints {
                task: Some(TaskKind::Summarization),
                budget: Some(Budget::Low),
                latency_sensitive: false,
            },
            &ALL,
        )
        .unwrap();
        assert_eq!(decision.primary, ProviderKind::DeepSeek);
        assert_eq!(
            decision.chain,
            vec![
                ProviderKind::DeepSeek,
                ProviderKind::OpenAi,
                ProviderKind::HuggingFace
            ]
        );
    }

    #[test]
    fn reasoning_routes_to_huggingface() {
        assert_eq!(
            primary_for(RouteHints {
                task: Some(TaskKind::Reasoning),
                ..Default::default()
            }),
            ProviderKind::HuggingFace
        );
    }

    #[test]
    fn task_outranks_latency_and_budget() {
        assert_eq!(
            primary_for(RouteHints {
                task: Some(TaskKind::Summarization),
                budget: Some(Budget::High),
                latency_sensitive: true,
            }),
            ProviderKind::DeepSeek
        );
    }

    #[test]
    fn latency_sensitive_routes_to_openai() {
        assert_eq!(
            primary_for(RouteHints {
                latency_sensitive: true,
                budget: Some(Budget::Low),
                ..Default::default()
            }),
            ProviderKind::OpenAi
        );
    }

    #[test]
    fn low_budget_routes_to_deepseek() {
        assert_eq!(
            primary_for(RouteHints {
                budget: Some(Budget::Low),
                ..Default::default()
            }),
            ProviderKind::DeepSeek
        );
    }

    #[test]
    fn high_budget_and_default_route_to_openai() {
        assert_eq!(
            primary_for(RouteHints {
                budget: Some(Budget::High),
                ..Default::default()
            }),
            ProviderKind::OpenAi
        );
        assert_eq!(primary_for(RouteHints::default()), ProviderKind::OpenAi);
    }

    #[test]
    fn general_task_falls_through_to_later_rules() {
        assert_eq!(
            primary_for(RouteHints {
                task: Some(TaskKind::General),
                budget: Some(Budget::Low),
                ..Default::default()
            }),
            ProviderKind::DeepSeek
        );
    }

    #[test]
    fn identical_hints_give_identical_decisions() {
        let hints = RouteHints {
            task: Some(TaskKind::Reasoning),
            budget: Some(Budget::Medium),
            latency_sensitive: true,
        };
        let a = route(&hints, &ALL).unwrap();
        let b = route(&hints, &ALL).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unavailable_primary_starts_chain_at_next_in_order() {
        let available = [ProviderKind::OpenAi, ProviderKind::HuggingFace];
        let decision = route(
            &RouteHints {
                budget: Some(Budget::Low),
                ..Default::default()
            },
            &available,
        )
        .unwrap();
        assert_eq!(decision.primary, ProviderKind::OpenAi);
        assert_eq!(
            decision.chain,
            vec![ProviderKind::OpenAi, ProviderKind::HuggingFace]
        );
    }

    #[test]
    fn no_available_providers_yields_none() {
        assert!(route(&RouteHints::default(), &[]).is_none());
    }
}
