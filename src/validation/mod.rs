//! Structural plan validation
//!
//! Rules-based checks that run once, before any tool is invoked.
//! Pure: the same plan always yields the same outcome.

use crate::error::OrchestrationError;
use crate::models::{Plan, Strategy};
use crate::Result;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Maximum steps allowed per plan; an engine limit enforced by `StepCountRule`
pub const MAX_STEPS_PER_PLAN: u32 = 50;

pub const MIN_PURPOSE_CHARS: usize = 10;
pub const MIN_REASONING_CHARS: usize = 30;

/// Trait for validation rules
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Err(detail)` when the plan violates this rule
    fn check(&self, plan: &Plan) -> std::result::Result<(), String>;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RuleViolation {
    pub rule: &'static str,
    pub detail: String,
}

impl From<RuleViolation> for OrchestrationError {
    fn from(violation: RuleViolation) -> Self {
        OrchestrationError::ValidationError {
            rule: violation.rule,
            detail: violation.detail,
        }
    }
}

/// Validator that applies rules in registration order
pub struct PlanValidator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl PlanValidator {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    /// First violated rule wins
    pub fn validate(&self, plan: &Plan) -> Result<()> {
        for rule in &self.rules {
            if let Err(detail) = rule.check(plan) {
                debug!(rule = rule.name(), detail = %detail, "Plan rejected");
                return Err(RuleViolation {
                    rule: rule.name(),
                    detail,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Every violated rule, in registration order
    pub fn violations(&self, plan: &Plan) -> Vec<RuleViolation> {
        self.rules
            .iter()
            .filter_map(|rule| {
                rule.check(plan).err().map(|detail| RuleViolation {
                    rule: rule.name(),
                    detail,
                })
            })
            .collect()
    }
}

impl Default for PlanValidator {
    fn default() -> Self {
        create_default_validator()
    }
}

//
// ========== Rules ==========
//

/// Rule: declared step count matches the call list.
///
/// Also caps plans at `MAX_STEPS_PER_PLAN`. The cap is an operational limit
/// of this engine; a longer plan is otherwise structurally valid.
pub struct StepCountRule;

impl ValidationRule for StepCountRule {
    fn name(&self) -> &'static str {
        "step_count"
    }

    fn check(&self, plan: &Plan) -> std::result::Result<(), String> {
        if plan.total_steps == 0 {
            return Err("total_steps must be at least 1".to_string());
        }
        if plan.total_steps > MAX_STEPS_PER_PLAN {
            return Err(format!(
                "total_steps {} exceeds maximum allowed steps ({})",
                plan.total_steps, MAX_STEPS_PER_PLAN
            ));
        }
        if plan.tool_calls.len() != plan.total_steps as usize {
            return Err(format!(
                "total_steps is {} but {} tool call(s) were given",
                plan.total_steps,
                plan.tool_calls.len()
            ));
        }
        Ok(())
    }
}

/// Rule: step numbers are exactly 1..=total_steps
pub struct ContiguousStepsRule;

impl ValidationRule for ContiguousStepsRule {
    fn name(&self) -> &'static str {
        "contiguous_steps"
    }

    fn check(&self, plan: &Plan) -> std::result::Result<(), String> {
        let mut seen = BTreeSet::new();
        for call in &plan.tool_calls {
            if !seen.insert(call.step) {
                return Err(format!("step {} appears more than once", call.step));
            }
        }

        let expected: BTreeSet<u32> = (1..=plan.total_steps).collect();
        if seen != expected {
            let missing: Vec<String> = expected
                .difference(&seen)
                .map(|s| s.to_string())
                .collect();
            let unexpected: Vec<String> = seen
                .difference(&expected)
                .map(|s| s.to_string())
                .collect();
            return Err(format!(
                "steps must be 1..={}; missing [{}], unexpected [{}]",
                plan.total_steps,
                missing.join(", "),
                unexpected.join(", ")
            ));
        }
        Ok(())
    }
}

/// Rule: SingleTool has exactly one step, every other strategy at least two
pub struct StrategyArityRule;

impl ValidationRule for StrategyArityRule {
    fn name(&self) -> &'static str {
        "strategy_arity"
    }

    fn check(&self, plan: &Plan) -> std::result::Result<(), String> {
        match plan.strategy {
            Strategy::SingleTool if plan.total_steps != 1 => Err(format!(
                "SingleTool requires exactly 1 step, got {}",
                plan.total_steps
            )),
            Strategy::ParallelTools | Strategy::SequentialTools | Strategy::HybridTools
                if plan.total_steps < 2 =>
            {
                Err(format!(
                    "{} requires at least 2 steps, got {}",
                    plan.strategy, plan.total_steps
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Rule: every call names a tool
pub struct ToolNameRule;

impl ValidationRule for ToolNameRule {
    fn name(&self) -> &'static str {
        "tool_name"
    }

    fn check(&self, plan: &Plan) -> std::result::Result<(), String> {
        match plan.tool_calls.iter().find(|c| c.tool_name.trim().is_empty()) {
            Some(call) => Err(format!("step {} has an empty tool name", call.step)),
            None => Ok(()),
        }
    }
}

/// Rule: parameters are an object carrying the `input` wrapper
pub struct InputWrapperRule;

impl ValidationRule for InputWrapperRule {
    fn name(&self) -> &'static str {
        "input_wrapper"
    }

    fn check(&self, plan: &Plan) -> std::result::Result<(), String> {
        match plan.tool_calls.iter().find(|c| c.input().is_none()) {
            Some(call) => Err(format!(
                "step {} parameters must be an object with an 'input' field",
                call.step
            )),
            None => Ok(()),
        }
    }
}

pub struct PurposeLengthRule;

impl ValidationRule for PurposeLengthRule {
    fn name(&self) -> &'static str {
        "purpose_length"
    }

    fn check(&self, plan: &Plan) -> std::result::Result<(), String> {
        match plan
            .tool_calls
            .iter()
            .find(|c| c.purpose.trim().chars().count() < MIN_PURPOSE_CHARS)
        {
            Some(call) => Err(format!(
                "step {} purpose must be at least {} characters",
                call.step, MIN_PURPOSE_CHARS
            )),
            None => Ok(()),
        }
    }
}

pub struct ReasoningLengthRule;

impl ValidationRule for ReasoningLengthRule {
    fn name(&self) -> &'static str {
        "reasoning_length"
    }

    fn check(&self, plan: &Plan) -> std::result::Result<(), String> {
        let length = plan.reasoning.trim().chars().count();
        if length < MIN_REASONING_CHARS {
            Err(format!(
                "reasoning must be at least {} characters, got {}",
                MIN_REASONING_CHARS, length
            ))
        } else {
            Ok(())
        }
    }
}

/// Rule: a result variable is written by one step only
pub struct UniqueResultVariableRule;

impl ValidationRule for UniqueResultVariableRule {
    fn name(&self) -> &'static str {
        "unique_result_variables"
    }

    fn check(&self, plan: &Plan) -> std::result::Result<(), String> {
        let mut owners: HashMap<&str, u32> = HashMap::new();
        for call in &plan.tool_calls {
            let Some(variable) = call.output_variable() else {
                continue;
            };
            if let Some(first) = owners.insert(variable, call.step) {
                return Err(format!(
                    "result variable '{}' is produced by both step {} and step {}",
                    variable, first, call.step
                ));
            }
        }
        Ok(())
    }
}

/// Create a validator with the standard rule set
pub fn create_default_validator() -> PlanValidator {
    let mut validator = PlanValidator::new();
    validator.add_rule(Box::new(StepCountRule));
    validator.add_rule(Box::new(ContiguousStepsRule));
    validator.add_rule(Box::new(StrategyArityRule));
    validator.add_rule(Box::new(ToolNameRule));
    validator.add_rule(Box::new(InputWrapperRule));
    validator.add_rule(Box::new(PurposeLengthRule));
    validator.add_rule(Box::new(ReasoningLengthRule));
    validator.add_rule(Box::new(UniqueResultVariableRule));
    validator
}

/// Validate with the standard rule set
pub fn validate_plan(plan: &Plan) -> Result<()> {
    create_default_validator().validate(plan)
}

//
// ================= Tests =================
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ToolCall;
    use crate::testing::{call, plan, stores};
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn rule_of(err: OrchestrationError) -> &'static str {
        match err {
            OrchestrationError::ValidationError { rule, .. } => rule,
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn well_formed_plans_pass() {
        let single = plan(Strategy::SingleTool, vec![call(1, "add", json!({"a": 1, "b": 2}))]);
        assert_ok!(validate_plan(&single));

        let hybrid = plan(
            Strategy::HybridTools,
            vec![
                call(2, "square", json!({"a": 3})),
                call(1, "add", json!({"a": 1, "b": 2})),
            ],
        );
        assert_ok!(validate_plan(&hybrid));
    }

    #[test]
    fn plans_beyond_the_step_cap_are_rejected() {
        let calls = |n: u32| -> Vec<ToolCall> {
            (1..=n).map(|step| call(step, "square", json!({"a": step}))).collect()
        };

        assert_ok!(validate_plan(&plan(Strategy::ParallelTools, calls(MAX_STEPS_PER_PLAN))));

        let err = validate_plan(&plan(Strategy::ParallelTools, calls(MAX_STEPS_PER_PLAN + 1))).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum allowed steps"));
        assert_eq!(rule_of(err), "step_count");
    }

    #[test]
    fn step_count_mismatch_is_rejected() {
        let mut p = plan(
            Strategy::ParallelTools,
            vec![call(1, "add", json!({"a": 1, "b": 2})), call(2, "square", json!({"a": 2}))],
        );
        p.total_steps = 3;

        assert_eq!(rule_of(validate_plan(&p).unwrap_err()), "step_count");
    }

    #[test]
    fn zero_steps_is_rejected() {
        let p = plan(Strategy::SingleTool, vec![]);
        assert_eq!(rule_of(validate_plan(&p).unwrap_err()), "step_count");
    }

    #[test]
    fn gaps_and_duplicates_are_rejected() {
        let gap = plan(
            Strategy::SequentialTools,
            vec![call(1, "add", json!({"a": 1, "b": 2})), call(3, "square", json!({"a": 2}))],
        );
        assert_eq!(rule_of(validate_plan(&gap).unwrap_err()), "contiguous_steps");

        let duplicate = plan(
            Strategy::SequentialTools,
            vec![call(1, "add", json!({"a": 1, "b": 2})), call(1, "square", json!({"a": 2}))],
        );
        assert_eq!(rule_of(validate_plan(&duplicate).unwrap_err()), "contiguous_steps");
    }

    #[test]
    fn strategy_arity_is_enforced() {
        let lonely_parallel = plan(Strategy::ParallelTools, vec![call(1, "add", json!({"a": 1, "b": 2}))]);
        assert_eq!(rule_of(validate_plan(&lonely_parallel).unwrap_err()), "strategy_arity");

        let crowded_single = plan(
            Strategy::SingleTool,
            vec![call(1, "add", json!({"a": 1, "b": 2})), call(2, "square", json!({"a": 2}))],
        );
        assert_eq!(rule_of(validate_plan(&crowded_single).unwrap_err()), "strategy_arity");
    }

    #[test]
    fn missing_input_wrapper_is_rejected() {
        let mut p = plan(Strategy::SingleTool, vec![call(1, "add", json!({"a": 1, "b": 2}))]);
        p.tool_calls[0].parameters = json!({"a": 1, "b": 2});

        assert_eq!(rule_of(validate_plan(&p).unwrap_err()), "input_wrapper");
    }

    #[test]
    fn short_purpose_and_reasoning_are_rejected() {
        let mut p = plan(Strategy::SingleTool, vec![call(1, "add", json!({"a": 1, "b": 2}))]);
        p.tool_calls[0].purpose = "add".to_string();
        assert_eq!(rule_of(validate_plan(&p).unwrap_err()), "purpose_length");

        let mut p = plan(Strategy::SingleTool, vec![call(1, "add", json!({"a": 1, "b": 2}))]);
        p.reasoning = "too short".to_string();
        assert_eq!(rule_of(validate_plan(&p).unwrap_err()), "reasoning_length");
    }

    #[test]
    fn result_variables_are_write_once() {
        let p = plan(
            Strategy::SequentialTools,
            vec![
                stores(call(1, "add", json!({"a": 1, "b": 2})), "x"),
                stores(call(2, "square", json!({"a": 2})), "x"),
            ],
        );
        assert_eq!(rule_of(validate_plan(&p).unwrap_err()), "unique_result_variables");
    }

    #[test]
    fn validation_is_repeatable() {
        let mut p = plan(Strategy::SingleTool, vec![call(1, "add", json!({"a": 1, "b": 2}))]);
        p.total_steps = 2;

        let first = assert_err!(validate_plan(&p)).to_string();
        let second = assert_err!(validate_plan(&p)).to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn violations_lists_every_failing_rule() {
        let mut p = plan(Strategy::ParallelTools, vec![call(1, "", json!({"a": 1}))]);
        p.reasoning.clear();

        let rules: Vec<&str> = create_default_validator()
            .violations(&p)
            .into_iter()
            .map(|v| v.rule)
            .collect();
        assert_eq!(rules, vec!["strategy_arity", "tool_name", "reasoning_length"]);
    }
}
