//! GCP Workflows dialect
//!
//! The schema of Google Cloud Workflows definitions, expressed as a type
//! graph: a map of workflow names to workflows, each a list of named steps.
//! Step bodies nest further step lists, so the step list is a forward
//! reference.

use crate::diagnostics::problems::{Problem, ProblemKind};
use crate::error::{ConstraintError, SchemaLoadError};
use crate::parser::structure::SNodeKind;

use super::constraints::{require_at_most_one_of, ConstraintTarget};
use super::context::DynamicSchemaContext;
use super::dialect::Dialect;
use super::types::{
    any, atomic, bean, context_aware, forward, integer, map, prop, sequence, EnumTypeBuilder,
    YType,
};

/// Step actions; a step performs at most one of them
pub const STEP_ACTION_KEYWORDS: &[&str] = &[
    "assign", "call", "switch", "for", "parallel", "try", "raise", "return", "steps",
];

/// Standard library functions suggested for `call`
pub const STDLIB_CONNECTORS: &[&str] = &[
    "http.get",
    "http.post",
    "http.put",
    "http.patch",
    "http.delete",
    "http.request",
    "sys.get_env",
    "sys.log",
    "sys.now",
    "sys.sleep",
    "events.await_callback",
    "events.create_callback_endpoint",
];

/// Jump targets that are not step names
pub const NEXT_KEYWORDS: &[&str] = &["end", "continue", "break"];

fn expression() -> YType {
    atomic("Expression")
}

fn variable() -> YType {
    atomic("Variable")
}

/// Builds the Workflows dialect.
pub fn workflows_dialect() -> Result<Dialect, SchemaLoadError> {
    let steps = forward("Steps");

    let assign = sequence(map(variable(), any("Value")));
    let call = atomic("Function").with_hints(STDLIB_CONNECTORS.iter().copied());
    let next = atomic("StepName").with_hints(NEXT_KEYWORDS.iter().copied());

    let switch_condition = bean(
        "SwitchCondition",
        vec![
            prop("condition", expression())
                .required()
                .with_description("Expression selecting this branch."),
            prop("next", next.clone()),
            prop("steps", steps.clone()),
            prop("assign", assign.clone()),
            prop("return", any("Value")),
            prop("raise", any("Value")),
        ],
    )
    .require(require_at_most_one_of(&["next", "steps", "return", "raise"]));

    let for_loop = bean(
        "ForLoop",
        vec![
            prop("value", variable())
                .required()
                .with_description("Loop variable holding the current element."),
            prop("index", variable()),
            prop("in", any("List")),
            prop("range", sequence(atomic("Number"))),
            prop("steps", steps.clone()).required(),
        ],
    )
    .require(require_at_most_one_of(&["in", "range"]));

    let branch = map(
        atomic("BranchName"),
        bean("Branch", vec![prop("steps", steps.clone()).required()]),
    );
    let parallel = bean(
        "Parallel",
        vec![
            prop("shared", sequence(variable()))
                .with_description("Variables visible to all branches."),
            prop("concurrency_limit", integer("ConcurrencyLimit", Some(1), None)),
            prop(
                "exception_policy",
                EnumTypeBuilder::new("ExceptionPolicy", &["continueAll", "unhandled"])
                    .deprecate_with_replacement("unhandled", "continueAll")
                    .build(),
            ),
            prop("branches", sequence(branch)),
            prop("for", for_loop.clone()),
        ],
    )
    .require(require_at_most_one_of(&["branches", "for"]));

    let backoff = bean(
        "Backoff",
        vec![
            prop("initial_delay", atomic("Number")),
            prop("max_delay", atomic("Number")),
            prop("multiplier", atomic("Number")),
        ],
    );
    let retry_policy = bean(
        "RetryPolicy",
        vec![
            prop("predicate", expression()).required(),
            prop("max_retries", integer("MaxRetries", Some(0), None)).required(),
            prop("backoff", backoff),
        ],
    );
    let retry_expression = expression();
    let retry = {
        let policy = retry_policy.clone();
        context_aware("Retry", move |dc: &DynamicSchemaContext<'_>| {
            if let Some(node) = dc.ast_node() {
                return Some(if node.is_scalar() {
                    retry_expression.clone()
                } else {
                    policy.clone()
                });
            }
            let node = dc.structure_node()?;
            node.children()
                .any(|c| c.kind() == SNodeKind::Key)
                .then(|| policy.clone())
        })
    };

    let try_body = bean(
        "TryBody",
        vec![
            prop("steps", steps.clone()),
            prop("call", call.clone()),
            prop("args", map(variable(), any("Value"))),
            prop("result", variable()),
        ],
    );
    let except = bean(
        "Except",
        vec![
            prop("as", variable())
                .with_description("Variable receiving the error."),
            prop("steps", steps.clone()).required(),
        ],
    );

    let step = bean(
        "Step",
        vec![
            prop("assign", assign.clone())
                .with_description("Assigns values to variables."),
            prop("call", call.clone())
                .with_description("Calls a function or subworkflow."),
            prop("args", map(variable(), any("Value")))
                .with_description("Arguments passed to the called function."),
            prop("result", variable())
                .with_description("Variable receiving the call result."),
            prop("next", next)
                .with_description("Step to jump to after this one."),
            prop("switch", sequence(switch_condition))
                .with_description("Conditional jumps."),
            prop("for", for_loop).with_description("Iterates over a list or range."),
            prop("parallel", parallel)
                .with_description("Runs branches or iterations in parallel."),
            prop("try", try_body).with_description("Steps whose errors are handled."),
            prop("retry", retry).with_description("Retry policy for the try block."),
            prop("except", except).with_description("Error handler of the try block."),
            prop("raise", any("Value")).with_description("Raises an error."),
            prop("return", any("Value")).with_description("Ends the workflow."),
            prop("steps", steps.clone()).with_description("Nested steps."),
        ],
    )
    .require(require_at_most_one_of(STEP_ACTION_KEYWORDS))
    .require(call_arguments);

    let named_step = map(atomic("StepName"), step).require(single_step_name);
    steps.define(sequence(named_step))?;

    let workflow = bean(
        "Workflow",
        vec![
            prop("params", sequence(any("Param")))
                .with_description("Parameters of the workflow."),
            prop("steps", steps.clone())
                .required()
                .with_description("Steps of the workflow."),
        ],
    );
    let workflow_name = atomic("WorkflowName").with_hints(["main"]);
    let workflows = map(workflow_name, workflow);

    let root = {
        let workflows = workflows.clone();
        let steps = steps.clone();
        context_aware("WorkflowsDocument", move |dc: &DynamicSchemaContext<'_>| {
            let is_sequence = match (dc.ast_node(), dc.structure_node()) {
                (Some(node), _) => node.as_sequence().is_some(),
                (None, Some(node)) => node.children().any(|c| c.kind() == SNodeKind::Seq),
                (None, None) => false,
            };
            Some(if is_sequence {
                steps.clone()
            } else {
                workflows.clone()
            })
        })
    };

    Dialect::new("gcp-workflows", root)
        .with_file_pattern(r"\.workflows?\.ya?ml$")?
        .with_file_pattern(r"\.ya?ml\.tftpl$")
        .map(|dialect| dialect.require(main_workflow))
}

/// `args` and `result` only make sense next to `call`.
fn call_arguments(
    _: &DynamicSchemaContext<'_>,
    target: &ConstraintTarget,
) -> Result<Vec<Problem>, ConstraintError> {
    if target.found.iter().any(|f| f.name == "call") {
        return Ok(Vec::new());
    }
    Ok(target
        .found
        .iter()
        .filter(|f| f.name == "args" || f.name == "result")
        .map(|f| {
            Problem::new(
                ProblemKind::MissingRequired,
                f.region,
                format!("'{}' requires 'call'", f.name),
            )
        })
        .collect())
}

/// A step list item names exactly one step.
fn single_step_name(
    _: &DynamicSchemaContext<'_>,
    target: &ConstraintTarget,
) -> Result<Vec<Problem>, ConstraintError> {
    Ok(target
        .found
        .iter()
        .skip(1)
        .map(|f| {
            Problem::new(
                ProblemKind::MutuallyExclusive,
                f.region,
                "Step should have exactly one named key",
            )
        })
        .collect())
}

/// A workflow map needs a `main` workflow.
fn main_workflow(
    dc: &DynamicSchemaContext<'_>,
    target: &ConstraintTarget,
) -> Result<Vec<Problem>, ConstraintError> {
    let is_map = match (dc.ast_node(), dc.structure_node()) {
        (Some(node), _) => node.as_mapping().map_or(false, |m| !m.is_empty()),
        (None, Some(node)) => node.children().any(|c| c.kind() == SNodeKind::Key),
        (None, None) => false,
    };
    if !is_map || target.found.iter().any(|f| f.name == "main") {
        return Ok(Vec::new());
    }
    let region = target.found.first().map_or(target.node, |f| f.region);
    Ok(vec![Problem::new(
        ProblemKind::MissingRequired,
        region,
        "Workflow must have a 'main' block",
    )])
}
