//! Event filter: decides whether a build event warrants a notification.
//!
//! The predicate is a Jinja-style expression evaluated against a context with
//! a single `build` object (the event's camelCase JSON shape), e.g.
//!
//! ```text
//! build.status == "FAILURE" and build.substitutions.BRANCH_NAME == "main"
//! ```
//!
//! Missing attributes evaluate as undefined (falsy) rather than failing, so a
//! filter can test optional substitutions safely.
//!
//! The expression is parsed once, at setup, into an `{% if %}` template owned
//! by the filter's environment; [`EventFilter::apply`] only evaluates it.

use minijinja::{context, Environment, Value};
use tracing::warn;

use crate::{BuildEvent, SetupError};

const PREDICATE_TEMPLATE: &str = "predicate";
const ACCEPTED: &str = "1";

/// A boolean predicate over [`BuildEvent`]s, compiled at setup.
#[derive(Debug)]
pub struct EventFilter {
    env: Environment<'static>,
    /// `None` accepts every event.
    expression: Option<String>,
}

impl EventFilter {
    /// Compiles `expression`. An empty (or all-whitespace) expression accepts
    /// every event.
    pub fn compile(expression: &str) -> Result<Self, SetupError> {
        let expression = expression.trim();
        let mut env = Environment::new();
        if expression.is_empty() {
            return Ok(Self {
                env,
                expression: None,
            });
        }
        env.add_template_owned(
            PREDICATE_TEMPLATE,
            format!("{{% if {expression} %}}{ACCEPTED}{{% endif %}}"),
        )
        .map_err(SetupError::Filter)?;
        Ok(Self {
            env,
            expression: Some(expression.to_string()),
        })
    }

    /// Returns the configured expression, if any.
    pub fn expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }

    /// Evaluates the predicate. Evaluation errors reject the event.
    pub fn apply(&self, event: &BuildEvent) -> bool {
        if self.expression.is_none() {
            return true;
        }
        let evaluated = self.env.get_template(PREDICATE_TEMPLATE).and_then(|predicate| {
            predicate.render(context! { build => Value::from_serialize(event) })
        });
        match evaluated {
            Ok(output) => output == ACCEPTED,
            Err(err) => {
                warn!(build_id = %event.id, error = %err, "filter evaluation failed; treating event as rejected");
                false
            }
        }
    }
}
