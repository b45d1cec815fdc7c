//! Policy-group validation: member names and the aggregate expression.
//!
//! Installing a group whose aggregate decision is undefined or non-boolean
//! would leave the admission path with no defined verdict, so the shape of
//! the expression is checked here, at resource admission time, rather than
//! at evaluation time.

use std::collections::BTreeSet;

use crate::crd::PolicyGroup;
use crate::expression::{self, ValueType};
use crate::webhooks::policies::{ErrorList, FieldError};

/// Validate a policy group, accumulating every violation.
pub fn validate_policy_group(group: &dyn PolicyGroup) -> ErrorList {
    let mut errors = validate_policy_group_members(group);
    errors.extend(validate_policy_group_expression(group));
    errors
}

/// Validate the member set: non-empty, and every key a legal, non-reserved
/// identifier of the expression language.
pub fn validate_policy_group_members(group: &dyn PolicyGroup) -> ErrorList {
    let mut errors = ErrorList::new();
    let members = group.policy_members();

    if members.is_empty() {
        errors.push(FieldError::required(
            "spec.policies",
            "policy groups must have at least one policy member",
        ));
        return errors;
    }

    for name in members.keys() {
        if !expression::is_valid_identifier(name) || expression::is_reserved_keyword(name) {
            errors.push(FieldError::invalid(
                "spec.policies",
                name,
                "policy group member name is invalid",
            ));
        }
    }

    errors
}

/// Validate the expression: non-empty, compiles against the declared member
/// set, and statically evaluates to bool.
pub fn validate_policy_group_expression(group: &dyn PolicyGroup) -> ErrorList {
    let mut errors = ErrorList::new();
    let expression_text = group.expression();

    if expression_text.is_empty() {
        errors.push(FieldError::required("spec.expression", "must be non-empty"));
        return errors;
    }

    let declared: BTreeSet<String> = group.policy_members().keys().cloned().collect();
    match expression::compile(expression_text, &declared) {
        Ok(ValueType::Bool) => {}
        Ok(_) => errors.push(FieldError::invalid(
            "spec.expression",
            expression_text,
            "must evaluate to bool",
        )),
        Err(err) => errors.push(FieldError::invalid(
            "spec.expression",
            expression_text,
            format!("compilation failed: {err}"),
        )),
    }

    errors
}
