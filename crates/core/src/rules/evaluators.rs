use rust_decimal::Decimal;

use crate::domain::workflow::{ApprovalRule, CumulativePeriod, VarianceBaseField};

use super::{EvaluationContext, RuleEvaluation};

pub(super) fn evaluate_threshold(
    rule: &ApprovalRule,
    ctx: &EvaluationContext,
) -> RuleEvaluation {
    let amount = ctx.request.amount;
    let min = rule.min_amount.unwrap_or(Decimal::ZERO);

    let within_band = amount >= min && rule.max_amount.map_or(true, |max| amount <= max);
    if within_band {
        let upper = rule
            .max_amount
            .map_or_else(|| "no upper bound".to_string(), |max| max.to_string());
        RuleEvaluation::triggered(
            rule,
            format!("amount {amount} falls within threshold band {min} to {upper}"),
        )
    } else {
        RuleEvaluation::not_triggered(rule, format!("amount {amount} outside threshold band"))
    }
}

pub(super) fn evaluate_cumulative(
    rule: &ApprovalRule,
    ctx: &EvaluationContext,
) -> RuleEvaluation {
    // Missing period or limit means a misconfigured rule, not an error.
    let (Some(period), Some(limit)) = (rule.cumulative_period, rule.cumulative_limit) else {
        return RuleEvaluation::not_triggered(rule, "cumulative rule missing period or limit");
    };

    let period_total = match period {
        CumulativePeriod::Daily => ctx.cumulative.daily,
        CumulativePeriod::Weekly => ctx.cumulative.weekly,
        CumulativePeriod::Monthly => ctx.cumulative.monthly,
    };
    let projected = period_total + ctx.request.amount;

    if projected > limit {
        RuleEvaluation::triggered(
            rule,
            format!(
                "projected {period:?} spend {projected} exceeds cumulative limit {limit} \
                 (prior total {period_total})"
            ),
        )
    } else {
        RuleEvaluation::not_triggered(
            rule,
            format!("projected {period:?} spend {projected} within cumulative limit {limit}"),
        )
    }
}

pub(super) fn evaluate_variance(rule: &ApprovalRule, ctx: &EvaluationContext) -> RuleEvaluation {
    let (Some(base_field), Some(tolerance)) = (rule.variance_base_field, rule.variance_pct)
    else {
        return RuleEvaluation::not_triggered(rule, "variance rule missing base field or tolerance");
    };

    let base = match base_field {
        VarianceBaseField::PoAmount => ctx.request.po_amount,
        VarianceBaseField::QuoteAmount => ctx.request.quote_amount,
    };
    let Some(base) = base.filter(|base| !base.is_zero()) else {
        return RuleEvaluation::not_triggered(rule, "variance base amount absent or zero");
    };

    // Amounts at or below the base never trigger.
    let variance = (ctx.request.amount - base) / base;
    if variance > tolerance {
        RuleEvaluation::triggered(
            rule,
            format!("variance {variance} over base {base} exceeds tolerance {tolerance}"),
        )
    } else {
        RuleEvaluation::not_triggered(
            rule,
            format!("variance {variance} within tolerance {tolerance}"),
        )
    }
}

pub(super) fn evaluate_vendor(rule: &ApprovalRule, ctx: &EvaluationContext) -> RuleEvaluation {
    let Some(vendor) = &ctx.vendor else {
        return RuleEvaluation::not_triggered(rule, "request has no vendor");
    };

    let new_vendor_hit = rule.vendor_is_new && vendor.is_new;
    let risk_hit = rule.vendor_risk_ratings.contains(&vendor.risk_rating);

    if new_vendor_hit || risk_hit {
        let mut reasons = Vec::new();
        if new_vendor_hit {
            reasons.push(format!("vendor `{}` is new", vendor.name));
        }
        if risk_hit {
            reasons.push(format!(
                "vendor `{}` risk rating {:?} is flagged",
                vendor.name, vendor.risk_rating
            ));
        }
        RuleEvaluation::triggered(rule, reasons.join("; "))
    } else {
        RuleEvaluation::not_triggered(rule, "vendor not new and risk rating not flagged")
    }
}

pub(super) fn evaluate_category(rule: &ApprovalRule, ctx: &EvaluationContext) -> RuleEvaluation {
    let matched = match (&rule.category_id, &ctx.category) {
        (Some(rule_category), Some(category)) => *rule_category == category.id,
        _ => false,
    };
    if !matched {
        return RuleEvaluation::not_triggered(rule, "request category does not match rule");
    }

    let category = ctx.category.as_ref().expect("matched category present");
    let evaluation = RuleEvaluation::triggered(
        rule,
        format!("request categorized as `{}`", category.name),
    );

    // Without an explicit approver on the rule, the category's own default
    // approver becomes the effective specific approver.
    match (&rule.specific_approver_id, &category.default_approver_id) {
        (None, Some(default_approver)) => {
            evaluation.with_specific_approver(default_approver.clone())
        }
        _ => evaluation,
    }
}

pub(super) fn evaluate_project(rule: &ApprovalRule, ctx: &EvaluationContext) -> RuleEvaluation {
    let matched = match (&rule.project_id, &ctx.project) {
        (Some(rule_project), Some(project)) => *rule_project == project.id,
        _ => false,
    };
    if !matched {
        return RuleEvaluation::not_triggered(rule, "request project does not match rule");
    }

    let project = ctx.project.as_ref().expect("matched project present");
    let evaluation = RuleEvaluation::triggered(
        rule,
        format!("request charged to project `{}`", project.name),
    );

    match (&rule.specific_approver_id, &project.project_manager_id) {
        (None, Some(manager)) => evaluation.with_specific_approver(manager.clone()),
        _ => evaluation,
    }
}

pub(super) fn evaluate_compliance(
    rule: &ApprovalRule,
    ctx: &EvaluationContext,
) -> RuleEvaluation {
    let mut reasons = Vec::new();

    if rule.requires_compliance_review {
        if let Some(vendor) = &ctx.vendor {
            if vendor.requires_compliance_review {
                reasons.push(format!("vendor `{}` requires compliance review", vendor.name));
            }
        }
    }

    if let Some(country) = ctx.vendor.as_ref().and_then(|vendor| vendor.country.as_deref()) {
        let flagged = ctx
            .policy
            .high_risk_countries
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(country));
        if flagged {
            reasons.push(format!("vendor country `{country}` is high risk"));
        }
    }

    if rule.requires_legal_review && ctx.request.amount >= ctx.policy.legal_review_threshold {
        reasons.push(format!(
            "amount {} meets legal review threshold {}",
            ctx.request.amount, ctx.policy.legal_review_threshold
        ));
    }

    if reasons.is_empty() {
        RuleEvaluation::not_triggered(rule, "no compliance condition met")
    } else {
        RuleEvaluation::triggered(rule, reasons.join("; "))
    }
}

/// Policy-declaration rule: it surfaces a requirement entry and signals that
/// self-approval enforcement is active for the workflow. No data check.
pub(super) fn evaluate_sod(rule: &ApprovalRule, _ctx: &EvaluationContext) -> RuleEvaluation {
    if rule.prevent_self_approval || rule.prevent_creator_approval {
        RuleEvaluation::triggered(rule, "segregation-of-duties policy declared")
    } else {
        RuleEvaluation::not_triggered(rule, "no segregation-of-duties flags set")
    }
}

pub(super) fn evaluate_auto_approve(
    rule: &ApprovalRule,
    ctx: &EvaluationContext,
) -> RuleEvaluation {
    let Some(vendor) = &ctx.vendor else {
        return RuleEvaluation::not_triggered(rule, "request has no vendor");
    };

    let low_risk_established = vendor.risk_rating == crate::domain::reference::RiskRating::Low
        && !vendor.is_new;
    let within_ceiling = rule.max_amount.is_some_and(|max| ctx.request.amount <= max);

    if low_risk_established && within_ceiling {
        RuleEvaluation::triggered(
            rule,
            format!(
                "low-risk established vendor `{}` and amount {} within auto-approve ceiling",
                vendor.name, ctx.request.amount
            ),
        )
    } else {
        RuleEvaluation::not_triggered(rule, "auto-approve conditions not met")
    }
}
