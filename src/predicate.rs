use serde::{Deserialize, Serialize};

use crate::types::{parse_priority, Lead, Priority};

// --- AST ---

/// Lead attribute a predicate can test.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Priority,
    Probability,
    PartnerId,
    CountryId,
    CompanyId,
    Email,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Field::Priority => "priority",
            Field::Probability => "probability",
            Field::PartnerId => "partner_id",
            Field::CountryId => "country_id",
            Field::CompanyId => "company_id",
            Field::Email => "email",
        };
        write!(f, "{}", name)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Set,
    NotSet,
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::In => "in",
            Op::NotIn => "not_in",
            Op::Set => "set",
            Op::NotSet => "not_set",
        };
        write!(f, "{}", name)
    }
}

/// Comparison value, typed per field.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Priority(Priority),
    Number(f64),
    Id(u32),
    Text(String),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Comparison {
    pub field: Field,
    pub op: Op,
    /// One value for scalar ops, any number for in/not_in, none for set/not_set.
    #[serde(default)]
    pub values: Vec<Value>,
}

/// Eligibility predicate: a conjunction/disjunction tree of attribute
/// comparisons, evaluated as a pure function of lead attributes.
/// An absent predicate (None at the call site) matches everything.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Cmp(Comparison),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
}

// --- Validation ---

fn ordered_ops_allowed(field: Field) -> bool {
    matches!(field, Field::Priority | Field::Probability)
}

fn validate_comparison(cmp: &Comparison) -> Result<(), String> {
    match cmp.op {
        Op::Set | Op::NotSet => {
            if !cmp.values.is_empty() {
                return Err(format!(
                    "Operator '{}' on field '{}' takes no value",
                    cmp.op, cmp.field
                ));
            }
            if matches!(cmp.field, Field::Priority | Field::Probability) {
                return Err(format!(
                    "Operator '{}' is not applicable to field '{}': it is always set",
                    cmp.op, cmp.field
                ));
            }
        }
        Op::In | Op::NotIn => {
            if cmp.values.is_empty() {
                return Err(format!(
                    "Operator '{}' on field '{}' requires at least one value",
                    cmp.op, cmp.field
                ));
            }
        }
        Op::Lt | Op::Le | Op::Gt | Op::Ge => {
            if !ordered_ops_allowed(cmp.field) {
                return Err(format!(
                    "Operator '{}' is not supported on field '{}'. Ordered comparisons apply to: priority, probability",
                    cmp.op, cmp.field
                ));
            }
            if cmp.values.len() != 1 {
                return Err(format!(
                    "Operator '{}' on field '{}' requires exactly one value",
                    cmp.op, cmp.field
                ));
            }
        }
        Op::Eq | Op::Ne => {
            if cmp.values.len() != 1 {
                return Err(format!(
                    "Operator '{}' on field '{}' requires exactly one value",
                    cmp.op, cmp.field
                ));
            }
        }
    }

    for value in &cmp.values {
        let ok = matches!(
            (cmp.field, value),
            (Field::Priority, Value::Priority(_))
                | (Field::Probability, Value::Number(_))
                | (Field::PartnerId, Value::Id(_))
                | (Field::CountryId, Value::Id(_))
                | (Field::CompanyId, Value::Id(_))
                | (Field::Email, Value::Text(_))
        );
        if !ok {
            return Err(format!(
                "Value {:?} has the wrong type for field '{}'",
                value, cmp.field
            ));
        }
    }

    Ok(())
}

/// Check a predicate tree for malformed comparisons. A malformed predicate
/// is a configuration error and must abort the owning team's processing,
/// never be silently ignored.
pub fn validate(pred: &Predicate) -> Result<(), String> {
    match pred {
        Predicate::Cmp(cmp) => validate_comparison(cmp),
        Predicate::All(children) | Predicate::Any(children) => {
            children.iter().try_for_each(validate)
        }
        Predicate::Not(child) => validate(child),
    }
}

// --- Evaluation ---

fn cmp_ordering<T: PartialOrd>(lhs: T, rhs: T, op: Op) -> bool {
    match op {
        Op::Eq => lhs == rhs,
        Op::Ne => lhs != rhs,
        Op::Lt => lhs < rhs,
        Op::Le => lhs <= rhs,
        Op::Gt => lhs > rhs,
        Op::Ge => lhs >= rhs,
        _ => false,
    }
}

/// Membership result for an optional id field.
///
/// Unset fields fail positive tests (eq/in) and pass negative ones (ne/not_in),
/// so "country_id != 5" matches leads with no country at all.
fn eval_optional_id(actual: Option<u32>, cmp: &Comparison) -> Result<bool, String> {
    match cmp.op {
        Op::Set => Ok(actual.is_some()),
        Op::NotSet => Ok(actual.is_none()),
        Op::Eq | Op::Ne | Op::In | Op::NotIn => {
            let targets: Vec<u32> = cmp
                .values
                .iter()
                .map(|v| match v {
                    Value::Id(id) => Ok(*id),
                    other => Err(format!(
                        "Value {:?} has the wrong type for field '{}'",
                        other, cmp.field
                    )),
                })
                .collect::<Result<_, _>>()?;
            let contained = actual.map(|id| targets.contains(&id)).unwrap_or(false);
            match cmp.op {
                Op::Eq | Op::In => Ok(contained),
                _ => Ok(!contained),
            }
        }
        op => Err(format!(
            "Operator '{}' is not supported on field '{}'",
            op, cmp.field
        )),
    }
}

fn eval_comparison(cmp: &Comparison, lead: &Lead) -> Result<bool, String> {
    validate_comparison(cmp)?;

    match cmp.field {
        Field::Priority => match cmp.op {
            Op::In | Op::NotIn => {
                let contained = cmp
                    .values
                    .iter()
                    .any(|v| matches!(v, Value::Priority(p) if *p == lead.priority));
                Ok(if cmp.op == Op::In { contained } else { !contained })
            }
            op => match cmp.values.first() {
                Some(Value::Priority(target)) => Ok(cmp_ordering(lead.priority, *target, op)),
                other => Err(format!(
                    "Value {:?} has the wrong type for field 'priority'",
                    other
                )),
            },
        },
        Field::Probability => match cmp.op {
            Op::In | Op::NotIn => {
                let contained = cmp
                    .values
                    .iter()
                    .any(|v| matches!(v, Value::Number(n) if *n == lead.probability));
                Ok(if cmp.op == Op::In { contained } else { !contained })
            }
            op => match cmp.values.first() {
                Some(Value::Number(target)) => Ok(cmp_ordering(lead.probability, *target, op)),
                other => Err(format!(
                    "Value {:?} has the wrong type for field 'probability'",
                    other
                )),
            },
        },
        Field::PartnerId => eval_optional_id(lead.partner_id, cmp),
        Field::CountryId => eval_optional_id(lead.country_id, cmp),
        Field::CompanyId => eval_optional_id(lead.company_id, cmp),
        Field::Email => {
            let actual = lead.normalized_email();
            match cmp.op {
                Op::Set => Ok(actual.is_some()),
                Op::NotSet => Ok(actual.is_none()),
                Op::Eq | Op::Ne | Op::In | Op::NotIn => {
                    let contained = match &actual {
                        Some(email) => cmp.values.iter().any(|v| {
                            matches!(v, Value::Text(t) if t.trim().to_lowercase() == *email)
                        }),
                        None => false,
                    };
                    match cmp.op {
                        Op::Eq | Op::In => Ok(contained),
                        _ => Ok(!contained),
                    }
                }
                op => Err(format!(
                    "Operator '{}' is not supported on field 'email'",
                    op
                )),
            }
        }
    }
}

/// Evaluate a predicate against a lead. Pure: no external calls, no
/// mutation. Malformed predicates return `Err` with a description.
pub fn matches(pred: &Predicate, lead: &Lead) -> Result<bool, String> {
    match pred {
        Predicate::Cmp(cmp) => eval_comparison(cmp, lead),
        Predicate::All(children) => {
            for child in children {
                if !matches(child, lead)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Any(children) => {
            for child in children {
                if matches(child, lead)? {
                    return Ok(true);
                }
            }
            // An empty Any is vacuously false only if it has children to
            // disagree with; treat empty as match-all like an absent predicate
            Ok(children.is_empty())
        }
        Predicate::Not(child) => Ok(!matches(child, lead)?),
    }
}

/// Effective eligibility of a lead for a member: team predicate AND member
/// predicate, either side optional (absent = always true).
pub fn eligible(
    lead: &Lead,
    team_domain: Option<&Predicate>,
    member_domain: Option<&Predicate>,
) -> Result<bool, String> {
    if let Some(pred) = team_domain {
        if !matches(pred, lead)? {
            return Ok(false);
        }
    }
    if let Some(pred) = member_domain {
        if !matches(pred, lead)? {
            return Ok(false);
        }
    }
    Ok(true)
}

// --- Text parser ---

fn parse_field(token: &str) -> Result<Field, String> {
    match token.to_lowercase().as_str() {
        "priority" => Ok(Field::Priority),
        "probability" => Ok(Field::Probability),
        "partner_id" => Ok(Field::PartnerId),
        "country_id" => Ok(Field::CountryId),
        "company_id" => Ok(Field::CompanyId),
        "email" => Ok(Field::Email),
        _ => Err(format!(
            "Unknown predicate field: {}. Supported: priority, probability, partner_id, country_id, company_id, email",
            token
        )),
    }
}

fn parse_op(token: &str) -> Result<Op, String> {
    match token.to_lowercase().as_str() {
        "=" | "==" => Ok(Op::Eq),
        "!=" => Ok(Op::Ne),
        "<" => Ok(Op::Lt),
        "<=" => Ok(Op::Le),
        ">" => Ok(Op::Gt),
        ">=" => Ok(Op::Ge),
        "in" => Ok(Op::In),
        "not_in" => Ok(Op::NotIn),
        "set" => Ok(Op::Set),
        "not_set" => Ok(Op::NotSet),
        _ => Err(format!(
            "Unknown predicate operator: {}. Supported: =, !=, <, <=, >, >=, in, not_in, set, not_set",
            token
        )),
    }
}

fn parse_value(field: Field, token: &str) -> Result<Value, String> {
    match field {
        Field::Priority => {
            let priority = parse_priority(token).map_err(|_| {
                format!(
                    "Invalid value '{}' for field 'priority'. Valid values: low, medium, high, urgent",
                    token
                )
            })?;
            Ok(Value::Priority(priority))
        }
        Field::Probability => {
            let number: f64 = token.parse().map_err(|_| {
                format!(
                    "Invalid value '{}' for field 'probability'. Expected a number",
                    token
                )
            })?;
            Ok(Value::Number(number))
        }
        Field::PartnerId | Field::CountryId | Field::CompanyId => {
            let id: u32 = token.parse().map_err(|_| {
                format!(
                    "Invalid value '{}' for field '{}'. Expected a numeric id",
                    token, field
                )
            })?;
            Ok(Value::Id(id))
        }
        Field::Email => Ok(Value::Text(token.to_string())),
    }
}

/// Parse a single clause like `probability >= 10`, `priority in high,urgent`
/// or `country_id set`.
fn parse_clause(raw: &str) -> Result<Comparison, String> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();

    match tokens.as_slice() {
        [field_str, op_str] => {
            let field = parse_field(field_str)?;
            let op = parse_op(op_str)?;
            if !matches!(op, Op::Set | Op::NotSet) {
                return Err(format!(
                    "Predicate clause '{}' is missing a value (format: FIELD OP VALUE)",
                    raw
                ));
            }
            let cmp = Comparison {
                field,
                op,
                values: vec![],
            };
            validate_comparison(&cmp)?;
            Ok(cmp)
        }
        [field_str, op_str, value_str] => {
            let field = parse_field(field_str)?;
            let op = parse_op(op_str)?;
            let values: Vec<Value> = value_str
                .split(',')
                .map(|token| {
                    let trimmed = token.trim();
                    if trimmed.is_empty() {
                        return Err(format!(
                            "Empty value in comma-separated list for field '{}'",
                            field
                        ));
                    }
                    parse_value(field, trimmed)
                })
                .collect::<Result<_, _>>()?;
            if !matches!(op, Op::In | Op::NotIn) && values.len() != 1 {
                return Err(format!(
                    "Operator '{}' on field '{}' requires exactly one value",
                    op, field
                ));
            }
            let cmp = Comparison { field, op, values };
            validate_comparison(&cmp)?;
            Ok(cmp)
        }
        _ => Err(format!(
            "Predicate clause must be in format FIELD OP [VALUE], got: {}",
            raw
        )),
    }
}

/// Parse a predicate string: clauses joined by `and`, e.g.
/// `probability >= 10 and country_id set`. Empty input is an error; use
/// `None` upstream for match-everything.
pub fn parse_predicate(raw: &str) -> Result<Predicate, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("Predicate string is empty".to_string());
    }

    let clauses: Vec<Comparison> = raw
        .split(" and ")
        .map(parse_clause)
        .collect::<Result<_, _>>()?;

    if clauses.len() == 1 {
        Ok(Predicate::Cmp(clauses.into_iter().next().expect("len 1")))
    } else {
        Ok(Predicate::All(
            clauses.into_iter().map(Predicate::Cmp).collect(),
        ))
    }
}
