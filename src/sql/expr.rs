//   Copyright (c) 2024-2026 Anton Kundenko <singaraiona@gmail.com>
//   All rights reserved.
//
//   Permission is hereby granted, free of charge, to any person obtaining a copy
//   of this software and associated documentation files (the "Software"), to deal
//   in the Software without restriction, including without limitation the rights
//   to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
//   copies of the Software, and to permit persons to whom the Software is
//   furnished to do so, subject to the following conditions:
//
//   The above copyright notice and this permission notice shall be included in all
//   copies or substantial portions of the Software.
//
//   THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
//   IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//   FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//   AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//   LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
//   OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
//   SOFTWARE.


// Expression tree walker: translates sqlparser AST expressions into typed
// scalar trees evaluated once per row.

use std::cmp::Ordering;
use std::collections::HashMap;

use sqlparser::ast::{
    BinaryOperator, CastKind, DataType, Expr, Function, FunctionArg, FunctionArgExpr,
    FunctionArguments, UnaryOperator, Value as SqlValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

use crate::error::{Error, Result};
use crate::func::Row;
use crate::graph::Schema;
use crate::store::{DType, Value};

use super::ExprError;

fn plan_err(msg: String) -> Error {
    Error::Expr(ExprError::Plan(msg))
}

pub(crate) fn mismatch(expected: DType, found: &Value) -> Error {
    Error::TypeMismatch {
        column: "<expr>".into(),
        expected,
        found: found.dtype(),
    }
}

/// Parse a single SQL expression; trailing tokens are an error.
pub fn parse(sql: &str) -> std::result::Result<Expr, ExprError> {
    let dialect = GenericDialect {};
    let mut parser = Parser::new(&dialect)
        .try_with_sql(sql)
        .map_err(|e| ExprError::Parse(e.to_string()))?;
    let expr = parser
        .parse_expr()
        .map_err(|e| ExprError::Parse(e.to_string()))?;
    let next = parser.peek_token();
    if next.token != Token::EOF {
        return Err(ExprError::Parse(format!(
            "unexpected '{}' after expression",
            next.token
        )));
    }
    Ok(expr)
}

// ---------------------------------------------------------------------------
// Scalar tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// How a comparison reads its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpKind {
    Int,
    Float,
    Str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Func {
    Abs,
    Sqrt,
    Exp,
    Log,
    Pow,
    Floor,
    Ceil,
    Len,
    First,
    At,
    ArraySum,
    ArrayMax,
    ArrayMin,
}

#[derive(Debug, Clone)]
pub(crate) enum Scalar {
    /// Bound input column, by position in the row.
    Input(usize),
    Const(Value),
    Neg(Box<Scalar>, bool),
    Not(Box<Scalar>),
    And(Box<Scalar>, Box<Scalar>),
    Or(Box<Scalar>, Box<Scalar>),
    Arith {
        op: ArithOp,
        int: bool,
        l: Box<Scalar>,
        r: Box<Scalar>,
    },
    Cmp {
        op: CmpOp,
        kind: CmpKind,
        l: Box<Scalar>,
        r: Box<Scalar>,
    },
    Case {
        branches: Vec<(Scalar, Scalar)>,
        otherwise: Box<Scalar>,
    },
    Cast(Box<Scalar>, DType),
    Call(Func, Vec<Scalar>),
}

/// A type-checked expression with the input columns it reads.
#[derive(Debug)]
pub(crate) struct CompiledExpr {
    pub scalar: Scalar,
    pub dtype: DType,
    /// Referenced columns, in first-use order. `Scalar::Input(i)` reads
    /// `inputs[i]`.
    pub inputs: Vec<String>,
}

impl CompiledExpr {
    pub(crate) fn compile(sql: &str, schema: &Schema) -> Result<Self> {
        let ast = parse(sql)?;
        let mut planner = Planner {
            schema,
            inputs: Vec::new(),
            slots: HashMap::new(),
        };
        let (scalar, dtype) = planner.plan(&ast)?;
        Ok(CompiledExpr {
            scalar,
            dtype,
            inputs: planner.inputs,
        })
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

struct Planner<'a> {
    schema: &'a Schema,
    inputs: Vec<String>,
    slots: HashMap<String, usize>,
}

fn is_int(t: DType) -> bool {
    matches!(t, DType::Bool | DType::I64)
}

fn cmp_kind(l: DType, r: DType) -> Option<CmpKind> {
    if l == DType::Str && r == DType::Str {
        Some(CmpKind::Str)
    } else if is_int(l) && is_int(r) {
        Some(CmpKind::Int)
    } else if l.is_numeric() && r.is_numeric() {
        Some(CmpKind::Float)
    } else {
        None
    }
}

impl Planner<'_> {
    fn input(&mut self, name: &str) -> Result<(Scalar, DType)> {
        let dtype = self.schema.resolve(name)?.dtype;
        let slot = match self.slots.get(name) {
            Some(&slot) => slot,
            None => {
                let slot = self.inputs.len();
                self.inputs.push(name.to_string());
                self.slots.insert(name.to_string(), slot);
                slot
            }
        };
        Ok((Scalar::Input(slot), dtype))
    }

    fn plan_bool(&mut self, expr: &Expr) -> Result<Scalar> {
        let (s, t) = self.plan(expr)?;
        if t != DType::Bool {
            return Err(plan_err(format!("expected BOOLEAN operand, '{expr}' is {t}")));
        }
        Ok(s)
    }

    fn plan_numeric(&mut self, expr: &Expr) -> Result<(Scalar, DType)> {
        let (s, t) = self.plan(expr)?;
        if !t.is_numeric() {
            return Err(plan_err(format!("expected numeric operand, '{expr}' is {t}")));
        }
        Ok((s, t))
    }

    fn plan_array(&mut self, expr: &Expr) -> Result<Scalar> {
        let (s, t) = self.plan(expr)?;
        if t != DType::F64Array {
            return Err(plan_err(format!("expected DOUBLE[] operand, '{expr}' is {t}")));
        }
        Ok(s)
    }

    fn compare(&mut self, op: CmpOp, left: &Expr, right: &Expr) -> Result<Scalar> {
        let (l, lt) = self.plan(left)?;
        let (r, rt) = self.plan(right)?;
        let kind = cmp_kind(lt, rt)
            .ok_or_else(|| plan_err(format!("cannot compare {lt} with {rt}")))?;
        Ok(Scalar::Cmp {
            op,
            kind,
            l: Box::new(l),
            r: Box::new(r),
        })
    }

    fn plan(&mut self, expr: &Expr) -> Result<(Scalar, DType)> {
        match expr {
            Expr::Identifier(ident) => self.input(&ident.value),

            Expr::Value(val) => match val {
                SqlValue::Number(n, _) => {
                    if let Ok(i) = n.parse::<i64>() {
                        Ok((Scalar::Const(Value::I64(i)), DType::I64))
                    } else {
                        let f = n
                            .parse::<f64>()
                            .map_err(|_| plan_err(format!("invalid number literal: {n}")))?;
                        Ok((Scalar::Const(Value::F64(f)), DType::F64))
                    }
                }
                SqlValue::SingleQuotedString(s) => Ok((Scalar::Const(Value::from(s.as_str())), DType::Str)),
                SqlValue::Boolean(b) => Ok((Scalar::Const(Value::Bool(*b)), DType::Bool)),
                _ => Err(plan_err(format!("unsupported literal: {val}"))),
            },

            Expr::BinaryOp { left, op, right } => {
                let arith = match op {
                    BinaryOperator::Plus => Some(ArithOp::Add),
                    BinaryOperator::Minus => Some(ArithOp::Sub),
                    BinaryOperator::Multiply => Some(ArithOp::Mul),
                    BinaryOperator::Divide => Some(ArithOp::Div),
                    BinaryOperator::Modulo => Some(ArithOp::Mod),
                    _ => None,
                };
                if let Some(op) = arith {
                    let (l, lt) = self.plan_numeric(left)?;
                    let (r, rt) = self.plan_numeric(right)?;
                    let int = is_int(lt) && is_int(rt) && op != ArithOp::Div;
                    let dtype = if int { DType::I64 } else { DType::F64 };
                    return Ok((
                        Scalar::Arith {
                            op,
                            int,
                            l: Box::new(l),
                            r: Box::new(r),
                        },
                        dtype,
                    ));
                }
                let cmp = match op {
                    BinaryOperator::Eq => CmpOp::Eq,
                    BinaryOperator::NotEq => CmpOp::Ne,
                    BinaryOperator::Lt => CmpOp::Lt,
                    BinaryOperator::LtEq => CmpOp::Le,
                    BinaryOperator::Gt => CmpOp::Gt,
                    BinaryOperator::GtEq => CmpOp::Ge,
                    BinaryOperator::And => {
                        let l = self.plan_bool(left)?;
                        let r = self.plan_bool(right)?;
                        return Ok((Scalar::And(Box::new(l), Box::new(r)), DType::Bool));
                    }
                    BinaryOperator::Or => {
                        let l = self.plan_bool(left)?;
                        let r = self.plan_bool(right)?;
                        return Ok((Scalar::Or(Box::new(l), Box::new(r)), DType::Bool));
                    }
                    _ => return Err(plan_err(format!("unsupported operator: {op}"))),
                };
                Ok((self.compare(cmp, left, right)?, DType::Bool))
            }

            Expr::UnaryOp { op, expr: inner } => match op {
                UnaryOperator::Not => Ok((Scalar::Not(Box::new(self.plan_bool(inner)?)), DType::Bool)),
                UnaryOperator::Minus => {
                    let (e, t) = self.plan_numeric(inner)?;
                    let int = is_int(t);
                    let dtype = if int { DType::I64 } else { DType::F64 };
                    Ok((Scalar::Neg(Box::new(e), int), dtype))
                }
                UnaryOperator::Plus => self.plan_numeric(inner),
                _ => Err(plan_err(format!("unsupported unary operator: {op}"))),
            },

            Expr::Nested(inner) => self.plan(inner),

            // x BETWEEN a AND b  ->  x >= a AND x <= b
            Expr::Between {
                expr: inner,
                negated,
                low,
                high,
            } => {
                let ge = self.compare(CmpOp::Ge, inner, low)?;
                let le = self.compare(CmpOp::Le, inner, high)?;
                let result = Scalar::And(Box::new(ge), Box::new(le));
                Ok((negate_if(result, *negated), DType::Bool))
            }

            // x IN (a, b)  ->  x = a OR x = b
            Expr::InList {
                expr: inner,
                list,
                negated,
            } => {
                let mut result: Option<Scalar> = None;
                for item in list {
                    let eq = self.compare(CmpOp::Eq, inner, item)?;
                    result = Some(match result {
                        Some(acc) => Scalar::Or(Box::new(acc), Box::new(eq)),
                        None => eq,
                    });
                }
                let result = result.unwrap_or(Scalar::Const(Value::Bool(false)));
                Ok((negate_if(result, *negated), DType::Bool))
            }

            Expr::Cast {
                expr: inner,
                data_type,
                kind,
                ..
            } => {
                if *kind == CastKind::TryCast || *kind == CastKind::SafeCast {
                    return Err(plan_err("TRY_CAST is not supported".into()));
                }
                let target = map_sql_type(data_type)?;
                let (e, _) = self.plan_numeric(inner)?;
                Ok((Scalar::Cast(Box::new(e), target), target))
            }

            Expr::Case {
                operand,
                conditions,
                results,
                else_result,
            } => {
                let Some(else_result) = else_result else {
                    return Err(plan_err("CASE without ELSE is not supported".into()));
                };
                let mut branches = Vec::with_capacity(conditions.len());
                let mut typed = Vec::with_capacity(results.len() + 1);
                for (cond, then) in conditions.iter().zip(results.iter()) {
                    let c = match operand {
                        Some(op) => self.compare(CmpOp::Eq, op, cond)?,
                        None => self.plan_bool(cond)?,
                    };
                    branches.push(c);
                    typed.push(self.plan(then)?);
                }
                typed.push(self.plan(else_result)?);
                let dtype = unify(&typed)?;
                let mut values: Vec<Scalar> = typed
                    .into_iter()
                    .map(|(s, t)| if t == dtype { s } else { Scalar::Cast(Box::new(s), dtype) })
                    .collect();
                let otherwise = values.pop().unwrap_or(Scalar::Const(Value::Bool(false)));
                Ok((
                    Scalar::Case {
                        branches: branches.into_iter().zip(values).collect(),
                        otherwise: Box::new(otherwise),
                    },
                    dtype,
                ))
            }

            // sqlparser parses CEIL/FLOOR as dedicated Expr variants
            Expr::Ceil { expr, .. } => {
                let (a, _) = self.plan_numeric(expr)?;
                Ok((Scalar::Call(Func::Ceil, vec![a]), DType::F64))
            }
            Expr::Floor { expr, .. } => {
                let (a, _) = self.plan_numeric(expr)?;
                Ok((Scalar::Call(Func::Floor, vec![a]), DType::F64))
            }

            Expr::Function(f) => self.plan_function(f),

            _ => Err(plan_err(format!("unsupported expression: {expr}"))),
        }
    }

    fn plan_function(&mut self, func: &Function) -> Result<(Scalar, DType)> {
        let name = func.name.to_string().to_lowercase();
        let args = extract_func_args(func)?;
        let arity = |n: usize| -> Result<()> {
            if args.len() == n {
                Ok(())
            } else {
                Err(plan_err(format!("{name}() takes {n} argument(s), got {}", args.len())))
            }
        };
        let math = |f: Func| (f, DType::F64);
        let (f, dtype) = match name.as_str() {
            "abs" => {
                arity(1)?;
                let (a, t) = self.plan_numeric(&args[0])?;
                let dtype = if is_int(t) { DType::I64 } else { DType::F64 };
                return Ok((Scalar::Call(Func::Abs, vec![a]), dtype));
            }
            "sqrt" => math(Func::Sqrt),
            "exp" => math(Func::Exp),
            "log" | "ln" => math(Func::Log),
            "floor" => math(Func::Floor),
            "ceil" => math(Func::Ceil),
            "pow" | "power" => {
                arity(2)?;
                let (a, _) = self.plan_numeric(&args[0])?;
                let (b, _) = self.plan_numeric(&args[1])?;
                return Ok((Scalar::Call(Func::Pow, vec![a, b]), DType::F64));
            }
            "len" => {
                arity(1)?;
                let a = self.plan_array(&args[0])?;
                return Ok((Scalar::Call(Func::Len, vec![a]), DType::I64));
            }
            "at" => {
                arity(2)?;
                let a = self.plan_array(&args[0])?;
                let (i, t) = self.plan_numeric(&args[1])?;
                if !is_int(t) {
                    return Err(plan_err(format!("at() index must be BIGINT, got {t}")));
                }
                return Ok((Scalar::Call(Func::At, vec![a, i]), DType::F64));
            }
            "first" | "sum" | "max" | "min" => {
                arity(1)?;
                let a = self.plan_array(&args[0])?;
                let f = match name.as_str() {
                    "first" => Func::First,
                    "sum" => Func::ArraySum,
                    "max" => Func::ArrayMax,
                    _ => Func::ArrayMin,
                };
                return Ok((Scalar::Call(f, vec![a]), DType::F64));
            }
            _ => return Err(plan_err(format!("unknown function '{name}'"))),
        };
        arity(1)?;
        let (a, _) = self.plan_numeric(&args[0])?;
        Ok((Scalar::Call(f, vec![a]), dtype))
    }
}

fn negate_if(s: Scalar, negated: bool) -> Scalar {
    if negated {
        Scalar::Not(Box::new(s))
    } else {
        s
    }
}

/// Common type of CASE results: identical types, or DOUBLE for a numeric
/// mix.
fn unify(typed: &[(Scalar, DType)]) -> Result<DType> {
    let first = typed.first().map(|(_, t)| *t).unwrap_or(DType::Bool);
    if typed.iter().all(|(_, t)| *t == first) {
        return Ok(first);
    }
    if typed.iter().all(|(_, t)| t.is_numeric()) {
        return Ok(DType::F64);
    }
    let types: Vec<String> = typed.iter().map(|(_, t)| t.to_string()).collect();
    Err(plan_err(format!("CASE results have incompatible types: {}", types.join(", "))))
}

fn map_sql_type(dt: &DataType) -> Result<DType> {
    match dt {
        DataType::Boolean | DataType::Bool => Ok(DType::Bool),
        DataType::Int(_)
        | DataType::Integer(_)
        | DataType::BigInt(_)
        | DataType::Int8(_)
        | DataType::Int64 => Ok(DType::I64),
        DataType::Float(_)
        | DataType::Float64
        | DataType::Double
        | DataType::DoublePrecision
        | DataType::Real => Ok(DType::F64),
        _ => Err(plan_err(format!("unsupported CAST target type: {dt}"))),
    }
}

fn extract_func_args(func: &Function) -> Result<Vec<Expr>> {
    match &func.args {
        FunctionArguments::List(arg_list) => {
            let mut exprs = Vec::new();
            for arg in &arg_list.args {
                match arg {
                    FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => exprs.push(e.clone()),
                    _ => {
                        return Err(plan_err(format!(
                            "unsupported argument syntax in {}()",
                            func.name
                        )))
                    }
                }
            }
            Ok(exprs)
        }
        FunctionArguments::None => Ok(Vec::new()),
        _ => Err(plan_err(format!(
            "unsupported argument syntax for '{}'",
            func.name
        ))),
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn f64_of(v: &Value) -> Result<f64> {
    v.as_f64().ok_or_else(|| mismatch(DType::F64, v))
}

fn i64_of(v: &Value) -> Result<i64> {
    v.as_i64().ok_or_else(|| mismatch(DType::I64, v))
}

fn bool_of(v: &Value) -> Result<bool> {
    v.as_bool().ok_or_else(|| mismatch(DType::Bool, v))
}

fn array_of(v: &Value) -> Result<&[f64]> {
    v.as_array().ok_or_else(|| mismatch(DType::F64Array, v))
}

fn test(op: CmpOp, ord: Option<Ordering>) -> bool {
    match (op, ord) {
        (CmpOp::Ne, None) => true,
        (_, None) => false,
        (CmpOp::Eq, Some(o)) => o == Ordering::Equal,
        (CmpOp::Ne, Some(o)) => o != Ordering::Equal,
        (CmpOp::Lt, Some(o)) => o == Ordering::Less,
        (CmpOp::Le, Some(o)) => o != Ordering::Greater,
        (CmpOp::Gt, Some(o)) => o == Ordering::Greater,
        (CmpOp::Ge, Some(o)) => o != Ordering::Less,
    }
}

impl Scalar {
    pub(crate) fn eval(&self, row: &Row<'_>) -> Result<Value> {
        match self {
            Scalar::Input(i) => Ok(row.value(*i)?.clone()),
            Scalar::Const(v) => Ok(v.clone()),
            Scalar::Neg(e, int) => {
                let v = e.eval(row)?;
                Ok(if *int {
                    Value::I64(i64_of(&v)?.wrapping_neg())
                } else {
                    Value::F64(-f64_of(&v)?)
                })
            }
            Scalar::Not(e) => Ok(Value::Bool(!bool_of(&e.eval(row)?)?)),
            Scalar::And(l, r) => {
                Ok(Value::Bool(bool_of(&l.eval(row)?)? && bool_of(&r.eval(row)?)?))
            }
            Scalar::Or(l, r) => {
                Ok(Value::Bool(bool_of(&l.eval(row)?)? || bool_of(&r.eval(row)?)?))
            }
            Scalar::Arith { op, int, l, r } => {
                let (a, b) = (l.eval(row)?, r.eval(row)?);
                if *int {
                    let (a, b) = (i64_of(&a)?, i64_of(&b)?);
                    let v = match op {
                        ArithOp::Add => a.wrapping_add(b),
                        ArithOp::Sub => a.wrapping_sub(b),
                        ArithOp::Mul => a.wrapping_mul(b),
                        ArithOp::Mod => {
                            if b == 0 {
                                return Err(Error::callback("integer modulo by zero"));
                            }
                            a.wrapping_rem(b)
                        }
                        ArithOp::Div => a.checked_div(b).ok_or_else(|| Error::callback("integer division by zero"))?,
                    };
                    Ok(Value::I64(v))
                } else {
                    let (a, b) = (f64_of(&a)?, f64_of(&b)?);
                    Ok(Value::F64(match op {
                        ArithOp::Add => a + b,
                        ArithOp::Sub => a - b,
                        ArithOp::Mul => a * b,
                        ArithOp::Div => a / b,
                        ArithOp::Mod => a % b,
                    }))
                }
            }
            Scalar::Cmp { op, kind, l, r } => {
                let (a, b) = (l.eval(row)?, r.eval(row)?);
                let ord = match kind {
                    CmpKind::Int => Some(i64_of(&a)?.cmp(&i64_of(&b)?)),
                    CmpKind::Float => f64_of(&a)?.partial_cmp(&f64_of(&b)?),
                    CmpKind::Str => {
                        let sa = a.as_str().ok_or_else(|| mismatch(DType::Str, &a))?;
                        let sb = b.as_str().ok_or_else(|| mismatch(DType::Str, &b))?;
                        Some(sa.cmp(sb))
                    }
                };
                Ok(Value::Bool(test(*op, ord)))
            }
            Scalar::Case {
                branches,
                otherwise,
            } => {
                for (cond, then) in branches {
                    if bool_of(&cond.eval(row)?)? {
                        return then.eval(row);
                    }
                }
                otherwise.eval(row)
            }
            Scalar::Cast(e, target) => {
                let v = e.eval(row)?;
                Ok(match target {
                    DType::F64 => Value::F64(f64_of(&v)?),
                    DType::I64 => match v {
                        Value::F64(x) => Value::I64(x as i64),
                        other => Value::I64(i64_of(&other)?),
                    },
                    DType::Bool => Value::Bool(f64_of(&v)? != 0.0),
                    DType::Str | DType::F64Array => return Err(mismatch(*target, &v)),
                })
            }
            Scalar::Call(f, args) => {
                let vals = args
                    .iter()
                    .map(|a| a.eval(row))
                    .collect::<Result<Vec<_>>>()?;
                call(*f, &vals)
            }
        }
    }
}

fn call(f: Func, args: &[Value]) -> Result<Value> {
    let arg = |i: usize| -> Result<&Value> {
        args.get(i)
            .ok_or_else(|| Error::InvalidArgument(format!("{f:?} is missing argument {i}")))
    };
    let unary = |g: fn(f64) -> f64| -> Result<Value> { Ok(Value::F64(g(f64_of(arg(0)?)?))) };
    match f {
        Func::Abs => match arg(0)? {
            Value::F64(x) => Ok(Value::F64(x.abs())),
            other => Ok(Value::I64(i64_of(other)?.wrapping_abs())),
        },
        Func::Sqrt => unary(f64::sqrt),
        Func::Exp => unary(f64::exp),
        Func::Log => unary(f64::ln),
        Func::Floor => unary(f64::floor),
        Func::Ceil => unary(f64::ceil),
        Func::Pow => Ok(Value::F64(f64_of(arg(0)?)?.powf(f64_of(arg(1)?)?))),
        Func::Len => Ok(Value::I64(array_of(arg(0)?)?.len() as i64)),
        Func::First => array_of(arg(0)?)?
            .first()
            .map(|&x| Value::F64(x))
            .ok_or_else(|| Error::callback("first() of an empty array")),
        Func::At => {
            let a = array_of(arg(0)?)?;
            let i = i64_of(arg(1)?)?;
            usize::try_from(i)
                .ok()
                .and_then(|i| a.get(i))
                .map(|&x| Value::F64(x))
                .ok_or_else(|| {
                    Error::callback(format!("at(): index {i} out of bounds for length {}", a.len()))
                })
        }
        Func::ArraySum => Ok(Value::F64(array_of(arg(0)?)?.iter().sum())),
        Func::ArrayMax => array_of(arg(0)?)?
            .iter()
            .copied()
            .reduce(f64::max)
            .map(Value::F64)
            .ok_or_else(|| Error::callback("max() of an empty array")),
        Func::ArrayMin => array_of(arg(0)?)?
            .iter()
            .copied()
            .reduce(f64::min)
            .map(Value::F64)
            .ok_or_else(|| Error::callback("min() of an empty array")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::open_source;
    use crate::store::ColumnData;

    fn node() -> crate::graph::Node {
        open_source([
            ("n", ColumnData::from(vec![2i64])),
            ("pt", ColumnData::from(vec![vec![31.5, 12.0]])),
            ("tag", ColumnData::from(vec!["mu"])),
        ])
        .unwrap()
    }

    fn compile(sql: &str) -> Result<CompiledExpr> {
        CompiledExpr::compile(sql, node().schema())
    }

    fn eval(sql: &str, values: &[Value]) -> Value {
        let c = compile(sql).unwrap();
        let row = Row::new(&c.inputs, values);
        c.scalar.eval(&row).unwrap()
    }

    #[test]
    fn infers_types() {
        assert_eq!(compile("n + 1").unwrap().dtype, DType::I64);
        assert_eq!(compile("n / 2").unwrap().dtype, DType::F64);
        assert_eq!(compile("n * 1.5").unwrap().dtype, DType::F64);
        assert_eq!(compile("n > 1 AND tag = 'mu'").unwrap().dtype, DType::Bool);
        assert_eq!(compile("len(pt)").unwrap().dtype, DType::I64);
        assert_eq!(compile("CASE WHEN n > 1 THEN 1 ELSE 0.5 END").unwrap().dtype, DType::F64);
        assert_eq!(compile("CAST(n AS DOUBLE)").unwrap().dtype, DType::F64);
    }

    #[test]
    fn inputs_are_deduplicated_in_first_use_order() {
        let c = compile("at(pt, n - 1) > n").unwrap();
        assert_eq!(c.inputs, vec!["pt".to_string(), "n".to_string()]);
    }

    #[test]
    fn rejects_bad_expressions() {
        assert!(matches!(compile("nope > 1"), Err(Error::Schema(_))));
        assert!(matches!(compile("tag + 1"), Err(Error::Expr(ExprError::Plan(_)))));
        assert!(matches!(compile("n > 'a'"), Err(Error::Expr(ExprError::Plan(_)))));
        assert!(matches!(compile("n AND true"), Err(Error::Expr(ExprError::Plan(_)))));
        assert!(matches!(compile("foo(n)"), Err(Error::Expr(ExprError::Plan(_)))));
        assert!(matches!(compile("n >"), Err(Error::Expr(ExprError::Parse(_)))));
        assert!(matches!(compile("n > 1 2"), Err(Error::Expr(ExprError::Parse(_)))));
    }

    #[test]
    fn evaluates() {
        let pt = Value::from(vec![31.5, 12.0]);
        assert_eq!(eval("max(pt) - min(pt)", &[pt.clone()]), Value::F64(19.5));
        assert_eq!(eval("at(pt, 1)", &[pt.clone()]), Value::F64(12.0));
        assert_eq!(eval("7 % 3", &[]), Value::I64(1));
        assert_eq!(eval("-n", &[Value::I64(2)]), Value::I64(-2));
        assert_eq!(eval("n BETWEEN 1 AND 2", &[Value::I64(2)]), Value::Bool(true));
        assert_eq!(eval("n NOT IN (1, 3)", &[Value::I64(2)]), Value::Bool(true));
        assert_eq!(eval("CAST(2.9 AS BIGINT)", &[]), Value::I64(2));
        assert_eq!(eval("floor(2.5) + ceil(0.2)", &[]), Value::F64(3.0));
    }

    #[test]
    fn runtime_errors() {
        let c = compile("at(pt, 5)").unwrap();
        let v = [Value::from(vec![1.0])];
        assert!(matches!(
            c.scalar.eval(&Row::new(&c.inputs, &v)),
            Err(Error::Callback(_))
        ));
        let c = compile("n % 0").unwrap();
        let v = [Value::I64(1)];
        assert!(c.scalar.eval(&Row::new(&c.inputs, &v)).is_err());
    }
}
