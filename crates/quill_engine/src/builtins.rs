//! The base sandbox environment.
//!
//! Everything a script can see without `require` is installed here. The
//! set of names is the gate's allow-list; keep the two in lockstep by
//! construction (this is the only place that registers base names).

use quill_core::{EngineError, TableKey, Value};

use crate::clock::{self, ClockParts, TTL_SECOND, TimeTable};
use crate::context::Context;
use crate::gate::GlobalGate;
use crate::heap::Object;
use crate::library::HostValue;

pub(crate) fn install_base(gate: &mut GlobalGate) {
    gate.register_fn("assert", builtin_assert);
    gate.register_fn("error", builtin_error);
    gate.register_fn("pcall", builtin_pcall);
    gate.register_fn("require", builtin_require);
    gate.register_fn("tostring", builtin_tostring);
    gate.register_fn("type", builtin_type);

    gate.register_package("string");
    gate.package_fn("string", "len", string_len);
    gate.package_fn("string", "lower", string_lower);
    gate.package_fn("string", "rep", string_rep);
    gate.package_fn("string", "upper", string_upper);

    gate.register_package("math");
    gate.package_const("math", "pi", HostValue::Number(std::f64::consts::PI));
    gate.package_const("math", "huge", HostValue::Number(f64::INFINITY));
    gate.package_fn("math", "abs", math_abs);
    gate.package_fn("math", "floor", math_floor);
    gate.package_fn("math", "random", math_random);

    gate.register_package("os");
    gate.package_fn("os", "date", os_date);
    gate.package_fn("os", "time", os_time);
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Nil)
}

fn bad_argument(i: usize, name: &str, expected: &str, got: &Value) -> EngineError {
    EngineError::script(format!(
        "bad argument #{} to '{}' ({} expected, got {})",
        i + 1,
        name,
        expected,
        got.type_name()
    ))
}

fn want_str(args: &[Value], i: usize, name: &str) -> Result<String, EngineError> {
    let v = arg(args, i);
    match v.as_str() {
        Some(s) => Ok(s.to_string()),
        None => Err(bad_argument(i, name, "string", &v)),
    }
}

fn want_number(args: &[Value], i: usize, name: &str) -> Result<f64, EngineError> {
    let v = arg(args, i);
    match v.as_number() {
        Some(n) => Ok(n),
        None => Err(bad_argument(i, name, "number", &v)),
    }
}

fn builtin_assert(_ctx: &mut Context<'_>, args: &[Value]) -> Result<Value, EngineError> {
    let v = arg(args, 0);
    if v.truthy() {
        return Ok(v);
    }
    let message = match arg(args, 1) {
        Value::Nil => "assertion failed!".to_string(),
        other => other.to_display_string(),
    };
    Err(EngineError::script(message))
}

fn builtin_error(_ctx: &mut Context<'_>, args: &[Value]) -> Result<Value, EngineError> {
    Err(EngineError::script(arg(args, 0).to_display_string()))
}

/// Protected call: returns `{ [1] = ok, [2] = result-or-message }`.
/// This is the only recovery surface for nested failures; the host never
/// catches on a script's behalf.
fn builtin_pcall(ctx: &mut Context<'_>, args: &[Value]) -> Result<Value, EngineError> {
    let f = arg(args, 0);
    let rest = if args.is_empty() { &[][..] } else { &args[1..] };
    let (ok, payload) = match ctx.call(&f, rest) {
        Ok(v) => (true, v),
        Err(e) => (false, Value::str(e.to_string())),
    };
    let result = ctx.new_table();
    ctx.table_set(&result, TableKey::Int(1), Value::Bool(ok))?;
    ctx.table_set(&result, TableKey::Int(2), payload)?;
    Ok(result)
}

fn builtin_require(ctx: &mut Context<'_>, args: &[Value]) -> Result<Value, EngineError> {
    let id = want_str(args, 0, "require")?;
    ctx.require(&id)
}

fn builtin_tostring(_ctx: &mut Context<'_>, args: &[Value]) -> Result<Value, EngineError> {
    Ok(Value::str(arg(args, 0).to_display_string()))
}

fn builtin_type(_ctx: &mut Context<'_>, args: &[Value]) -> Result<Value, EngineError> {
    Ok(Value::str(arg(args, 0).type_name()))
}

fn string_len(_ctx: &mut Context<'_>, args: &[Value]) -> Result<Value, EngineError> {
    Ok(Value::Number(want_str(args, 0, "len")?.len() as f64))
}

fn string_lower(_ctx: &mut Context<'_>, args: &[Value]) -> Result<Value, EngineError> {
    Ok(Value::str(want_str(args, 0, "lower")?.to_lowercase()))
}

fn string_rep(_ctx: &mut Context<'_>, args: &[Value]) -> Result<Value, EngineError> {
    let s = want_str(args, 0, "rep")?;
    let n = want_number(args, 1, "rep")?.max(0.0) as usize;
    Ok(Value::str(s.repeat(n)))
}

fn string_upper(_ctx: &mut Context<'_>, args: &[Value]) -> Result<Value, EngineError> {
    Ok(Value::str(want_str(args, 0, "upper")?.to_uppercase()))
}

fn math_abs(_ctx: &mut Context<'_>, args: &[Value]) -> Result<Value, EngineError> {
    Ok(Value::Number(want_number(args, 0, "abs")?.abs()))
}

fn math_floor(_ctx: &mut Context<'_>, args: &[Value]) -> Result<Value, EngineError> {
    Ok(Value::Number(want_number(args, 0, "floor")?.floor()))
}

/// Draws from the process-wide deterministic sequence; see the prng
/// module for the reset rules.
fn math_random(ctx: &mut Context<'_>, args: &[Value]) -> Result<Value, EngineError> {
    let r = ctx.random();
    match args.len() {
        0 => Ok(Value::Number(r)),
        1 => {
            let n = want_number(args, 0, "random")?.floor();
            if n < 1.0 {
                return Err(EngineError::script("bad argument #1 to 'random' (interval is empty)"));
            }
            Ok(Value::Number((r * n).floor() + 1.0))
        }
        _ => {
            let m = want_number(args, 0, "random")?.floor();
            let n = want_number(args, 1, "random")?.floor();
            if n < m {
                return Err(EngineError::script("bad argument #2 to 'random' (interval is empty)"));
            }
            Ok(Value::Number(m + (r * (n - m + 1.0)).floor()))
        }
    }
}

fn os_date(ctx: &mut Context<'_>, args: &[Value]) -> Result<Value, EngineError> {
    let fmt = match arg(args, 0) {
        Value::Nil => "%c".to_string(),
        other => other
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| bad_argument(0, "date", "string", &other))?,
    };
    let fmt = fmt.strip_prefix('!').unwrap_or(&fmt).to_string();
    let explicit = !arg(args, 1).is_nil();
    let secs = if explicit {
        want_number(args, 1, "date")? as i64
    } else {
        ctx.now_secs()
    };
    let parts = ClockParts::from_unix(secs);
    if fmt == "*t" {
        // Structured value: no TTL yet; field reads report lazily.
        let id = ctx.chain.heap.alloc(Object::Time(TimeTable {
            parts,
            live: !explicit,
        }));
        return Ok(Value::Table(id));
    }
    if !explicit {
        if let Some(ttl) = clock::format_ttl(&fmt) {
            ctx.report_ttl_current(ttl);
        }
    }
    Ok(Value::str(clock::format_date(&fmt, &parts)))
}

fn os_time(ctx: &mut Context<'_>, args: &[Value]) -> Result<Value, EngineError> {
    match arg(args, 0) {
        Value::Nil => {
            ctx.report_ttl_current(TTL_SECOND);
            Ok(Value::Number(ctx.now_secs() as f64))
        }
        Value::Table(id) => {
            // Explicit timestamp supplied by the script: the result no
            // longer depends on the current moment, so no TTL.
            let (secs, live) = match ctx.chain.heap.get(id) {
                Object::Time(tt) => (tt.parts.to_unix(), tt.live),
                Object::Table(t) => {
                    let field = |name: &str| -> Option<i64> {
                        t.entries
                            .get(&TableKey::str(name))
                            .and_then(Value::as_number)
                            .map(|n| n as i64)
                    };
                    let year = field("year");
                    let month = field("month");
                    let day = field("day");
                    let (Some(year), Some(month), Some(day)) = (year, month, day) else {
                        return Err(EngineError::script(
                            "missing field in time table (year, month and day are required)",
                        ));
                    };
                    let secs = ClockParts {
                        year,
                        month: month as u32,
                        day: day as u32,
                        hour: field("hour").unwrap_or(12) as u32,
                        min: field("min").unwrap_or(0) as u32,
                        sec: field("sec").unwrap_or(0) as u32,
                        wday: 0,
                        yday: 0,
                    }
                    .to_unix();
                    (secs, false)
                }
                Object::Function(_) => {
                    return Err(EngineError::script(
                        "bad argument #1 to 'time' (time table expected)",
                    ));
                }
            };
            if live {
                ctx.report_ttl_current(TTL_SECOND);
            }
            Ok(Value::Number(secs as f64))
        }
        other => Err(bad_argument(0, "time", "table", &other)),
    }
}
