//! Reproducible randomness and clock behavior: the sequence resets at
//! every top-level chain, never inside one, and time-derived values
//! report the TTL of their finest-grained field.

mod common;

use std::rc::Rc;

use common::{call_package, engine_with, CountingRng, FixedClock, ModuleMap, TickingClock};
use quill_engine::{Engine, FrameArgs, TableKey, Value};

// 2009-02-13 23:31:30 UTC, a Friday.
const KNOWN_INSTANT: i64 = 1234567890;

fn rand_modules() -> ModuleMap {
    let mut modules = ModuleMap::new();
    modules.insert("Rand", |ctx| {
        let exports = ctx.new_table();
        let foo = ctx.new_function(Rc::new(|ctx, _| {
            let mut parts = Vec::new();
            for _ in 0..5 {
                let v = call_package(ctx, "math", "random", &[])?;
                parts.push(v.to_display_string());
            }
            Ok(Value::from(parts.join(", ")))
        }));
        let bar = ctx.new_function(Rc::new(|ctx, _| {
            let frame = ctx.current_frame().unwrap();
            let before = call_package(ctx, "math", "random", &[])?;
            let nested = ctx.preprocess(frame, "{{#invoke:Rand|bar2}}")?;
            let after = call_package(ctx, "math", "random", &[])?;
            Ok(Value::from(format!(
                "{}; {nested}; {}",
                before.to_display_string(),
                after.to_display_string()
            )))
        }));
        let bar2 = ctx.new_function(Rc::new(|_, _| Ok(Value::str("bar2 called"))));
        ctx.table_set(&exports, TableKey::str("foo"), foo)?;
        ctx.table_set(&exports, TableKey::str("bar"), bar)?;
        ctx.table_set(&exports, TableKey::str("bar2"), bar2)?;
        Ok(exports)
    });
    modules
}

fn rand_engine() -> Engine {
    let mut engine = engine_with(rand_modules());
    engine.set_render_key("Title/1");
    engine
}

#[test]
fn draws_replay_across_chains() {
    let engine = rand_engine();
    let first = engine.invoke("Rand", "foo", FrameArgs::new()).unwrap();
    let second = engine.invoke("Rand", "foo", FrameArgs::new()).unwrap();
    assert_eq!(first.output, second.output);
    let values: Vec<&str> = first.output.split(", ").collect();
    assert_eq!(values.len(), 5);
    for pair in values.windows(2) {
        assert_ne!(pair[0], pair[1], "{}", first.output);
    }
}

#[test]
fn nested_invocation_does_not_reset_the_sequence() {
    let engine = rand_engine();
    let first = engine.invoke("Rand", "bar", FrameArgs::new()).unwrap();
    let parts: Vec<&str> = first.output.split("; ").collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[1], "bar2 called");
    assert_ne!(parts[0], parts[2], "{}", first.output);
    let second = engine.invoke("Rand", "bar", FrameArgs::new()).unwrap();
    assert_eq!(first.output, second.output);
}

#[test]
fn interleaved_chains_do_not_disturb_each_other() {
    let engine = rand_engine();
    let foo = engine.invoke("Rand", "foo", FrameArgs::new()).unwrap();
    engine.invoke("Rand", "bar", FrameArgs::new()).unwrap();
    let again = engine.invoke("Rand", "foo", FrameArgs::new()).unwrap();
    assert_eq!(foo.output, again.output);
}

#[test]
fn render_key_selects_the_sequence() {
    let mut engine = rand_engine();
    let a = engine.invoke("Rand", "foo", FrameArgs::new()).unwrap();
    engine.set_render_key("Title/2");
    let b = engine.invoke("Rand", "foo", FrameArgs::new()).unwrap();
    assert_ne!(a.output, b.output);
    engine.set_render_key("Title/1");
    let c = engine.invoke("Rand", "foo", FrameArgs::new()).unwrap();
    assert_eq!(a.output, c.output);
}

#[test]
fn injected_algorithm_drives_the_draws() {
    let mut engine = rand_engine();
    engine.set_rng_algorithm(Box::new(CountingRng));
    let first = engine.invoke("Rand", "foo", FrameArgs::new()).unwrap();
    let second = engine.invoke("Rand", "foo", FrameArgs::new()).unwrap();
    assert_eq!(first.output, second.output);
}

#[test]
fn ranged_draws_stay_in_bounds() {
    let mut modules = ModuleMap::new();
    modules.insert("Ranges", |ctx| {
        let exports = ctx.new_table();
        let run = ctx.new_function(Rc::new(|ctx, _| {
            for _ in 0..50 {
                let v = call_package(ctx, "math", "random", &[Value::from(10i64)])?;
                let n = v.as_number().unwrap();
                assert!((1.0..=10.0).contains(&n), "{n}");
                assert_eq!(n.fract(), 0.0);
                let v = call_package(
                    ctx,
                    "math",
                    "random",
                    &[Value::from(-5i64), Value::from(5i64)],
                )?;
                let n = v.as_number().unwrap();
                assert!((-5.0..=5.0).contains(&n), "{n}");
            }
            let empty = call_package(ctx, "math", "random", &[Value::from(0i64)]);
            assert!(empty.is_err());
            Ok(Value::str("ok"))
        }));
        ctx.table_set(&exports, TableKey::str("run"), run)?;
        Ok(exports)
    });
    let engine = engine_with(modules);
    let inv = engine.invoke("Ranges", "run", FrameArgs::new()).unwrap();
    assert_eq!(inv.output, "ok");
}

#[test]
fn wall_clock_is_sampled_once_per_chain() {
    let mut modules = ModuleMap::new();
    modules.insert("Now", |ctx| {
        let exports = ctx.new_table();
        let twice = ctx.new_function(Rc::new(|ctx, _| {
            let a = call_package(ctx, "os", "time", &[])?;
            let b = call_package(ctx, "os", "time", &[])?;
            Ok(Value::from(format!(
                "{} {}",
                a.to_display_string(),
                b.to_display_string()
            )))
        }));
        ctx.table_set(&exports, TableKey::str("twice"), twice)?;
        Ok(exports)
    });
    let mut engine = engine_with(modules);
    engine.set_clock(Box::new(TickingClock::starting_at(1000)));
    let first = engine.invoke("Now", "twice", FrameArgs::new()).unwrap();
    assert_eq!(first.output, "1000 1000");
    let second = engine.invoke("Now", "twice", FrameArgs::new()).unwrap();
    assert_eq!(second.output, "1001 1001");
}

fn datetime_engine() -> Engine {
    let mut modules = ModuleMap::new();
    modules.insert("DateTime", |ctx| {
        let exports = ctx.new_table();
        let second = ctx.new_function(Rc::new(|ctx, _| {
            call_package(ctx, "os", "date", &[Value::str("%S")])
        }));
        let minute = ctx.new_function(Rc::new(|ctx, _| {
            call_package(ctx, "os", "date", &[Value::str("%M")])
        }));
        let hour = ctx.new_function(Rc::new(|ctx, _| {
            call_package(ctx, "os", "date", &[Value::str("%H")])
        }));
        let ampm = ctx.new_function(Rc::new(|ctx, _| {
            call_package(ctx, "os", "date", &[Value::str("%p")])
        }));
        let day = ctx.new_function(Rc::new(|ctx, _| {
            call_package(ctx, "os", "date", &[Value::str("%d")])
        }));
        let time = ctx.new_function(Rc::new(|ctx, _| {
            call_package(ctx, "os", "time", &[])
        }));
        let table = ctx.new_function(Rc::new(|ctx, _| {
            call_package(ctx, "os", "date", &[Value::str("*t")])?;
            Ok(Value::str("no read"))
        }));
        let tablesec = ctx.new_function(Rc::new(|ctx, _| {
            let t = call_package(ctx, "os", "date", &[Value::str("*t")])?;
            ctx.table_get(&t, &TableKey::str("sec"))
        }));
        let specific = ctx.new_function(Rc::new(|ctx, _| {
            call_package(
                ctx,
                "os",
                "date",
                &[Value::str("%d"), Value::from(KNOWN_INSTANT)],
            )
        }));
        let round_trip = ctx.new_function(Rc::new(|ctx, _| {
            let t = call_package(ctx, "os", "date", &[Value::str("*t")])?;
            call_package(ctx, "os", "time", &[t])
        }));
        let explicit_table = ctx.new_function(Rc::new(|ctx, _| {
            let t = ctx.new_table();
            ctx.table_set(&t, TableKey::str("year"), Value::from(2000i64))?;
            ctx.table_set(&t, TableKey::str("month"), Value::from(1i64))?;
            ctx.table_set(&t, TableKey::str("day"), Value::from(1i64))?;
            call_package(ctx, "os", "time", &[t])
        }));
        ctx.table_set(&exports, TableKey::str("second"), second)?;
        ctx.table_set(&exports, TableKey::str("minute"), minute)?;
        ctx.table_set(&exports, TableKey::str("hour"), hour)?;
        ctx.table_set(&exports, TableKey::str("ampm"), ampm)?;
        ctx.table_set(&exports, TableKey::str("day"), day)?;
        ctx.table_set(&exports, TableKey::str("time"), time)?;
        ctx.table_set(&exports, TableKey::str("table"), table)?;
        ctx.table_set(&exports, TableKey::str("tablesec"), tablesec)?;
        ctx.table_set(&exports, TableKey::str("specific"), specific)?;
        ctx.table_set(&exports, TableKey::str("roundTrip"), round_trip)?;
        ctx.table_set(&exports, TableKey::str("explicitTable"), explicit_table)?;
        Ok(exports)
    });
    let mut engine = engine_with(modules);
    engine.set_clock(Box::new(FixedClock(KNOWN_INSTANT)));
    engine
}

#[test]
fn date_formats_report_their_granularity() {
    let cases: &[(&str, Option<u64>)] = &[
        ("second", Some(1)),
        ("minute", Some(60)),
        ("hour", Some(3600)),
        ("ampm", Some(43200)),
        ("day", Some(86400)),
        ("time", Some(1)),
        ("table", None),
        ("tablesec", Some(1)),
        ("specific", None),
    ];
    let engine = datetime_engine();
    for (entry, expected) in cases {
        let inv = engine.invoke("DateTime", entry, FrameArgs::new()).unwrap();
        assert_eq!(inv.ttl, *expected, "entry {entry}");
    }
}

#[test]
fn date_formats_render_the_held_instant() {
    let engine = datetime_engine();
    let cases: &[(&str, &str)] = &[
        ("second", "30"),
        ("minute", "31"),
        ("hour", "23"),
        ("ampm", "PM"),
        ("day", "13"),
        ("tablesec", "30"),
        ("specific", "13"),
    ];
    for (entry, expected) in cases {
        let inv = engine.invoke("DateTime", entry, FrameArgs::new()).unwrap();
        assert_eq!(inv.output, *expected, "entry {entry}");
    }
}

#[test]
fn structured_time_round_trips_and_stays_live() {
    let engine = datetime_engine();
    let inv = engine
        .invoke("DateTime", "roundTrip", FrameArgs::new())
        .unwrap();
    assert_eq!(inv.output, KNOWN_INSTANT.to_string());
    // The table came from the held clock, so converting it back still
    // depends on the current moment.
    assert_eq!(inv.ttl, Some(1));
}

#[test]
fn explicit_time_tables_carry_no_ttl() {
    let engine = datetime_engine();
    let inv = engine
        .invoke("DateTime", "explicitTable", FrameArgs::new())
        .unwrap();
    // 2000-01-01, hour defaulting to noon.
    assert_eq!(inv.output, "946728000");
    assert_eq!(inv.ttl, None);
}
