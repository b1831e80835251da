use casekit::{compare, verify, Context, Outcome};
use std::hint::black_box;

#[casekit::test]
fn parses_integers(ctx: &mut Context) -> Outcome {
    compare!(ctx, "42".parse::<i64>().ok(), Some(42));
    compare!(ctx, "-7".parse::<i64>().ok(), Some(-7));
    Ok(())
}

#[casekit::test]
fn rejects_garbage(ctx: &mut Context) -> Outcome {
    verify!(ctx, "4x2".parse::<i64>().is_err());
    verify!(ctx, "".parse::<i64>().is_err());
    Ok(())
}

#[casekit::test(repeat = 50)]
fn round_trips_every_repetition(ctx: &mut Context) -> Outcome {
    let value = ctx.test_case_repeat_id() as i64 * 7919 - 100_000;
    compare!(ctx, value.to_string().parse::<i64>().ok(), Some(value));
    Ok(())
}

#[casekit::bench(repeat = 20)]
fn parse_short(ctx: &mut Context) -> Outcome {
    ctx.benchmark(1000, || black_box("12345").parse::<u32>());
    Ok(())
}

#[casekit::bench(cpu_cycles, repeat = 20)]
fn format_short(ctx: &mut Context) -> Outcome {
    ctx.benchmark(1000, || black_box(12345u32).to_string());
    Ok(())
}

casekit::main!("NumberTest");
