use rusqlite::Connection;
use rusqlite::functions::{Aggregate, Context, FunctionFlags};

use crate::shared::datetime::{AggInterval, CalendarBucketer};

/// Registers the SQL functions the query layer relies on:
///
/// - `interval_start(epoch, interval)`: epoch seconds of the calendar bucket start
/// - `interval_label(epoch, interval)`: display label of that bucket
/// - `interval_order(epoch, interval)`: sort position of that bucket
/// - `median(x)`: discrete median (lower middle value for even counts)
pub fn register(conn: &Connection, bucketer: &CalendarBucketer) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    let starts = bucketer.clone();
    conn.create_scalar_function("interval_start", 2, flags, move |ctx| {
        let (ts, interval) = bucket_args(ctx)?;
        Ok(ts.and_then(|ts| starts.start_of(ts, interval)))
    })?;

    let labels = bucketer.clone();
    conn.create_scalar_function("interval_label", 2, flags, move |ctx| {
        let (ts, interval) = bucket_args(ctx)?;
        Ok(ts.and_then(|ts| labels.label_of(ts, interval)))
    })?;

    let orders = bucketer.clone();
    conn.create_scalar_function("interval_order", 2, flags, move |ctx| {
        let (ts, interval) = bucket_args(ctx)?;
        Ok(ts.and_then(|ts| orders.order_of(ts, interval)))
    })?;

    conn.create_aggregate_function("median", 1, flags, Median)?;
    Ok(())
}

fn bucket_args(ctx: &Context<'_>) -> rusqlite::Result<(Option<i64>, AggInterval)> {
    let ts = ctx.get::<Option<i64>>(0)?;
    let interval = ctx.get::<Option<String>>(1)?;
    Ok((ts, AggInterval::from_name(interval.as_deref())))
}

struct Median;

impl Aggregate<Vec<f64>, Option<f64>> for Median {
    fn init(&self, _: &mut Context<'_>) -> rusqlite::Result<Vec<f64>> {
        Ok(Vec::new())
    }

    fn step(&self, ctx: &mut Context<'_>, acc: &mut Vec<f64>) -> rusqlite::Result<()> {
        if let Some(value) = ctx.get::<Option<f64>>(0)? {
            acc.push(value);
        }
        Ok(())
    }

    fn finalize(&self, _: &mut Context<'_>, acc: Option<Vec<f64>>) -> rusqlite::Result<Option<f64>> {
        let mut values = acc.unwrap_or_default();
        if values.is_empty() {
            return Ok(None);
        }
        values.sort_by(f64::total_cmp);
        // Lower middle for even counts, matching PERCENTILE_DISC(0.5).
        Ok(Some(values[(values.len() - 1) / 2]))
    }
}
