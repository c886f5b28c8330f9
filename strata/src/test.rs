use crate::{
    preview, rollup::Rollups, task, ChunkGroup, ColumnType, Config, Datum, Engine, ErrorKind,
    NodeId, Result, Value, VecKey, Vector,
};
use test_log::test;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_bad_config_rejected() {
    let e = Engine::new(Config::default().with_nodes(vec![])).err();
    assert_eq!(e.map(|e| e.kind()), Some(ErrorKind::Config));
}

#[test]
fn test_decode_then_compute() -> Result<()> {
    let engine = Engine::new(Config::default().with_chunk_rows(3).with_workers(2))?;
    let names = ["qty", "price", "tag"];
    let rows = (1..=10_i64)
        .map(|i| {
            vec![
                Datum::from(i),
                Datum::Dec { mantissa: i * 5, exp: -1 },
                Datum::from(if i % 3 == 0 { "c" } else { "n" }),
            ]
        })
        .collect::<Vec<_>>();
    let guess = preview(&names, &rows);
    assert_eq!(guess.types(), vec![ColumnType::Num, ColumnType::Num, ColumnType::Cat]);

    let sink = engine.sink();
    let mut writers = guess
        .columns
        .iter()
        .map(|c| sink.open_column(Some(c.ctype)))
        .collect::<Vec<_>>();
    for row in rows {
        for (w, d) in writers.iter_mut().zip(row) {
            w.append(d)?;
        }
    }
    let vecs = writers
        .into_iter()
        .map(|w| w.close_column())
        .collect::<Result<Vec<_>>>()?;
    assert!(vecs.iter().all(|v| v.espc() == [0, 3, 6, 9, 10]));
    assert_eq!(vecs[2].at_str(2)?.as_deref(), Some("c"));

    let dot = task(
        |g: &ChunkGroup| {
            let (a, b) = (g.chunk(0), g.chunk(1));
            Ok((0..g.len()).map(|r| a.at_f64(r) * b.at_f64(r)).sum::<f64>())
        },
        |x: f64, y: f64| Ok(x + y),
    );
    let blocking = engine.run_blocking(dot, &vecs[..2])?;
    let dot = task(
        |g: &ChunkGroup| {
            let (a, b) = (g.chunk(0), g.chunk(1));
            Ok((0..g.len()).map(|r| a.at_f64(r) * b.at_f64(r)).sum::<f64>())
        },
        |x: f64, y: f64| Ok(x + y),
    );
    let forked = engine.fork(dot, &vecs[..2])?.get()?;
    assert_eq!(blocking, 192.5);
    assert_eq!(forked, blocking);
    Ok(())
}

#[test]
fn test_rollups() -> Result<()> {
    let engine = Engine::new(Config::default().with_chunk_rows(4))?;
    let mut vals = (1..=10).map(Value::int).collect::<Vec<_>>();
    vals.push(Value::Na);
    vals.push(Value::Flo(f64::NAN));
    let v = Vector::make_values(engine.directory(), VecKey::named("r"), None, &vals)?;
    let r = Rollups::compute(&engine, &v)?;
    assert_eq!(r.rows, 12);
    assert_eq!(r.na_count, 2);
    assert_eq!(r.count, 10);
    assert_eq!(r.min, 1.0);
    assert_eq!(r.max, 10.0);
    assert!(close(r.mean, 5.5));
    assert!(close(r.sigma, (55.0_f64 / 6.0).sqrt()));
    Ok(())
}

#[test]
fn test_rollups_across_nodes_match_one_node() -> Result<()> {
    let vals = (0..1000)
        .map(|i| Value::Flo(((i * 37) % 101) as f64 * 0.25))
        .collect::<Vec<_>>();
    let one = Engine::new(Config::default().with_chunk_rows(1000))?;
    let many = Engine::new(
        Config::default()
            .with_chunk_rows(7)
            .with_nodes(vec![NodeId(0), NodeId(1), NodeId(2), NodeId(3)]),
    )?;
    let a = Vector::make_values(one.directory(), VecKey::named("v"), None, &vals)?;
    let b = Vector::make_values(many.directory(), VecKey::named("v"), None, &vals)?;
    let (ra, rb) = (Rollups::compute(&one, &a)?, Rollups::compute(&many, &b)?);
    assert_eq!(ra.count, rb.count);
    assert_eq!((ra.min, ra.max), (rb.min, rb.max));
    assert!(close(ra.mean, rb.mean));
    assert!(close(ra.sigma, rb.sigma));
    Ok(())
}

#[test]
fn test_rollups_edge_cases() -> Result<()> {
    let engine = Engine::new(Config::default())?;
    let empty = Vector::make_values(engine.directory(), VecKey::named("e"), None, &[])?;
    let r = Rollups::compute(&engine, &empty)?;
    assert_eq!((r.rows, r.count), (0, 0));
    assert!(r.mean.is_nan() && r.min.is_nan());

    let words = Vector::make_values(
        engine.directory(),
        VecKey::named("w"),
        None,
        &[Value::from("a"), Value::from("b")],
    )?;
    let e = Rollups::compute(&engine, &words).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::SchemaMismatch);
    Ok(())
}

#[test]
fn test_remove_through_engine() -> Result<()> {
    let engine = Engine::new(Config::default())?;
    let key = VecKey::named("gone");
    Vector::make_f64(engine.directory(), key, &[1.0, 2.0])?;
    assert_eq!(engine.vector(key)?.num_rows(), 2);
    engine.remove(key)?;
    assert_eq!(engine.vector(key).unwrap_err().kind(), ErrorKind::NotFound);
    Ok(())
}
