use crate::{format_g, format_time, preview, Datum, ParseSink};
use std::sync::Arc;
use strata_admin::Config;
use strata_base::{ErrorKind, Result};
use strata_coldb::{ColumnType, Directory, Domain, EncodingKind, Value};
use test_log::test;

fn sink(chunk_rows: usize) -> Result<(Arc<Directory>, ParseSink)> {
    let dir = Arc::new(Directory::new(&Config::default().with_chunk_rows(chunk_rows))?);
    let sink = ParseSink::new(dir.clone());
    Ok((dir, sink))
}

#[test]
fn test_writer_splits_chunks() -> Result<()> {
    let (dir, sink) = sink(4)?;
    let mut w = sink.open_column(None);
    for i in 0..10_i64 {
        w.append(Datum::from(i))?;
    }
    assert_eq!(w.rows(), 10);
    let key = w.key();
    let v = w.close_column()?;
    assert_eq!(v.espc(), &[0, 4, 8, 10]);
    assert_eq!(v.at(9)?, Value::int(9));
    assert!(dir.contains(key));
    Ok(())
}

#[test]
fn test_columns_share_a_group() -> Result<()> {
    let (_dir, sink) = sink(100)?;
    let a = sink.open_column(Some(ColumnType::Num));
    let b = sink.open_column(Some(ColumnType::Str));
    assert_eq!(a.key().group, b.key().group);
    assert_ne!(a.key(), b.key());
    assert_eq!(b.key().index, a.key().index + 1);
    Ok(())
}

#[test]
fn test_mixed_cells() -> Result<()> {
    let (_dir, sink) = sink(100)?;
    let mut w = sink.open_column(None);
    w.append(Datum::Na)?;
    w.append(Datum::Dec { mantissa: 125, exp: -2 })?;
    w.append(Datum::Flo(0.5))?;
    let v = w.close_column()?;
    assert!(v.is_na(0)?);
    assert_eq!(v.at_f64(1)?, 1.25);
    assert_eq!(v.at_f64(2)?, 0.5);
    Ok(())
}

#[test]
fn test_string_into_numeric_column() -> Result<()> {
    let (dir, sink) = sink(100)?;
    let mut w = sink.open_column(Some(ColumnType::Num));
    let key = w.key();
    w.append(Datum::from(1_i64))?;
    let e = w.append(Datum::from("one")).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::SchemaMismatch);
    assert_eq!(w.close_column().unwrap_err().kind(), ErrorKind::SchemaMismatch);
    assert!(!dir.contains(key));
    Ok(())
}

#[test]
fn test_time_column() -> Result<()> {
    let (_dir, sink) = sink(100)?;
    let mut w = sink.open_column(Some(ColumnType::Time));
    w.append(Datum::Time(1_700_000_000_000))?;
    w.append(Datum::Na)?;
    let v = w.close_column()?;
    assert_eq!(v.column_type(), ColumnType::Time);
    assert_eq!(v.at(0)?.as_i64(), Some(1_700_000_000_000));
    Ok(())
}

#[test]
fn test_categorical_column() -> Result<()> {
    let (_dir, sink) = sink(2)?;
    let domain = Arc::new(Domain::frozen(["lo", "hi"])?);
    let mut w = sink.open_column_with_domain(domain);
    for s in ["hi", "lo", "hi"] {
        w.append(Datum::from(s))?;
    }
    let v = w.close_column()?;
    assert_eq!(v.column_type(), ColumnType::Cat);
    assert_eq!(v.chunk(0)?.kind(), EncodingKind::Cat);
    assert_eq!(v.chunk(1)?.kind(), EncodingKind::Const);
    assert_eq!(v.at_str(2)?.as_deref(), Some("hi"));

    let domain = Arc::new(Domain::frozen(["lo", "hi"])?);
    let mut w = sink.open_column_with_domain(domain);
    assert_eq!(w.append(Datum::from("mid")).unwrap_err().kind(), ErrorKind::Domain);
    assert_eq!(w.close_column().unwrap_err().kind(), ErrorKind::Domain);
    Ok(())
}

#[test]
fn test_format_g() {
    assert_eq!(format_g(1.0), "1.00000");
    assert_eq!(format_g(123.456), "123.456");
    assert_eq!(format_g(0.0001), "0.000100000");
    assert_eq!(format_g(1234567.0), "1.23457e+06");
    assert_eq!(format_g(0.00001234), "1.23400e-05");
    assert_eq!(format_g(-2.5), "-2.50000");
    assert_eq!(format_g(f64::NAN), "NaN");
}

#[test]
fn test_format_time() {
    assert_eq!(format_time(0), "1970-01-01 00:00:00");
    assert_eq!(format_time(1_700_000_000_000), "2023-11-14 22:13:20");
    assert_eq!(format_time(951_782_400_000), "2000-02-29 00:00:00");
    assert_eq!(format_time(-1000), "1969-12-31 23:59:59");
    assert_eq!(format_time(1_700_000_000_999), "2023-11-14 22:13:20");
    assert_eq!(format_time(i64::MAX), "");
}

#[test]
fn test_preview_guesses() {
    let rows = (0..20)
        .map(|i| {
            vec![
                Datum::from(i as i64),
                Datum::from(if i % 2 == 0 { "even" } else { "odd" }),
                Datum::Str(format!("id-{}", i)),
                Datum::Time(i as i64 * 86_400_000),
            ]
        })
        .collect::<Vec<_>>();
    let p = preview(&["n", "parity", "id", "day"], &rows);
    assert_eq!(
        p.types(),
        vec![ColumnType::Num, ColumnType::Cat, ColumnType::Str, ColumnType::Time]
    );
    assert_eq!(p.columns[0].examples.len(), 10);
    assert_eq!(p.columns[0].examples[3], "3.00000");
    assert_eq!(p.columns[1].examples[1], "odd");
    assert_eq!(p.columns[3].examples[1], "1970-01-02 00:00:00");
}

#[test]
fn test_preview_short_rows() {
    let rows = vec![vec![Datum::from(1.5)], vec![Datum::Na, Datum::from("x")]];
    let p = preview(&["a", "b"], &rows);
    assert_eq!(p.columns[0].examples, vec!["1.50000".to_string(), String::new()]);
    assert_eq!(p.columns[1].examples, vec![String::new(), "x".to_string()]);
    // One distinct label in two rows is few enough to be categorical.
    assert_eq!(p.columns[1].ctype, ColumnType::Cat);
}
