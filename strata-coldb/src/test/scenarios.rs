// End-to-end write/read paths through the directory.

use crate::{Directory, Domain, EncodingKind, Value, Vector};
use std::sync::Arc;
use strata_admin::Config;
use strata_base::{ErrorKind, Result, VecKey};
use test_log::test;

#[test]
fn test_byte_range_plus_na_needs_two_bytes() -> Result<()> {
    let dir = Directory::new(&Config::default())?;
    let mut vals = (0..=254).map(Value::int).collect::<Vec<_>>();
    vals.push(Value::Na);
    let v = Vector::make_values(&dir, VecKey::named("ramp"), None, &vals)?;
    assert_eq!(v.nchunks(), 1);
    assert_eq!(v.chunk(0)?.kind(), EncodingKind::Int2);
    assert_eq!(v.at(4)?, Value::int(4));
    assert!(v.at(255)?.is_na());
    assert_eq!(v.num_rows(), 256);
    Ok(())
}

#[test]
fn test_one_in_a_hundred_thousand() -> Result<()> {
    let dir = Directory::new(&Config::default().with_chunk_rows(1 << 20))?;
    let mut vals = vec![Value::int(0); 100_001];
    vals[50_000] = Value::int(1);
    let v = Vector::make_values(&dir, VecKey::named("spike"), None, &vals)?;
    let chunk = v.chunk(0)?;
    assert_eq!(chunk.kind(), EncodingKind::SparseLong);
    assert!(chunk.has_sparse_index());
    assert!(chunk.body_bytes() < 16);
    assert_eq!(v.num_rows(), 100_001);
    assert_eq!(v.at(50_000)?, Value::int(1));
    assert_eq!(v.at(0)?, Value::int(0));
    assert_eq!(v.at(49_999)?, Value::int(0));
    assert_eq!(v.at(100_000)?, Value::int(0));
    Ok(())
}

#[test]
fn test_spike_split_over_default_chunks() -> Result<()> {
    let dir = Directory::new(&Config::default())?;
    let mut vals = vec![Value::int(0); 100_001];
    vals[50_000] = Value::int(1);
    let v = Vector::make_values(&dir, VecKey::named("spike2"), None, &vals)?;
    assert_eq!(v.espc(), &[0, 65_536, 100_001]);
    assert_eq!(v.chunk(0)?.kind(), EncodingKind::SparseShort);
    assert_eq!(v.chunk(1)?.kind(), EncodingKind::Const);
    assert_eq!(v.at(50_000)?, Value::int(1));
    Ok(())
}

#[test]
fn test_unseen_label_in_frozen_domain() -> Result<()> {
    let dir = Directory::new(&Config::default())?;
    let key = VecKey::named("sizes");
    let domain = Arc::new(Domain::frozen(["small", "large"])?);
    let builder = dir.categorical_builder(key, domain);
    let mut buf = builder.open_chunk(0)?;
    buf.append_str("small")?;
    assert_eq!(buf.append_str("medium").unwrap_err().kind(), ErrorKind::Domain);
    assert_eq!(builder.commit(buf).unwrap_err().kind(), ErrorKind::Domain);
    assert_eq!(builder.finalize(&dir).unwrap_err().kind(), ErrorKind::Domain);
    assert!(!dir.contains(key));
    Ok(())
}

#[test]
fn test_aligned_split() -> Result<()> {
    let dir = Directory::new(&Config::default())?;
    let a = (1..=10).map(Value::int).collect::<Vec<_>>();
    let b = (1..=10).map(|i| Value::Dec { mantissa: i * 5, exp: -1 }).collect::<Vec<_>>();
    let va = Vector::make_split(&dir, VecKey::named("a"), None, &a, &[3, 3, 4])?;
    let vb = Vector::make_split(&dir, VecKey::named("b"), None, &b, &[3, 3, 4])?;
    assert!(va.is_aligned_with(&vb));
    assert_eq!(va.espc(), &[0, 3, 6, 10]);
    assert_eq!(vb.at_f64(9)?, 5.0);
    let bad = Vector::make_split(&dir, VecKey::named("c"), None, &a, &[3, 3]);
    assert_eq!(bad.unwrap_err().kind(), ErrorKind::OutOfRange);
    Ok(())
}
