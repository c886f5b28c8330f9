use crate::Config;
use serde::Serialize;
use strata_base::{ErrorKind, NodeId, Result};
use test_log::test;

#[test]
fn test_defaults_validate() -> Result<()> {
    let cfg = Config::default();
    cfg.validate()?;
    assert_eq!(cfg.chunk_rows, 65536);
    assert_eq!(cfg.nodes, vec![NodeId(0)]);
    Ok(())
}

#[test]
fn test_msgpack_round_trip() -> Result<()> {
    let cfg = Config::default()
        .with_chunk_rows(1000)
        .with_workers(3)
        .with_nodes(vec![NodeId(0), NodeId(1)]);
    let bytes = cfg.to_msgpack()?;
    assert_eq!(Config::from_msgpack(&bytes)?, cfg);
    Ok(())
}

#[test]
fn test_missing_fields_take_defaults() -> Result<()> {
    #[derive(Serialize)]
    struct Partial {
        chunk_rows: usize,
    }
    let bytes = rmp_serde::to_vec_named(&Partial { chunk_rows: 7 })?;
    let cfg = Config::from_msgpack(&bytes)?;
    assert_eq!(cfg.chunk_rows, 7);
    assert_eq!(cfg.sparse_ratio, Config::default().sparse_ratio);
    Ok(())
}

#[test]
fn test_rejects_bad_values() {
    let bad = [
        Config::default().with_chunk_rows(0),
        Config::default().with_sparse_ratio(1.0),
        Config::default().with_nodes(vec![]),
    ];
    for cfg in bad.iter() {
        assert_eq!(cfg.validate().unwrap_err().kind(), ErrorKind::Config);
    }
}
