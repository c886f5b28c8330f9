use crate::{err, Bitmap256, ErrorKind, NodeId, VecKey};
use test_log::test;

#[test]
fn test_error_kind_and_message() {
    let e = err(ErrorKind::NotFound, "no such vector");
    assert_eq!(e.kind(), ErrorKind::NotFound);
    assert_eq!(e.message(), "no such vector");
    assert_eq!(e.to_string(), "NotFound: no such vector");
    let e = e.with_kind(ErrorKind::TaskFailed);
    assert_eq!(e.kind(), ErrorKind::TaskFailed);
    assert_eq!(e.message(), "no such vector");
}

#[test]
fn test_external_errors_convert() {
    fn parse(s: &str) -> crate::Result<i64> {
        Ok(s.parse::<i64>()?)
    }
    let e = parse("twelve").unwrap_err();
    assert_eq!(e.kind(), ErrorKind::External);
    assert_eq!(parse("12").unwrap(), 12);
}

#[test]
fn test_rank() {
    let mut bm = Bitmap256::new();
    for i in 0..=255 {
        bm.set(i, true);
        assert_eq!(bm.rank(i), i + 1);
    }
    assert_eq!(bm.rank(255), 256);
    for i in 0..=127 {
        assert_eq!(bm.rank(255), 256 - i);
        bm.set(i * 2, false);
    }
    assert_eq!(bm.count(), 128);
    assert!(bm.rank(0) == 0 && bm.rank(1) == 1);
}

#[test]
fn test_keys() {
    assert_eq!(VecKey::named("iris.hex"), VecKey::named("iris.hex"));
    assert_ne!(VecKey::named("iris.hex"), VecKey::named("iris2.hex"));
    let k = VecKey::new(0xabc, 3);
    assert_eq!(k.to_string(), "vec:0000000000000abc:3");
    assert_eq!(k.chunk_hash(7), k.chunk_hash(7));
    assert_ne!(k.chunk_hash(7), k.chunk_hash(8));
    assert_eq!(NodeId(2).to_string(), "node2");
}
