use crate::Datum;
use std::sync::Arc;
use strata_base::{Result, VecKey};
use strata_coldb::{AppendBuffer, ColumnType, Directory, Domain, Vector, VectorBuilder, VectorGroup};
use tracing::debug;

/// Where a decoder writes one frame. Every column opened on the same sink
/// gets a key from the same vector group.
pub struct ParseSink {
    dir: Arc<Directory>,
    group: VectorGroup,
}

impl ParseSink {
    pub fn new(dir: Arc<Directory>) -> Self {
        let group = dir.new_group();
        ParseSink { dir, group }
    }

    pub fn group(&self) -> &VectorGroup {
        &self.group
    }

    pub fn open_column(&self, declared: Option<ColumnType>) -> ColumnWriter {
        let builder = self.dir.builder(self.group.add_vec(), declared);
        ColumnWriter::new(self.dir.clone(), builder, declared)
    }

    /// A categorical column coded through `domain`. A frozen domain makes
    /// any label outside it an error.
    pub fn open_column_with_domain(&self, domain: Arc<Domain>) -> ColumnWriter {
        let builder = self.dir.categorical_builder(self.group.add_vec(), domain);
        ColumnWriter::new(self.dir.clone(), builder, Some(ColumnType::Cat))
    }
}

/// Appends the cells of one column, cutting a new chunk every
/// `chunk_rows` rows.
pub struct ColumnWriter {
    dir: Arc<Directory>,
    builder: VectorBuilder,
    declared: Option<ColumnType>,
    buf: Option<AppendBuffer>,
    cidx: usize,
    rows: u64,
}

impl ColumnWriter {
    fn new(dir: Arc<Directory>, builder: VectorBuilder, declared: Option<ColumnType>) -> Self {
        ColumnWriter {
            dir,
            builder,
            declared,
            buf: None,
            cidx: 0,
            rows: 0,
        }
    }

    pub fn key(&self) -> VecKey {
        self.builder.key()
    }

    pub fn declared(&self) -> Option<ColumnType> {
        self.declared
    }

    /// Rows appended so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn append(&mut self, d: Datum) -> Result<()> {
        let buf = match &mut self.buf {
            Some(buf) => buf,
            slot => slot.insert(self.builder.open_chunk(self.cidx)?),
        };
        match d {
            Datum::Na => buf.append_na()?,
            Datum::Dec { mantissa, exp } => buf.append_number(mantissa, exp)?,
            Datum::Flo(f) => buf.append_f64(f)?,
            Datum::Str(s) => buf.append_str(&s)?,
            Datum::Time(ms) => buf.append_i64(ms)?,
        }
        self.rows += 1;
        if buf.len() >= self.dir.chunk_rows() {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(buf) = self.buf.take() {
            self.builder.commit(buf)?;
            self.cidx += 1;
        }
        Ok(())
    }

    /// Commits the last partial chunk and publishes the column.
    pub fn close_column(mut self) -> Result<Vector> {
        self.flush()?;
        let v = self.builder.finalize(&self.dir)?;
        debug!(target: "strata", key = %v.key(), rows = v.num_rows(), chunks = v.nchunks(), "column closed");
        Ok(v)
    }
}
